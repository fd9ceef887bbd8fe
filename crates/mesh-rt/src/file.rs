//! File I/O runtime functions for the Mesh standard library.
//!
//! Provides file read, write, append, exists, and delete operations.
//! All fallible operations return MeshResult (tag 0 = Ok, tag 1 = Err).

use std::fs::{self, OpenOptions};
use std::io::Write;

use crate::gc::mesh_gc_alloc_actor;
use crate::io::MeshResult;
use crate::string::{mesh_string_new, MeshString};

/// Allocate a MeshResult on the GC heap.
fn alloc_result(tag: u8, value: *mut u8) -> *mut MeshResult {
    unsafe {
        let ptr = mesh_gc_alloc_actor(
            std::mem::size_of::<MeshResult>() as u64,
            std::mem::align_of::<MeshResult>() as u64,
        ) as *mut MeshResult;
        (*ptr).tag = tag;
        (*ptr).value = value;
        ptr
    }
}

/// Helper to create an Err result with a string message.
fn err_result(msg: &str) -> *mut MeshResult {
    let s = mesh_string_new(msg.as_ptr(), msg.len() as u64);
    alloc_result(1, s as *mut u8)
}

/// Read the entire contents of a file as a UTF-8 string.
///
/// Returns MeshResult:
/// - tag 0 (Ok): value = pointer to MeshString containing file contents
/// - tag 1 (Err): value = pointer to MeshString containing error message
#[no_mangle]
pub extern "C" fn mesh_file_read(path: *const MeshString) -> *mut MeshResult {
    unsafe {
        let path_str = (*path).as_str();
        match fs::read_to_string(path_str) {
            Ok(contents) => {
                let s = mesh_string_new(contents.as_ptr(), contents.len() as u64);
                alloc_result(0, s as *mut u8)
            }
            Err(e) => err_result(&e.to_string()),
        }
    }
}

/// Write content to a file, creating or overwriting it.
///
/// Returns MeshResult:
/// - tag 0 (Ok): value = null (Unit payload)
/// - tag 1 (Err): value = pointer to MeshString containing error message
#[no_mangle]
pub extern "C" fn mesh_file_write(
    path: *const MeshString,
    content: *const MeshString,
) -> *mut MeshResult {
    unsafe {
        let path_str = (*path).as_str();
        let content_str = (*content).as_str();
        match fs::write(path_str, content_str) {
            Ok(()) => alloc_result(0, std::ptr::null_mut()),
            Err(e) => err_result(&e.to_string()),
        }
    }
}

/// Append content to a file, creating it if it doesn't exist.
///
/// Returns MeshResult:
/// - tag 0 (Ok): value = null (Unit payload)
/// - tag 1 (Err): value = pointer to MeshString containing error message
#[no_mangle]
pub extern "C" fn mesh_file_append(
    path: *const MeshString,
    content: *const MeshString,
) -> *mut MeshResult {
    unsafe {
        let path_str = (*path).as_str();
        let content_str = (*content).as_str();
        match OpenOptions::new()
            .append(true)
            .create(true)
            .open(path_str)
        {
            Ok(mut file) => match file.write_all(content_str.as_bytes()) {
                Ok(()) => alloc_result(0, std::ptr::null_mut()),
                Err(e) => err_result(&e.to_string()),
            },
            Err(e) => err_result(&e.to_string()),
        }
    }
}

/// Check if a file exists at the given path.
///
/// Returns 1 if the file exists, 0 otherwise.
#[no_mangle]
pub extern "C" fn mesh_file_exists(path: *const MeshString) -> i8 {
    unsafe {
        let path_str = (*path).as_str();
        if std::path::Path::new(path_str).exists() {
            1
        } else {
            0
        }
    }
}

/// Delete a file at the given path.
///
/// Returns MeshResult:
/// - tag 0 (Ok): value = null (Unit payload)
/// - tag 1 (Err): value = pointer to MeshString containing error message
#[no_mangle]
pub extern "C" fn mesh_file_delete(path: *const MeshString) -> *mut MeshResult {
    unsafe {
        let path_str = (*path).as_str();
        match fs::remove_file(path_str) {
            Ok(()) => alloc_result(0, std::ptr::null_mut()),
            Err(e) => err_result(&e.to_string()),
        }
    }
}
