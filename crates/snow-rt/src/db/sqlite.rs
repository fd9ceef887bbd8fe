//! SQLite C FFI wrapper functions for the Snow runtime.
//!
//! Provides four extern "C" functions that Snow programs call to interact
//! with SQLite databases:
//! - `snow_sqlite_open`: Open a database connection
//! - `snow_sqlite_close`: Close a connection
//! - `snow_sqlite_execute`: Execute a write query (INSERT/UPDATE/DELETE/CREATE)
//! - `snow_sqlite_query`: Execute a read query (SELECT), returns rows
//!
//! Connection handles are opaque u64 values (Box::into_raw as u64) for GC
//! safety. The GC never traces integer values, so the connection won't be
//! corrupted by garbage collection.

use libsqlite3_sys::*;
use std::ffi::{CStr, CString};
use std::os::raw::c_int;

use crate::collections::list::{snow_list_append, snow_list_new};
use crate::collections::map::{snow_map_new_typed, snow_map_put};
use crate::io::alloc_result;
use crate::string::{snow_string_new, SnowString};

/// Wrapper around a raw SQLite database pointer.
struct SqliteConn {
    db: *mut sqlite3,
}

/// RAII guard ensuring sqlite3_finalize is always called on a prepared
/// statement, even when an error causes an early return.
struct StmtGuard {
    stmt: *mut sqlite3_stmt,
}

impl Drop for StmtGuard {
    fn drop(&mut self) {
        if !self.stmt.is_null() {
            unsafe {
                sqlite3_finalize(self.stmt);
            }
        }
    }
}

/// SQLITE_TRANSIENT tells SQLite to copy bound parameter data immediately.
/// It is defined as ((void(*)(void*))-1) in the C API, which is -1 cast to
/// a destructor function pointer.
const SQLITE_TRANSIENT_VALUE: isize = -1;

/// Extract a Rust &str from a raw SnowString pointer.
///
/// # Safety
///
/// The pointer must reference a valid SnowString allocation.
unsafe fn snow_str_to_rust(s: *const SnowString) -> &'static str {
    (*s).as_str()
}

/// Create a SnowString from a Rust &str and return as *mut u8.
fn rust_str_to_snow(s: &str) -> *mut u8 {
    snow_string_new(s.as_ptr(), s.len() as u64) as *mut u8
}

/// Create an error SnowResult from a Rust string.
fn err_result(msg: &str) -> *mut u8 {
    let s = rust_str_to_snow(msg);
    alloc_result(1, s) as *mut u8
}

/// Create an error SnowResult from a sqlite3 error message.
unsafe fn sqlite_err_result(db: *mut sqlite3) -> *mut u8 {
    let c_msg = sqlite3_errmsg(db);
    if c_msg.is_null() {
        err_result("unknown SQLite error")
    } else {
        let msg = CStr::from_ptr(c_msg).to_string_lossy();
        err_result(&msg)
    }
}

/// Read the SnowList of SnowString parameters and bind them to a prepared
/// statement using sqlite3_bind_text with SQLITE_TRANSIENT.
///
/// SnowList layout: `{ len: u64, cap: u64, data: [u64; cap] }`
/// Each element is a u64 that is actually a pointer to a SnowString.
///
/// Returns Ok(()) on success, Err(error_string) on bind failure.
unsafe fn bind_params(
    db: *mut sqlite3,
    stmt: *mut sqlite3_stmt,
    params: *mut u8,
) -> Result<(), *mut u8> {
    let len = *(params as *const u64);
    let data_ptr = (params as *const u64).add(2); // skip len + cap

    // We need to keep CStrings alive until all binds are complete.
    let mut cstrings = Vec::with_capacity(len as usize);

    for i in 0..len as usize {
        let param_ptr = *data_ptr.add(i) as *const SnowString;
        let param_str = snow_str_to_rust(param_ptr);
        let cstr = match CString::new(param_str) {
            Ok(c) => c,
            Err(_) => return Err(err_result("parameter contains null byte")),
        };
        cstrings.push(cstr);
    }

    for (i, cstr) in cstrings.iter().enumerate() {
        let destructor: Option<unsafe extern "C" fn(*mut std::ffi::c_void)> =
            std::mem::transmute::<isize, Option<unsafe extern "C" fn(*mut std::ffi::c_void)>>(
                SQLITE_TRANSIENT_VALUE,
            );
        let rc = sqlite3_bind_text(
            stmt,
            (i + 1) as c_int,
            cstr.as_ptr(),
            -1,
            destructor,
        );
        if rc != SQLITE_OK {
            return Err(sqlite_err_result(db));
        }
    }

    Ok(())
}

/// Open a SQLite database.
///
/// # Signature
///
/// `snow_sqlite_open(path: *const SnowString) -> *mut u8 (SnowResult<u64, String>)`
///
/// Returns SnowResult with tag 0 (Ok) containing the connection handle as
/// a u64, or tag 1 (Err) containing an error message string.
#[no_mangle]
pub extern "C" fn snow_sqlite_open(path: *const SnowString) -> *mut u8 {
    unsafe {
        let path_str = snow_str_to_rust(path);
        let c_path = match CString::new(path_str) {
            Ok(c) => c,
            Err(_) => return err_result("path contains null byte"),
        };

        let mut db: *mut sqlite3 = std::ptr::null_mut();
        let rc = sqlite3_open_v2(
            c_path.as_ptr(),
            &mut db,
            SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
            std::ptr::null(),
        );

        if rc != SQLITE_OK {
            let result = sqlite_err_result(db);
            if !db.is_null() {
                sqlite3_close(db);
            }
            return result;
        }

        let conn = Box::new(SqliteConn { db });
        let handle = Box::into_raw(conn) as u64;
        alloc_result(0, handle as *mut u8) as *mut u8
    }
}

/// Close a SQLite database connection.
///
/// # Signature
///
/// `snow_sqlite_close(conn_handle: u64)`
///
/// Recovers the Box<SqliteConn> from the handle, calls sqlite3_close,
/// and lets Box::drop free the Rust memory.
#[no_mangle]
pub extern "C" fn snow_sqlite_close(conn_handle: u64) {
    unsafe {
        let conn = Box::from_raw(conn_handle as *mut SqliteConn);
        sqlite3_close(conn.db);
        // Box drops, freeing Rust memory
    }
}

/// Execute a write SQL statement (INSERT, UPDATE, DELETE, CREATE TABLE, etc.).
///
/// # Signature
///
/// `snow_sqlite_execute(conn_handle: u64, sql: *const SnowString, params: *mut u8)
///     -> *mut u8 (SnowResult<Int, String>)`
///
/// Parameters are bound as text via sqlite3_bind_text. Returns the number
/// of rows affected (via sqlite3_changes) on success.
#[no_mangle]
pub extern "C" fn snow_sqlite_execute(
    conn_handle: u64,
    sql: *const SnowString,
    params: *mut u8,
) -> *mut u8 {
    unsafe {
        let conn = &*(conn_handle as *const SqliteConn);
        let sql_str = snow_str_to_rust(sql);
        let sql_cstr = match CString::new(sql_str) {
            Ok(c) => c,
            Err(_) => return err_result("SQL contains null byte"),
        };

        let mut stmt: *mut sqlite3_stmt = std::ptr::null_mut();
        let rc = sqlite3_prepare_v2(
            conn.db,
            sql_cstr.as_ptr(),
            -1,
            &mut stmt,
            std::ptr::null_mut(),
        );
        if rc != SQLITE_OK {
            return sqlite_err_result(conn.db);
        }

        let _guard = StmtGuard { stmt };

        // Bind parameters
        if let Err(e) = bind_params(conn.db, stmt, params) {
            return e;
        }

        // Execute
        let step_rc = sqlite3_step(stmt);
        if step_rc != SQLITE_DONE && step_rc != SQLITE_ROW {
            return sqlite_err_result(conn.db);
        }

        let changes = sqlite3_changes(conn.db) as i64;
        alloc_result(0, changes as *mut u8) as *mut u8
    }
}

/// Execute a read SQL statement (SELECT) and return rows.
///
/// # Signature
///
/// `snow_sqlite_query(conn_handle: u64, sql: *const SnowString, params: *mut u8)
///     -> *mut u8 (SnowResult<List<Map<String, String>>, String>)`
///
/// Each row is a Map<String, String> where keys are column names and values
/// are the text representation of column values. NULL columns become empty
/// strings.
#[no_mangle]
pub extern "C" fn snow_sqlite_query(
    conn_handle: u64,
    sql: *const SnowString,
    params: *mut u8,
) -> *mut u8 {
    unsafe {
        let conn = &*(conn_handle as *const SqliteConn);
        let sql_str = snow_str_to_rust(sql);
        let sql_cstr = match CString::new(sql_str) {
            Ok(c) => c,
            Err(_) => return err_result("SQL contains null byte"),
        };

        let mut stmt: *mut sqlite3_stmt = std::ptr::null_mut();
        let rc = sqlite3_prepare_v2(
            conn.db,
            sql_cstr.as_ptr(),
            -1,
            &mut stmt,
            std::ptr::null_mut(),
        );
        if rc != SQLITE_OK {
            return sqlite_err_result(conn.db);
        }

        let _guard = StmtGuard { stmt };

        // Bind parameters
        if let Err(e) = bind_params(conn.db, stmt, params) {
            return e;
        }

        // Get column info
        let col_count = sqlite3_column_count(stmt) as usize;
        let mut col_names: Vec<String> = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let name_ptr = sqlite3_column_name(stmt, i as c_int);
            if name_ptr.is_null() {
                col_names.push(format!("column{}", i));
            } else {
                let name = CStr::from_ptr(name_ptr).to_string_lossy().into_owned();
                col_names.push(name);
            }
        }

        // Iterate rows
        let mut result_list = snow_list_new();

        loop {
            let step_rc = sqlite3_step(stmt);
            if step_rc == SQLITE_DONE {
                break;
            }
            if step_rc != SQLITE_ROW {
                return sqlite_err_result(conn.db);
            }

            // Create a string-keyed map for this row (key_type = 1 = string)
            let mut row_map = snow_map_new_typed(1);

            for col in 0..col_count {
                let col_type = sqlite3_column_type(stmt, col as c_int);
                let value_str = if col_type == SQLITE_NULL {
                    String::new()
                } else {
                    let text_ptr = sqlite3_column_text(stmt, col as c_int);
                    if text_ptr.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr(text_ptr as *const i8)
                            .to_string_lossy()
                            .into_owned()
                    }
                };

                let key_snow = rust_str_to_snow(&col_names[col]);
                let val_snow = rust_str_to_snow(&value_str);
                row_map = snow_map_put(row_map, key_snow as u64, val_snow as u64);
            }

            result_list = snow_list_append(result_list, row_map as u64);
        }

        alloc_result(0, result_list) as *mut u8
    }
}
