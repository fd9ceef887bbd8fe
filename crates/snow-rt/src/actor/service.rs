//! Service runtime support for Snow.
//!
//! Provides synchronous call/reply semantics on top of the actor message
//! passing primitives. A "service call" sends a message to a service actor,
//! then blocks the caller until a reply arrives.
//!
//! ## Message format
//!
//! **Call message TO service:** `[u64 type_tag][u64 caller_pid][i64... args]`
//! - type_tag: identifies which call/cast handler to dispatch to
//! - caller_pid: so the service knows where to send the reply
//! - args: handler arguments encoded as i64 values
//!
//! **Reply TO caller:** `[i64 reply_value]`
//! - A single i64 value (the return value from the call handler)

use super::heap::MessageBuffer;
use super::process::{Message, ProcessId};
use super::stack;
use super::GLOBAL_SCHEDULER;

/// Synchronous service call: send a message to the target service and block
/// until a reply arrives.
///
/// 1. Get the caller's PID
/// 2. Build a call message: [u64 type_tag][u64 caller_pid][payload bytes]
/// 3. Send to target via snow_actor_send
/// 4. Block on receive (infinite wait) for the reply
/// 5. Return a pointer to the reply data
///
/// Returns a pointer to the reply data (heap-allocated in the caller's
/// actor heap), or null if the call fails.
///
/// - `target_pid`: PID of the service actor
/// - `msg_tag`: type tag identifying which handler to invoke
/// - `payload_ptr`: pointer to argument bytes (array of i64 values)
/// - `payload_size`: size of the payload in bytes
#[no_mangle]
pub extern "C" fn snow_service_call(
    target_pid: u64,
    msg_tag: u64,
    payload_ptr: *const u8,
    payload_size: u64,
) -> *const u8 {
    // Get the caller's PID.
    let caller_pid = match stack::get_current_pid() {
        Some(pid) => pid.as_u64(),
        None => return std::ptr::null(),
    };

    let sched = match GLOBAL_SCHEDULER.get() {
        Some(s) => s,
        None => return std::ptr::null(),
    };

    // Build the call message: [u64 type_tag][u64 caller_pid][payload bytes]
    let mut data = Vec::with_capacity(16 + payload_size as usize);
    data.extend_from_slice(&msg_tag.to_le_bytes());
    data.extend_from_slice(&caller_pid.to_le_bytes());

    if !payload_ptr.is_null() && payload_size > 0 {
        let payload = unsafe {
            std::slice::from_raw_parts(payload_ptr, payload_size as usize)
        };
        data.extend_from_slice(payload);
    }

    // The type_tag for the MessageBuffer is the msg_tag itself.
    let buffer = MessageBuffer::new(data, msg_tag);
    let msg = Message { buffer };

    // Send the call message to the target service.
    let target = ProcessId(target_pid);
    if let Some(proc_arc) = sched.get_process(target) {
        let mut proc = proc_arc.lock();
        proc.mailbox.push(msg);

        // Wake the target if it's waiting.
        if matches!(proc.state, super::process::ProcessState::Waiting) {
            proc.state = super::process::ProcessState::Ready;
            drop(proc);
            sched.wake_process(target);
        }
    } else {
        return std::ptr::null();
    }

    // Block the caller until a reply arrives.
    //
    // If we're inside a coroutine, use the standard snow_actor_receive which
    // yields to the scheduler. If we're on the main thread (no coroutine),
    // do a spin-wait on the mailbox instead (the main thread cannot yield).
    let caller_pid_obj = stack::get_current_pid().unwrap();

    // Check if we're in a coroutine context (CURRENT_YIELDER is set).
    let in_coroutine = stack::CURRENT_YIELDER.with(|c| c.get().is_some());

    if in_coroutine {
        // Standard path: yield to scheduler while waiting for reply.
        super::snow_actor_receive(-1)
    } else {
        // Main thread path: spin-wait on the mailbox.
        loop {
            if let Some(proc_arc) = sched.get_process(caller_pid_obj) {
                let proc = proc_arc.lock();
                if let Some(msg) = proc.mailbox.pop() {
                    drop(proc);
                    return super::copy_msg_to_actor_heap(sched, caller_pid_obj, msg);
                }
            }
            // Brief sleep to avoid burning CPU.
            std::thread::sleep(std::time::Duration::from_micros(10));
        }
    }
}

/// Send a reply from the service actor back to the caller.
///
/// Called by the service's receive loop after processing a call handler.
/// The reply is a single i64 value sent as a raw message to the caller.
///
/// - `caller_pid`: PID of the caller that made the service call
/// - `reply_ptr`: pointer to the reply data bytes
/// - `reply_size`: size of the reply data in bytes
#[no_mangle]
pub extern "C" fn snow_service_reply(
    caller_pid: u64,
    reply_ptr: *const u8,
    reply_size: u64,
) {
    // Send the reply data to the caller using snow_actor_send.
    super::snow_actor_send(caller_pid, reply_ptr, reply_size);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
