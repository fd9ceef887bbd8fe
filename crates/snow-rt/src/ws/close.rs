//! WebSocket close handshake and frame validation (RFC 6455 Section 5.5.1, 7).
//!
//! Provides close frame parsing/building, text frame UTF-8 validation, and a
//! convenience `process_frame` function that handles protocol-level frame
//! dispatch (ping/pong, close echo, text validation).
//!
//! - [`parse_close_payload`]: Extract status code + reason from close frame payload
//! - [`build_close_payload`]: Build a close frame payload from code + reason
//! - [`validate_text_payload`]: UTF-8 validation for text frames (PROTO-05)
//! - [`send_close`]: Send a close frame with a given status code and reason
//! - [`process_frame`]: Handle one frame at the protocol level

use std::io::Write;

use super::frame::{write_frame, WsFrame, WsOpcode};

/// Well-known WebSocket close status codes per RFC 6455 Section 7.4.1.
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure (1000).
    pub const NORMAL: u16 = 1000;
    /// Going away (1001).
    pub const GOING_AWAY: u16 = 1001;
    /// Protocol error (1002) -- used for unknown opcodes (PROTO-09).
    pub const PROTOCOL_ERROR: u16 = 1002;
    /// Invalid frame payload data (1007) -- used for UTF-8 failure (PROTO-05).
    pub const INVALID_DATA: u16 = 1007;
    /// Internal server error (1011) -- used when an actor crashes (Phase 60).
    pub const INTERNAL_ERROR: u16 = 1011;
}

/// Parse a close frame payload into (status_code, reason).
///
/// Per RFC 6455 Section 7.4.1:
/// - If payload >= 2 bytes: status code is the first 2 bytes (big-endian),
///   reason is the remaining bytes decoded as UTF-8 (lossy).
/// - If payload < 2 bytes: returns (1005, "") -- 1005 means "no status code present".
pub fn parse_close_payload(payload: &[u8]) -> (u16, String) {
    if payload.len() >= 2 {
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
        (code, reason)
    } else {
        (1005, String::new())
    }
}

/// Build a close frame payload from a status code and reason string.
///
/// The payload is 2 bytes for the code (big-endian) followed by the reason
/// bytes. The reason is truncated to 123 bytes max so the total payload
/// stays within the 125-byte control frame limit (RFC 6455 Section 5.5).
pub fn build_close_payload(code: u16, reason: &str) -> Vec<u8> {
    let reason_bytes = reason.as_bytes();
    let max_reason_len = 123; // 125 - 2 bytes for code
    let truncated_len = reason_bytes.len().min(max_reason_len);

    let mut payload = Vec::with_capacity(2 + truncated_len);
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(&reason_bytes[..truncated_len]);
    payload
}

/// Validate that a text frame payload is valid UTF-8.
///
/// Per RFC 6455 Section 5.6, text frames MUST contain valid UTF-8.
/// Invalid UTF-8 triggers close code 1007 (PROTO-05).
pub fn validate_text_payload(payload: &[u8]) -> Result<(), ()> {
    std::str::from_utf8(payload).map(|_| ()).map_err(|_| ())
}

/// Send a close frame with the given status code and reason.
///
/// Builds the close payload and writes it as a close frame using the frame codec.
pub fn send_close<W: Write>(writer: &mut W, code: u16, reason: &str) -> Result<(), String> {
    let payload = build_close_payload(code, reason);
    write_frame(writer, WsOpcode::Close, &payload, true)
}

/// Process one WebSocket frame at the protocol level.
///
/// Handles control frames (ping, pong, close) and validates data frames
/// (text UTF-8 check). Returns:
/// - `Ok(Some(frame))` -- a data frame ready for the application (text, binary, continuation)
/// - `Ok(None)` -- a control frame that was handled internally (pong sent, pong received)
/// - `Err(msg)` -- protocol error or close; the connection should be terminated
pub fn process_frame<S: Write>(stream: &mut S, frame: WsFrame) -> Result<Option<WsFrame>, String> {
    match frame.opcode {
        WsOpcode::Text => {
            if validate_text_payload(&frame.payload).is_err() {
                send_close(stream, WsCloseCode::INVALID_DATA, "invalid UTF-8")?;
                return Err("invalid UTF-8 in text frame".to_string());
            }
            Ok(Some(frame))
        }
        WsOpcode::Binary => Ok(Some(frame)),
        WsOpcode::Close => {
            let (code, _reason) = parse_close_payload(&frame.payload);
            // Echo the close frame back with the same status code
            let echo_payload = build_close_payload(code, "");
            write_frame(stream, WsOpcode::Close, &echo_payload, true)?;
            Err("close".to_string())
        }
        WsOpcode::Ping => {
            // Respond with a Pong carrying the same payload
            write_frame(stream, WsOpcode::Pong, &frame.payload, true)?;
            Ok(None)
        }
        WsOpcode::Pong => {
            // Ignore -- Phase 61 will use Pong for heartbeat tracking
            Ok(None)
        }
        WsOpcode::Continuation => {
            // Recognized but not assembled -- Phase 61 handles fragmentation
            Ok(Some(frame))
        }
    }
}
