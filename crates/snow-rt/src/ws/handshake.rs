//! WebSocket HTTP upgrade handshake (RFC 6455 Section 4.2).
//!
//! Validates the client's HTTP upgrade request, computes the
//! `Sec-WebSocket-Accept` response header, and writes the `101 Switching
//! Protocols` response (or `400 Bad Request` on failure).
//!
//! - [`perform_upgrade`]: Main entry point -- reads HTTP request, validates, writes response
//! - [`compute_accept_key`]: SHA-1 + Base64 computation per RFC 6455 Section 4.2.2
//! - [`validate_upgrade_request`]: Header validation against RFC requirements
//! - [`write_upgrade_response`]: Writes the 101 Switching Protocols response
//! - [`write_bad_request`]: Writes the 400 Bad Request response

use std::io::{BufRead, BufReader, Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

/// RFC 6455 magic GUID concatenated with the client key for Sec-WebSocket-Accept.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` value per RFC 6455 Section 4.2.2.
///
/// Concatenates `client_key` + [`WS_GUID`], SHA-1 hashes, then Base64 encodes.
pub(crate) fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Validate an HTTP upgrade request per RFC 6455 Section 4.2.1.
///
/// Returns `Ok(client_key)` if all required headers are present and valid,
/// or `Err(reason)` describing the first validation failure.
pub fn validate_upgrade_request(
    method: &str,
    headers: &[(String, String)],
) -> Result<String, &'static str> {
    // Method must be GET
    if !method.eq_ignore_ascii_case("GET") {
        return Err("method must be GET");
    }

    // Helper: find a header value by case-insensitive name
    let find_header = |name: &str| -> Option<&str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    // Upgrade header must contain "websocket" (case-insensitive value)
    match find_header("Upgrade") {
        Some(v) if v.to_ascii_lowercase().contains("websocket") => {}
        _ => return Err("missing or invalid Upgrade header"),
    }

    // Connection header must contain "upgrade" (case-insensitive, may have multiple tokens)
    match find_header("Connection") {
        Some(v) if v.to_ascii_lowercase().contains("upgrade") => {}
        _ => return Err("missing or invalid Connection header"),
    }

    // Sec-WebSocket-Key must be present
    let client_key = match find_header("Sec-WebSocket-Key") {
        Some(k) => k.to_string(),
        None => return Err("missing Sec-WebSocket-Key header"),
    };

    // Sec-WebSocket-Version must be "13"
    match find_header("Sec-WebSocket-Version") {
        Some("13") => {}
        _ => return Err("missing or invalid Sec-WebSocket-Version (must be 13)"),
    }

    Ok(client_key)
}

/// Write the `101 Switching Protocols` response to the stream.
pub fn write_upgrade_response<W: Write>(stream: &mut W, accept_key: &str) -> std::io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept_key
    )?;
    stream.flush()
}

/// Write a `400 Bad Request` response with the given reason.
pub fn write_bad_request<W: Write>(stream: &mut W, reason: &str) -> std::io::Result<()> {
    let body = format!("Bad Request: {}", reason);
    write!(
        stream,
        "HTTP/1.1 400 Bad Request\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    )?;
    stream.flush()
}

/// Perform the WebSocket upgrade handshake on a raw stream.
///
/// Reads the HTTP upgrade request, validates it, and writes either a
/// `101 Switching Protocols` or `400 Bad Request` response. After a
/// successful upgrade, the stream is ready for WebSocket frame I/O.
///
/// This is the main entry point that Phase 60 will call.
///
/// # BufReader safety note
///
/// The BufReader borrows `stream` for header parsing. After headers are read,
/// the borrow ends and the caller resumes raw stream access for frame I/O.
/// This is safe because RFC 6455 clients do not send frames before receiving
/// the 101 response. We verify the buffer is empty as a sanity check.
pub fn perform_upgrade<S: Read + Write>(stream: &mut S) -> Result<(), String> {
    let mut reader = BufReader::new(&mut *stream);

    // 1. Read request line: "GET /path HTTP/1.1\r\n"
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .map_err(|e| format!("read request line: {}", e))?;

    let request_line_trimmed = request_line.trim_end();
    let parts: Vec<&str> = request_line_trimmed.splitn(3, ' ').collect();
    if parts.len() < 2 {
        return Err(format!("malformed request line: {}", request_line_trimmed));
    }
    let method = parts[0];

    // 2. Read headers until blank line
    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| format!("read header: {}", e))?;

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    // Sanity check: BufReader should not have buffered extra bytes
    if !reader.buffer().is_empty() {
        eprintln!(
            "[snow-rt] warning: {} bytes buffered beyond HTTP headers during WebSocket upgrade",
            reader.buffer().len()
        );
    }

    // Drop the reader to release the borrow on stream
    drop(reader);

    // 3. Validate and respond
    match validate_upgrade_request(method, &headers) {
        Ok(client_key) => {
            let accept_key = compute_accept_key(&client_key);
            write_upgrade_response(stream, &accept_key)
                .map_err(|e| format!("write upgrade response: {}", e))?;
            Ok(())
        }
        Err(reason) => {
            let _ = write_bad_request(stream, reason);
            Err(reason.to_string())
        }
    }
}
