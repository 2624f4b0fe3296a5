//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol. Pure functions, no I/O.
//!
//! ## Wire Format
//!
//! ```text
//! Frame    = <ascii decimal length> "\n" <raw bytes> "\n"
//! Request  = Frame* "\n"
//! Response = Frame* "\n"
//! ```
//!
//! Lengths are byte counts. The first frame of a request is the command name;
//! the first frame of a response is the status (`ok`, `not_found`, ...).

use bytes::BytesMut;

use crate::error::{Result, SsdbError};
use super::{Command, Response};

/// Largest frame payload accepted from the server (256 MB)
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Longest length token we bother parsing
const MAX_LEN_DIGITS: usize = 20;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command into a complete request
///
/// Format: name frame + one frame per argument payload + terminating `\n`
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    push_frame(&mut out, command.name().as_bytes());
    for arg in command.arguments() {
        for payload in arg.to_payloads()? {
            push_frame(&mut out, &payload);
        }
    }
    out.push(b'\n');
    Ok(out)
}

/// Encode raw fields as a terminated block (the response shape)
pub fn encode_fields<I, F>(fields: I) -> Vec<u8>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut out = Vec::with_capacity(64);
    for field in fields {
        push_frame(&mut out, field.as_ref());
    }
    out.push(b'\n');
    out
}

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    encode_fields(response.fields())
}

fn push_frame(out: &mut Vec<u8>, payload: &[u8]) {
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(payload);
    out.push(b'\n');
}

// =============================================================================
// Decoding
// =============================================================================

/// Try to decode one complete response from the front of `buf`
///
/// - `Ok(Some(response))`: exactly the bytes of that response were consumed;
///   anything after it stays in `buf`.
/// - `Ok(None)`: the response is not complete yet; nothing was consumed.
/// - `Err(Protocol)`: a length token is malformed. The buffer can no longer
///   be trusted and the owning connection must be discarded.
///
/// Blank lines (`\n` or `\r\n`) before the first frame are skipped.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Response>> {
    // Field payloads as ranges into `buf`; sliced out once the response is whole.
    let mut fields = Vec::new();
    let mut offset = 0;

    loop {
        let newline = match buf[offset..].iter().position(|&b| b == b'\n') {
            Some(pos) => offset + pos,
            None => return Ok(None),
        };
        let line = &buf[offset..newline];
        let line_end = newline + 1;

        if line.is_empty() || line == b"\r" {
            if fields.is_empty() {
                offset = line_end;
                continue;
            }
            let consumed = buf.split_to(line_end).freeze();
            let fields = fields
                .into_iter()
                .map(|range: std::ops::Range<usize>| consumed.slice(range))
                .collect();
            return Ok(Some(Response::new(fields)));
        }

        let len = parse_len(line)?;
        let payload_end = line_end + len;
        if buf.len() <= payload_end {
            return Ok(None);
        }
        if buf[payload_end] != b'\n' {
            return Err(SsdbError::Protocol(format!(
                "frame of {} bytes not terminated by newline (found 0x{:02x})",
                len, buf[payload_end]
            )));
        }

        fields.push(line_end..payload_end);
        offset = payload_end + 1;
    }
}

/// Parse a frame length token; one trailing `\r` is tolerated
fn parse_len(line: &[u8]) -> Result<usize> {
    let token = line.strip_suffix(b"\r").unwrap_or(line);

    if token.is_empty() || token.len() > MAX_LEN_DIGITS || !token.iter().all(u8::is_ascii_digit) {
        return Err(SsdbError::Protocol(format!(
            "invalid length token {:?}",
            String::from_utf8_lossy(token)
        )));
    }

    let len = token
        .iter()
        .try_fold(0usize, |acc, &b| {
            acc.checked_mul(10)?.checked_add(usize::from(b - b'0'))
        })
        .filter(|&len| len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            SsdbError::Protocol(format!(
                "frame length {} exceeds limit of {} bytes",
                String::from_utf8_lossy(token),
                MAX_FRAME_LEN
            ))
        })?;

    Ok(len)
}
