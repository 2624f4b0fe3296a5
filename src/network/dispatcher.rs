//! Command Dispatcher
//!
//! The single `execute` contract: any number of threads may call it on the
//! same connection, and each command's send+receive cycle runs alone under
//! the connection's exec lock. Commands from one thread are therefore issued
//! in order; commands on different connections are unordered.
//!
//! Calls block until the response is whole or the socket fails. There is no
//! cancellation; the configured read/write timeouts are the only deadline.

use std::io::{self, Read, Write};

use crate::error::{Result, SsdbError};
use crate::protocol::{decode, encode_command, Command, Response};
use super::connection::{Connection, Link};

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 8 * 1024;

/// Execute one command and wait for its response
///
/// 1. Acquire the exec lock
/// 2. Count the attempt
/// 3. Encode and send
/// 4. Read and decode until one whole response is buffered
/// 5. On failure, let the connection classify it (transient → reconnect)
///
/// The in-flight command is never retried, even when the failure was transient.
pub fn execute(conn: &Connection, command: &Command) -> Result<Response> {
    let mut link = conn.lock_link();
    conn.ensure_ready()?;
    conn.record_attempt();

    tracing::trace!("Connection {} -> {}", conn.id(), command.name());

    match exchange(&mut link, command) {
        Ok(response) => {
            conn.record_success();
            Ok(response)
        }
        Err(e) => Err(conn.handle_failure(&mut link, e)),
    }
}

/// Send several commands back to back, then read as many responses
///
/// The exec lock is held for the whole batch, so nothing interleaves. On
/// failure no partial results are returned.
pub fn pipeline(conn: &Connection, commands: &[Command]) -> Result<Vec<Response>> {
    if commands.is_empty() {
        return Ok(Vec::new());
    }

    let mut link = conn.lock_link();
    conn.ensure_ready()?;
    for _ in commands {
        conn.record_attempt();
    }

    match exchange_all(&mut link, conn, commands) {
        Ok(responses) => Ok(responses),
        Err(e) => Err(conn.handle_failure(&mut link, e)),
    }
}

fn exchange_all(link: &mut Link, conn: &Connection, commands: &[Command]) -> Result<Vec<Response>> {
    let mut request = Vec::new();
    for command in commands {
        request.extend_from_slice(&encode_command(command)?);
    }
    send(link, &request)?;

    let mut responses = Vec::with_capacity(commands.len());
    for _ in commands {
        responses.push(receive(link)?);
        conn.record_success();
    }
    Ok(responses)
}

/// One send+receive cycle on an already-locked link
pub(crate) fn exchange(link: &mut Link, command: &Command) -> Result<Response> {
    let request = encode_command(command)?;
    send(link, &request)?;
    receive(link)
}

fn send(link: &mut Link, request: &[u8]) -> Result<()> {
    let stream = link.stream.as_mut().ok_or_else(not_connected)?;
    stream.write_all(request)?;
    stream.flush()?;
    Ok(())
}

/// Read into the receive buffer until the decoder yields a whole response
fn receive(link: &mut Link) -> Result<Response> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(response) = decode(&mut link.recv_buf)? {
            return Ok(response);
        }

        let stream = link.stream.as_mut().ok_or_else(not_connected)?;
        let n = match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(SsdbError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        link.recv_buf.extend_from_slice(&chunk[..n]);
    }
}

fn not_connected() -> SsdbError {
    SsdbError::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "connection has no socket",
    ))
}
