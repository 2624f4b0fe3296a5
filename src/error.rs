//! Error types for ssdbc
//!
//! Provides a unified error type for all client operations.

use std::io::ErrorKind;

use bytes::Bytes;
use thiserror::Error;

use crate::network::ConnectionState;

/// Result type alias using SsdbError
pub type Result<T> = std::result::Result<T, SsdbError>;

/// Unified error type for ssdbc operations
#[derive(Debug, Error)]
pub enum SsdbError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to resolve address: {0}")]
    Resolve(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Command failed with status '{status}'")]
    Command { status: String, fields: Vec<Bytes> },

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Connection is closed")]
    Closed,

    #[error("Connection is not ready (state: {0})")]
    NotConnected(ConnectionState),

    #[error("Connection pool exhausted: {0} connections open")]
    PoolExhausted(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Batch worker panicked")]
    WorkerPanicked,
}

impl SsdbError {
    /// Whether this failure is recoverable by reconnecting.
    ///
    /// EOF, timeouts and reset/routing failures qualify. Everything else
    /// (including protocol errors) does not.
    pub fn is_transient(&self) -> bool {
        match self {
            SsdbError::Io(err) => matches!(
                err.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::TimedOut
                    | ErrorKind::WouldBlock
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
                    | ErrorKind::AddrNotAvailable
            ),
            _ => false,
        }
    }

    /// Status field of a command error, if this is one.
    pub fn status(&self) -> Option<&str> {
        match self {
            SsdbError::Command { status, .. } => Some(status),
            _ => None,
        }
    }
}
