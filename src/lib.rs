//! # ssdbc
//!
//! A blocking client engine for the SSDB length-prefixed wire protocol with:
//! - An incremental codec that tolerates partial reads
//! - Connections that detect transient failures and reconnect in the background
//! - A per-connection serialized `execute` safe for concurrent callers
//! - A pool that sweeps dead and idle connections
//! - Parallel batch writes fanned out over several connections
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (per-command wrappers)                │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌─────────────────────────┐    ┌─────────────────────────┐
//!   │       Dispatcher        │◄───│    BatchCoordinator     │
//!   │  (exec lock per conn)   │    │  (N workers, channel)   │
//!   └────────────┬────────────┘    └────────────┬────────────┘
//!                │                              │ acquire/discard
//!                ▼                              ▼
//!   ┌─────────────────────────┐    ┌─────────────────────────┐
//!   │       Connection        │◄───│          Pool           │
//!   │ (socket, buffer, state) │    │   (registry, sweeper)   │
//!   └────────────┬────────────┘    └─────────────────────────┘
//!                │
//!                ▼
//!         ┌─────────────┐
//!         │    Codec    │
//!         │ (no I/O)    │
//!         └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use ssdbc::{Client, ClientConfig};
//!
//! let config = ClientConfig::builder().host("127.0.0.1").port(8888).build();
//! let client = Client::connect(config)?;
//! client.set("greeting", "hello")?;
//! assert_eq!(client.get("greeting")?.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), ssdbc::SsdbError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod batch;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SsdbError};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use protocol::{Argument, Command, Reply, Response};
pub use network::{Connection, ConnectionState, Pool, PoolStats};
pub use batch::{BatchCoordinator, BatchPlan};
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ssdbc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
