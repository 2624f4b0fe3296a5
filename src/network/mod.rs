//! Network Module
//!
//! Sockets, their lifecycle, and the command dispatcher.
//!
//! ## Architecture
//! - One `Connection` per TCP socket, guarded by an exec lock
//! - `dispatcher::execute` serializes send+receive per connection
//! - A reconnect thread per connection, started on transient failure
//! - `Pool` registers connections and sweeps dead/idle ones on a timer

mod connection;
pub mod dispatcher;
mod pool;

pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use pool::{Pool, PoolStats};
