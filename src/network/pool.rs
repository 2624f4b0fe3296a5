//! Connection Pool
//!
//! Registry of live connections with a background sweep that reaps dead and
//! idle ones, plus aggregate counters for failure-rate monitoring.
//!
//! ## Acquisition
//! By default every `acquire()` dials a fresh connection and registers it.
//! With `reuse_connections` set, an idle Ready connection that nobody holds is
//! handed out first. Either way each entry is keyed by connection id, so the
//! registry can never hold the same socket twice.
//!
//! The pool is an explicit value: construct one and pass it to whoever needs
//! it. Clones share the same registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::error::{Result, SsdbError};
use super::connection::{Connection, ConnectionState};

/// Aggregate pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently registered
    pub total: usize,

    /// Ready and not held by anyone
    pub reusable: usize,

    /// Checked out by a logical client
    pub in_use: usize,

    /// Connections this pool has torn down so far
    pub closed: u64,

    /// Sum of per-connection command attempts
    pub attempts: u64,

    /// Sum of per-connection command successes
    pub successes: u64,
}

impl PoolStats {
    /// Fraction of attempts that did not succeed (0.0 when idle)
    pub fn failure_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (self.attempts - self.successes.min(self.attempts)) as f64 / self.attempts as f64
    }
}

struct PoolInner {
    config: Arc<ClientConfig>,
    connections: Mutex<HashMap<u64, Connection>>,
    closed: AtomicU64,

    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Dropped to stop the sweeper
    stop_tx: Mutex<Option<Sender<()>>>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.stop_tx.get_mut().take();
        for (_, conn) in self.connections.get_mut().drain() {
            conn.close();
        }
    }
}

/// Shared handle to a connection pool
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool and start its sweep thread
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let (stop_tx, stop_rx) = channel::bounded(0);
        let pool = Self {
            inner: Arc::new(PoolInner {
                config: Arc::new(config),
                connections: Mutex::new(HashMap::new()),
                closed: AtomicU64::new(0),
                sweeper: Mutex::new(None),
                stop_tx: Mutex::new(Some(stop_tx)),
            }),
        };

        let weak = Arc::downgrade(&pool.inner);
        let interval = pool.inner.config.sweep_interval;
        let handle = thread::Builder::new()
            .name("ssdbc-pool-sweep".to_string())
            .spawn(move || sweep_loop(weak, stop_rx, interval))?;
        *pool.inner.sweeper.lock() = Some(handle);

        tracing::debug!("Pool for {} started", pool.inner.config.address());
        Ok(pool)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.inner.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a connection for one logical client, marked in use
    pub fn acquire(&self) -> Result<Connection> {
        if self.inner.config.reuse_connections {
            if let Some(conn) = self.pop_reusable() {
                tracing::debug!("Reusing connection {}", conn.id());
                return Ok(conn);
            }
        }

        self.ensure_capacity()?;
        let conn = Connection::open(Arc::clone(&self.inner.config))?;
        conn.set_in_use(true);
        if let Err(e) = self.register(conn.clone()) {
            conn.close();
            return Err(e);
        }
        Ok(conn)
    }

    /// Add an externally created connection to the registry
    pub fn register(&self, conn: Connection) -> Result<()> {
        let mut connections = self.inner.connections.lock();
        if connections.contains_key(&conn.id()) {
            return Ok(());
        }
        if connections.len() >= self.inner.config.max_connections {
            return Err(SsdbError::PoolExhausted(connections.len()));
        }
        connections.insert(conn.id(), conn);
        Ok(())
    }

    /// Give a connection back for reuse (or let the sweep reap it)
    pub fn release(&self, conn: &Connection) {
        conn.set_in_use(false);
        conn.touch();
    }

    /// Close a connection and drop it from the registry
    pub fn discard(&self, conn: &Connection) {
        let removed = self.inner.connections.lock().remove(&conn.id());
        conn.close();
        if removed.is_some() {
            self.inner.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove and close every connection that is Disconnected, Closed, or
    /// idle for longer than the idle timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let idle_timeout = self.inner.config.idle_timeout;

        let expired: Vec<Connection> = {
            let mut connections = self.inner.connections.lock();
            let ids: Vec<u64> = connections
                .values()
                .filter(|conn| is_expired(conn, idle_timeout))
                .map(Connection::id)
                .collect();
            ids.iter().filter_map(|id| connections.remove(id)).collect()
        };

        for conn in &expired {
            tracing::debug!(
                "Sweeping connection {} (state: {}, idle: {:?})",
                conn.id(),
                conn.state(),
                conn.idle_time()
            );
            conn.close();
        }

        self.inner
            .closed
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn stats(&self) -> PoolStats {
        let connections = self.inner.connections.lock();
        let mut stats = PoolStats {
            total: connections.len(),
            closed: self.inner.closed.load(Ordering::Relaxed),
            ..PoolStats::default()
        };
        for conn in connections.values() {
            if conn.in_use() {
                stats.in_use += 1;
            } else if conn.is_ready() {
                stats.reusable += 1;
            }
            let counters = conn.stats();
            stats.attempts += counters.attempts;
            stats.successes += counters.successes;
        }
        stats
    }

    /// Stop the sweeper and close every connection
    pub fn shutdown(&self) {
        self.inner.stop_tx.lock().take();
        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        let drained: Vec<Connection> = self
            .inner
            .connections
            .lock()
            .drain()
            .map(|(_, conn)| conn)
            .collect();
        for conn in &drained {
            conn.close();
        }
        self.inner
            .closed
            .fetch_add(drained.len() as u64, Ordering::Relaxed);

        tracing::debug!("Pool for {} shut down", self.inner.config.address());
    }

    fn ensure_capacity(&self) -> Result<()> {
        let open = self.len();
        if open >= self.inner.config.max_connections {
            return Err(SsdbError::PoolExhausted(open));
        }
        Ok(())
    }

    fn pop_reusable(&self) -> Option<Connection> {
        let connections = self.inner.connections.lock();
        connections
            .values()
            .find(|conn| conn.is_ready() && conn.try_check_out())
            .cloned()
    }
}

fn is_expired(conn: &Connection, idle_timeout: Duration) -> bool {
    match conn.state() {
        ConnectionState::Disconnected | ConnectionState::Closed => true,
        ConnectionState::Connecting | ConnectionState::Ready => conn.idle_time() > idle_timeout,
    }
}

fn sweep_loop(weak: Weak<PoolInner>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let pool = match weak.upgrade() {
            Some(inner) => Pool { inner },
            None => break,
        };
        let removed = pool.sweep();
        if removed > 0 {
            tracing::info!("Pool sweep removed {} connection(s)", removed);
        }
    }
    tracing::debug!("Pool sweep loop stopped");
}
