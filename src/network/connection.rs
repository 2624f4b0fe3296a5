//! Connection Lifecycle
//!
//! One physical socket to the server plus everything needed to keep it
//! healthy: state, receive buffer, counters and the reconnect loop.
//!
//! ## States
//! ```text
//!   Disconnected ──connect()──► Connecting ──► Ready
//!        ▲                          │            │
//!        └──── dial/auth failure ───┘            │ transient I/O failure
//!        └───────────────────────────────────────┘ (reconnect loop starts)
//!
//!   any state ──close()──► Closed (terminal)
//! ```
//!
//! ## Locking
//! `link` is the per-connection exec lock (socket + receive buffer). Lock
//! order is always `link` → `state`; `close()` never holds `state` while
//! waiting on `link`.
//!
//! Only one dial runs at a time: a `connect()` that finds the state
//! `Connecting` waits for the in-flight attempt instead of dialing again.

use std::fmt;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::ClientConfig;
use crate::error::{Result, SsdbError};
use crate::protocol::{Command, Response};
use super::dispatcher;

/// Initial receive buffer capacity
const RECV_BUF_CAPACITY: usize = 8 * 1024;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot of per-connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Commands dispatched
    pub attempts: u64,

    /// Commands that got a full response back
    pub successes: u64,
}

/// Socket plus the bytes read from it but not yet consumed by the decoder
pub(crate) struct Link {
    pub(crate) stream: Option<TcpStream>,
    pub(crate) recv_buf: BytesMut,
}

impl Link {
    fn empty() -> Self {
        Self {
            stream: None,
            recv_buf: BytesMut::with_capacity(RECV_BUF_CAPACITY),
        }
    }

    fn discard(&mut self) {
        self.stream = None;
        self.recv_buf.clear();
    }
}

struct ConnectionInner {
    id: u64,
    config: Arc<ClientConfig>,

    /// Exec lock: held for a whole send+receive cycle
    link: Mutex<Link>,

    state: Mutex<ConnectionState>,

    /// Signalled whenever the state leaves `Connecting`
    state_changed: Condvar,

    /// Clone of the live (or still authenticating) socket, used to unblock
    /// an in-flight read on close
    shutdown_handle: Mutex<Option<TcpStream>>,

    last_active: Mutex<Instant>,
    attempts: AtomicU64,
    successes: AtomicU64,

    /// Checked out by a logical client (pool classification)
    in_use: AtomicBool,

    /// Set while a reconnect loop owns this connection
    reconnecting: AtomicBool,
    reconnect_handle: Mutex<Option<JoinHandle<()>>>,

    /// Dropped on close; wakes and stops the reconnect loop
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
}

/// Handle to one physical connection
///
/// Cloning is cheap and every clone refers to the same socket. Safe to share
/// across threads; commands are serialized by the exec lock.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("addr", &self.inner.config.address())
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Create a connection in the Disconnected state
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let (stop_tx, stop_rx) = channel::bounded(0);
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                config,
                link: Mutex::new(Link::empty()),
                state: Mutex::new(ConnectionState::Disconnected),
                state_changed: Condvar::new(),
                shutdown_handle: Mutex::new(None),
                last_active: Mutex::new(Instant::now()),
                attempts: AtomicU64::new(0),
                successes: AtomicU64::new(0),
                in_use: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                reconnect_handle: Mutex::new(None),
                stop_tx: Mutex::new(Some(stop_tx)),
                stop_rx,
            }),
        }
    }

    /// Create a connection and connect it
    pub fn open(config: Arc<ClientConfig>) -> Result<Self> {
        let conn = Self::new(config);
        conn.connect()?;
        Ok(conn)
    }

    /// Process-unique identity; never shared by two sockets
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            attempts: self.inner.attempts.load(Ordering::Relaxed),
            successes: self.inner.successes.load(Ordering::Relaxed),
        }
    }

    /// Time since the last connect or completed command
    pub fn idle_time(&self) -> Duration {
        self.inner.last_active.lock().elapsed()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::Acquire)
    }

    pub fn in_use(&self) -> bool {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Execute one command; see [`dispatcher::execute`]
    pub fn execute(&self, command: &Command) -> Result<Response> {
        dispatcher::execute(self, command)
    }

    // =========================================================================
    // Connect / Close
    // =========================================================================

    /// Dial the server and, if configured, authenticate
    ///
    /// No-op when already Ready. If another dial is in flight this waits for
    /// it first and only dials itself if that attempt failed. An auth
    /// rejection fails the whole attempt: the socket is dropped and the state
    /// returns to Disconnected.
    pub fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            while *state == ConnectionState::Connecting {
                self.inner.state_changed.wait(&mut state);
            }
            match *state {
                ConnectionState::Closed => return Err(SsdbError::Closed),
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Disconnected | ConnectionState::Connecting => {
                    *state = ConnectionState::Connecting;
                }
            }
        }

        let dialed = self.dial_and_auth();

        let mut link = self.inner.link.lock();
        let mut state = self.inner.state.lock();
        if *state == ConnectionState::Closed {
            return Err(SsdbError::Closed);
        }
        self.inner.state_changed.notify_all();

        match dialed {
            Ok(fresh) => {
                *link = fresh;
                *state = ConnectionState::Ready;
                self.touch();
                tracing::info!(
                    "Connection {} ready ({})",
                    self.inner.id,
                    self.inner.config.address()
                );
                Ok(())
            }
            Err(e) => {
                *state = ConnectionState::Disconnected;
                self.inner.shutdown_handle.lock().take();
                tracing::warn!(
                    "Connection {} failed to connect to {}: {}",
                    self.inner.id,
                    self.inner.config.address(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Release the socket and stop background work. Idempotent.
    ///
    /// Never blocks on a dial in progress: a socket that is still
    /// authenticating is shut down, and a reconnect thread caught inside
    /// `connect()` is left to notice the Closed state and exit on its own.
    pub fn close(&self) {
        let was_dialing = {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Closed {
                return;
            }
            let was_dialing = *state == ConnectionState::Connecting;
            *state = ConnectionState::Closed;
            self.inner.state_changed.notify_all();
            was_dialing
        };

        // Dropping the sender disconnects the channel and wakes the reconnect loop.
        self.inner.stop_tx.lock().take();

        // Unblock a command stuck in read() so the exec lock is released.
        if let Some(stream) = self.inner.shutdown_handle.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        self.inner.link.lock().discard();

        let handle = self.inner.reconnect_handle.lock().take();
        if let Some(handle) = handle {
            if !was_dialing && handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        tracing::debug!("Connection {} closed", self.inner.id);
    }

    fn dial_and_auth(&self) -> Result<Link> {
        let config = &self.inner.config;
        let stream = dial(config)?;
        if let Some(timeout) = config.read_timeout {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = config.write_timeout {
            stream.set_write_timeout(Some(timeout))?;
        }
        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Publish the socket before auth so close() can interrupt a stalled reply.
        *self.inner.shutdown_handle.lock() = stream.try_clone().ok();
        if self.is_closed() {
            let _ = stream.shutdown(Shutdown::Both);
            self.inner.shutdown_handle.lock().take();
            return Err(SsdbError::Closed);
        }

        let mut link = Link::empty();
        link.stream = Some(stream);

        if let Some(password) = &config.password {
            let auth = Command::new("auth").arg(password.as_str());
            let accepted = dispatcher::exchange(&mut link, &auth)
                .and_then(Response::into_bool)
                .map_err(|e| match e {
                    SsdbError::Command { status, .. } => SsdbError::Auth(status),
                    other => other,
                })?;
            if !accepted {
                return Err(SsdbError::Auth("credential rejected".to_string()));
            }
            tracing::debug!("Connection {} authenticated", self.inner.id);
        }

        Ok(link)
    }

    // =========================================================================
    // Hooks for the dispatcher
    // =========================================================================

    /// Acquire the exec lock
    pub(crate) fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.inner.link.lock()
    }

    /// Fail fast unless Ready; called with the exec lock held
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Closed => Err(SsdbError::Closed),
            other => Err(SsdbError::NotConnected(other)),
        }
    }

    pub(crate) fn record_attempt(&self) {
        self.inner.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.inner.successes.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub(crate) fn touch(&self) {
        *self.inner.last_active.lock() = Instant::now();
    }

    /// Classify a failed exchange and update the lifecycle accordingly
    ///
    /// Called with the exec lock held. Returns the error the caller should see.
    pub(crate) fn handle_failure(&self, link: &mut Link, err: SsdbError) -> SsdbError {
        let mut state = self.inner.state.lock();
        if *state == ConnectionState::Closed {
            return SsdbError::Closed;
        }

        if err.is_transient() {
            tracing::warn!(
                "Connection {} lost ({}), scheduling reconnect",
                self.inner.id,
                err
            );
            link.discard();
            self.inner.shutdown_handle.lock().take();
            *state = ConnectionState::Disconnected;
            drop(state);
            self.schedule_reconnect();
        } else if matches!(err, SsdbError::Protocol(_)) {
            // Stream alignment is lost; this socket is never read again.
            tracing::warn!("Connection {} discarded: {}", self.inner.id, err);
            link.discard();
            self.inner.shutdown_handle.lock().take();
            *state = ConnectionState::Disconnected;
        } else {
            tracing::debug!("Connection {} command failed: {}", self.inner.id, err);
        }

        err
    }

    pub(crate) fn set_in_use(&self, in_use: bool) {
        self.inner.in_use.store(in_use, Ordering::Release);
    }

    /// Claim a reusable connection; false if someone else holds it
    pub(crate) fn try_check_out(&self) -> bool {
        self.inner
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // =========================================================================
    // Reconnect Loop
    // =========================================================================

    /// Start the reconnect loop unless one is already running
    pub(crate) fn schedule_reconnect(&self) {
        if self
            .inner
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Connection {}: reconnect loop already running", self.inner.id);
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let stop = self.inner.stop_rx.clone();
        let interval = self.inner.config.reconnect_interval;

        let spawned = thread::Builder::new()
            .name(format!("ssdbc-reconnect-{}", self.inner.id))
            .spawn(move || reconnect_loop(weak, stop, interval));

        match spawned {
            Ok(handle) => {
                // A previous loop has already finished if we got the flag.
                *self.inner.reconnect_handle.lock() = Some(handle);
            }
            Err(e) => {
                tracing::error!(
                    "Connection {}: failed to spawn reconnect thread: {}",
                    self.inner.id,
                    e
                );
                self.inner.reconnecting.store(false, Ordering::Release);
            }
        }
    }
}

/// Retry `connect()` every `interval` until it succeeds or the connection
/// is closed or dropped
fn reconnect_loop(weak: Weak<ConnectionInner>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let conn = match weak.upgrade() {
            Some(inner) => Connection { inner },
            None => return,
        };

        match conn.connect() {
            Ok(()) => {
                tracing::info!("Connection {} reconnected", conn.inner.id);
                conn.inner.reconnecting.store(false, Ordering::Release);
                // A failure may have slipped in after connect() but before the
                // flag was cleared; its schedule attempt was refused, so keep going.
                if conn.state() == ConnectionState::Disconnected
                    && conn
                        .inner
                        .reconnecting
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    continue;
                }
                return;
            }
            Err(SsdbError::Closed) => break,
            Err(e) => {
                tracing::debug!("Connection {} reconnect attempt failed: {}", conn.inner.id, e);
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.reconnecting.store(false, Ordering::Release);
    }
}

fn dial(config: &ClientConfig) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| SsdbError::Resolve(format!("{}: {}", config.address(), e)))?
        .collect();

    if addrs.is_empty() {
        return Err(SsdbError::Resolve(format!(
            "{}: no addresses found",
            config.address()
        )));
    }

    let mut last_err = None;
    for addr in &addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err
        .map(SsdbError::Io)
        .unwrap_or_else(|| SsdbError::Resolve(config.address())))
}
