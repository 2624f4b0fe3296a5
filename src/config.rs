//! Configuration for ssdbc
//!
//! Everything the client core consumes from its environment. Nothing here is
//! parsed from files or the process environment; callers (or the CLI) build it.

use std::time::Duration;

use crate::error::{Result, SsdbError};

/// Client, pool and batch configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Target
    // -------------------------------------------------------------------------
    /// Server host name or IP
    pub host: String,

    /// Server port
    pub port: u16,

    /// Credential sent with `auth` right after every (re)connect
    pub password: Option<String>,

    // -------------------------------------------------------------------------
    // Socket Deadlines
    // -------------------------------------------------------------------------
    /// Dial timeout (None = platform default)
    pub connect_timeout: Option<Duration>,

    /// Socket read deadline (None = block until data or EOF)
    pub read_timeout: Option<Duration>,

    /// Socket write deadline (None = block)
    pub write_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Delay between reconnect attempts after a transient failure
    pub reconnect_interval: Duration,

    // -------------------------------------------------------------------------
    // Pool
    // -------------------------------------------------------------------------
    /// Connections idle for longer than this are swept
    pub idle_timeout: Duration,

    /// How often the background sweep runs
    pub sweep_interval: Duration,

    /// Max connections registered in one pool
    pub max_connections: usize,

    /// Hand idle Ready connections back out instead of dialing new ones
    pub reuse_connections: bool,

    // -------------------------------------------------------------------------
    // Batch
    // -------------------------------------------------------------------------
    /// Parallel workers (connections) used by multi-writes
    pub batch_workers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            password: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            reconnect_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            max_connections: 64,
            reuse_connections: false,
            batch_workers: 4,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `host:port` form of the target address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject values the pool and background loops cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SsdbError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(SsdbError::Config("port must be non-zero".to_string()));
        }
        if self.reconnect_interval.is_zero() {
            return Err(SsdbError::Config(
                "reconnect_interval must be non-zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(SsdbError::Config("sweep_interval must be non-zero".to_string()));
        }
        if self.max_connections == 0 {
            return Err(SsdbError::Config("max_connections must be at least 1".to_string()));
        }
        if self.batch_workers == 0 {
            return Err(SsdbError::Config("batch_workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the credential used for `auth`
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    /// Set the delay between reconnect attempts
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Set the idle time after which the sweep reaps a connection
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the sweep period
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the pool size limit
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Enable or disable connection reuse
    pub fn reuse_connections(mut self, reuse: bool) -> Self {
        self.config.reuse_connections = reuse;
        self
    }

    /// Set the number of batch workers
    pub fn batch_workers(mut self, workers: usize) -> Self {
        self.config.batch_workers = workers;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
