//! Client Facade
//!
//! A logical client: one pooled connection plus thin per-command wrappers.
//! Each wrapper only builds an argument list, calls [`Client::execute`], and
//! interprets the reply by its command category.

use bytes::Bytes;
use parking_lot::Mutex;

use crate::batch::BatchCoordinator;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::network::{dispatcher, Connection, Pool};
use crate::protocol::{Argument, Command, Pairs, Reply, Response};

/// Client bound to one connection from a pool
pub struct Client {
    pool: Pool,
    conn: Mutex<Connection>,
}

impl Client {
    /// Build a dedicated pool from `config` and connect
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let pool = Pool::new(config)?;
        Self::from_pool(pool)
    }

    /// Acquire a connection from an existing pool
    pub fn from_pool(pool: Pool) -> Result<Self> {
        let conn = pool.acquire()?;
        Ok(Self {
            pool,
            conn: Mutex::new(conn),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The connection currently backing this client
    ///
    /// If the pool has closed it (e.g. swept while idle) a fresh one is
    /// acquired first.
    pub fn connection(&self) -> Result<Connection> {
        let mut conn = self.conn.lock();
        if conn.is_closed() {
            tracing::debug!("Connection {} was closed, acquiring a new one", conn.id());
            *conn = self.pool.acquire()?;
        }
        Ok(conn.clone())
    }

    // =========================================================================
    // Core
    // =========================================================================

    /// Execute a prepared command and return the raw response
    pub fn execute(&self, command: &Command) -> Result<Response> {
        self.connection()?.execute(command)
    }

    /// Execute `name args...` and interpret the reply by command category
    pub fn call(&self, name: &str, args: Vec<Argument>) -> Result<Reply> {
        let command = Command::with_args(name, args);
        let kind = command.kind();
        self.execute(&command)?.interpret(kind)
    }

    /// Send all commands back to back on this client's connection, then read
    /// every response
    pub fn pipeline(&self, commands: &[Command]) -> Result<Vec<Response>> {
        dispatcher::pipeline(&self.connection()?, commands)
    }

    /// Fan `commands` out over `batch_workers` connections
    pub fn multi_write(&self, commands: Vec<Command>) -> Result<Vec<Response>> {
        let workers = self.pool.config().batch_workers;
        self.multi_write_with(commands, workers)
    }

    /// Fan `commands` out over an explicit number of workers
    pub fn multi_write_with(&self, commands: Vec<Command>, workers: usize) -> Result<Vec<Response>> {
        let conn = self.connection()?;
        BatchCoordinator::new(&self.pool).multi_write(&conn, commands, workers)
    }

    /// Multi-write of `set key value` pairs
    pub fn multi_set<K, V>(&self, pairs: Vec<(K, V)>) -> Result<Vec<Response>>
    where
        K: Into<Argument>,
        V: Into<Argument>,
    {
        let commands = pairs
            .into_iter()
            .map(|(key, value)| Command::new("set").arg(key).arg(value))
            .collect();
        self.multi_write(commands)
    }

    /// Tear down this client's connection
    pub fn close(&self) {
        let conn = self.conn.lock();
        self.pool.discard(&conn);
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Re-authenticate on the current connection
    pub fn auth(&self, password: &str) -> Result<bool> {
        self.execute(&Command::new("auth").arg(password))?.into_bool()
    }

    pub fn set(&self, key: &str, value: impl Into<Argument>) -> Result<bool> {
        self.execute(&Command::new("set").arg(key).arg(value))?
            .into_done()
    }

    /// Set with a time-to-live in seconds
    pub fn setx(&self, key: &str, value: impl Into<Argument>, ttl: i64) -> Result<bool> {
        self.execute(&Command::new("setx").arg(key).arg(value).arg(ttl))?
            .into_done()
    }

    /// Set only if the key does not exist yet
    pub fn setnx(&self, key: &str, value: impl Into<Argument>) -> Result<bool> {
        self.execute(&Command::new("setnx").arg(key).arg(value))?
            .into_bool()
    }

    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.execute(&Command::new("get").arg(key))?.into_value()
    }

    /// Set a new value and return the old one
    pub fn getset(&self, key: &str, value: impl Into<Argument>) -> Result<Option<Bytes>> {
        self.execute(&Command::new("getset").arg(key).arg(value))?
            .into_value()
    }

    pub fn del(&self, key: &str) -> Result<bool> {
        self.execute(&Command::new("del").arg(key))?.into_done()
    }

    /// Add `by` to an integer value, returning the new value
    pub fn incr(&self, key: &str, by: i64) -> Result<Option<i64>> {
        self.execute(&Command::new("incr").arg(key).arg(by))?
            .into_int()
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.execute(&Command::new("exists").arg(key))?.into_bool()
    }

    pub fn expire(&self, key: &str, ttl: i64) -> Result<bool> {
        self.execute(&Command::new("expire").arg(key).arg(ttl))?
            .into_bool()
    }

    /// Remaining time-to-live in seconds
    pub fn ttl(&self, key: &str) -> Result<Option<i64>> {
        self.execute(&Command::new("ttl").arg(key))?.into_int()
    }

    /// Keys in `(start, end]` with their values
    pub fn scan(&self, start: &str, end: &str, limit: i64) -> Result<Pairs> {
        self.execute(&Command::new("scan").arg(start).arg(end).arg(limit))?
            .into_pairs()
    }

    /// Like [`Client::scan`] in reverse order
    pub fn rscan(&self, start: &str, end: &str, limit: i64) -> Result<Pairs> {
        self.execute(&Command::new("rscan").arg(start).arg(end).arg(limit))?
            .into_pairs()
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    pub fn hset(&self, hash: &str, key: &str, value: impl Into<Argument>) -> Result<bool> {
        self.execute(&Command::new("hset").arg(hash).arg(key).arg(value))?
            .into_done()
    }

    pub fn hget(&self, hash: &str, key: &str) -> Result<Option<Bytes>> {
        self.execute(&Command::new("hget").arg(hash).arg(key))?
            .into_value()
    }

    pub fn hdel(&self, hash: &str, key: &str) -> Result<bool> {
        self.execute(&Command::new("hdel").arg(hash).arg(key))?
            .into_done()
    }

    pub fn hincr(&self, hash: &str, key: &str, by: i64) -> Result<Option<i64>> {
        self.execute(&Command::new("hincr").arg(hash).arg(key).arg(by))?
            .into_int()
    }

    pub fn hexists(&self, hash: &str, key: &str) -> Result<bool> {
        self.execute(&Command::new("hexists").arg(hash).arg(key))?
            .into_bool()
    }

    /// Number of fields in a hash (0 when it does not exist)
    pub fn hsize(&self, hash: &str) -> Result<i64> {
        Ok(self
            .execute(&Command::new("hsize").arg(hash))?
            .into_int()?
            .unwrap_or(0))
    }

    /// Hash names in `(start, end]`
    pub fn hlist(&self, start: &str, end: &str, limit: i64) -> Result<Vec<Bytes>> {
        self.execute(&Command::new("hlist").arg(start).arg(end).arg(limit))?
            .into_list()
    }

    /// Field names of `hash` in `(start, end]`
    pub fn hkeys(&self, hash: &str, start: &str, end: &str, limit: i64) -> Result<Vec<Bytes>> {
        self.execute(
            &Command::new("hkeys")
                .arg(hash)
                .arg(start)
                .arg(end)
                .arg(limit),
        )?
        .into_list()
    }

    pub fn hgetall(&self, hash: &str) -> Result<Pairs> {
        self.execute(&Command::new("hgetall").arg(hash))?
            .into_pairs()
    }

    pub fn hscan(&self, hash: &str, start: &str, end: &str, limit: i64) -> Result<Pairs> {
        self.execute(
            &Command::new("hscan")
                .arg(hash)
                .arg(start)
                .arg(end)
                .arg(limit),
        )?
        .into_pairs()
    }

    pub fn hrscan(&self, hash: &str, start: &str, end: &str, limit: i64) -> Result<Pairs> {
        self.execute(
            &Command::new("hrscan")
                .arg(hash)
                .arg(start)
                .arg(end)
                .arg(limit),
        )?
        .into_pairs()
    }

    /// Delete a whole hash, returning how many fields were removed
    pub fn hclear(&self, hash: &str) -> Result<i64> {
        Ok(self
            .execute(&Command::new("hclear").arg(hash))?
            .into_int()?
            .unwrap_or(0))
    }

    /// Set several fields of one hash
    pub fn multi_hset<K, V>(&self, hash: &str, fields: Vec<(K, V)>) -> Result<Option<i64>>
    where
        K: Into<Argument>,
        V: Into<Argument>,
    {
        let mut command = Command::new("multi_hset").arg(hash);
        for (key, value) in fields {
            command = command.arg(key).arg(value);
        }
        self.execute(&command)?.into_int()
    }

    /// Fetch several fields of one hash; missing ones are simply absent
    pub fn multi_hget(&self, hash: &str, keys: &[&str]) -> Result<Pairs> {
        self.execute(&Command::new("multi_hget").arg(hash).args(keys.iter().copied()))?
            .into_pairs()
    }

    pub fn multi_hdel(&self, hash: &str, keys: &[&str]) -> Result<Option<i64>> {
        self.execute(&Command::new("multi_hdel").arg(hash).args(keys.iter().copied()))?
            .into_int()
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Every field name of `hash`, fetched `page` keys at a time
    ///
    /// Each page starts after the last key of the previous one. Stops early
    /// when a page comes back empty.
    pub fn hash_keys_all(&self, hash: &str, page: i64) -> Result<Vec<Bytes>> {
        let mut keys = Vec::new();
        let size = self.key_pages(hash, page, |batch| {
            keys.extend(batch);
            Ok(())
        })?;

        tracing::debug!("Hash {} listed {} of {} keys", hash, keys.len(), size);
        Ok(keys)
    }

    /// Every field of `hash` with its value, `page` fields per round trip
    ///
    /// Lists a page of keys with `hkeys`, then fetches their values with one
    /// `multi_hget`. Suited to hashes too large for a single `hgetall` reply.
    /// Fields deleted between the two steps are simply absent.
    pub fn hgetall_paged(&self, hash: &str, page: i64) -> Result<Pairs> {
        let mut pairs = Pairs::new();
        let size = self.key_pages(hash, page, |batch| {
            let command = Command::new("multi_hget").arg(hash).args(batch);
            pairs.extend(self.execute(&command)?.into_pairs()?);
            Ok(())
        })?;

        tracing::debug!("Hash {} fetched {} of {} fields", hash, pairs.len(), size);
        Ok(pairs)
    }

    /// Walk the keys of `hash` page by page, handing each page to `visit`
    ///
    /// Returns the size reported by `hsize`. The page count is derived from
    /// it, and a non-positive size means no pages at all.
    fn key_pages<F>(&self, hash: &str, page: i64, mut visit: F) -> Result<i64>
    where
        F: FnMut(Vec<Bytes>) -> Result<()>,
    {
        let size = self.hsize(hash)?;
        let page = page.max(1);
        let pages = if size > 0 {
            size / page + i64::from(size % page != 0)
        } else {
            0
        };

        let mut start = Bytes::new();
        for _ in 0..pages {
            let command = Command::new("hkeys")
                .arg(hash)
                .arg(start.clone())
                .arg("")
                .arg(page);
            let batch = self.execute(&command)?.into_list()?;
            match batch.last() {
                Some(last) => start = last.clone(),
                None => break,
            }
            visit(batch)?;
        }
        Ok(size)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let conn = self.conn.get_mut();
        if self.pool.config().reuse_connections && conn.is_ready() {
            self.pool.release(conn);
        } else {
            self.pool.discard(conn);
        }
    }
}
