//! Bounded pool of SQLite sessions.
//!
//! # Responsibility
//! - Lend one migrated connection to each store operation.
//! - Return the connection on every exit path, including unwinding.
//! - Bound both the number of open connections and the wait for one.
//!
//! # Invariants
//! - At most `max_size` connections exist at any time.
//! - `acquire` never blocks longer than the configured timeout.
//! - In-memory databases are served by a single connection, since separate
//!   in-memory connections would see separate databases.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::store::{StoreError, StoreResult};
use log::warn;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Where the pool opens its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

/// Fixed-capacity connection pool.
pub struct SessionPool {
    location: DatabaseLocation,
    max_size: usize,
    acquire_timeout: Duration,
    busy_timeout: Duration,
    state: Mutex<PoolState>,
    returned: Condvar,
}

impl SessionPool {
    /// Opens the first connection eagerly so schema errors surface at start-up.
    pub fn open(
        location: DatabaseLocation,
        max_size: usize,
        acquire_timeout: Duration,
        busy_timeout: Duration,
    ) -> DbResult<Self> {
        let max_size = match location {
            DatabaseLocation::Memory => 1,
            DatabaseLocation::File(_) => max_size.max(1),
        };
        let first = connect(&location, busy_timeout)?;

        Ok(Self {
            location,
            max_size,
            acquire_timeout,
            busy_timeout,
            state: Mutex::new(PoolState {
                idle: vec![first],
                open: 1,
            }),
            returned: Condvar::new(),
        })
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Borrows a session, opening a new connection while under capacity.
    ///
    /// # Errors
    /// - `StoreError::Unavailable` when no session frees up in time.
    /// - `StoreError::Db` when a new connection fails to open.
    pub fn acquire(&self) -> StoreResult<PooledSession<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.lock_state()?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledSession {
                    pool: self,
                    conn: Some(conn),
                });
            }

            if state.open < self.max_size {
                state.open += 1;
                drop(state);
                return match connect(&self.location, self.busy_timeout) {
                    Ok(conn) => Ok(PooledSession {
                        pool: self,
                        conn: Some(conn),
                    }),
                    Err(err) => {
                        if let Ok(mut state) = self.state.lock() {
                            state.open -= 1;
                        }
                        Err(err.into())
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "event=session_acquire module=db status=timeout waited_ms={} pool_size={}",
                    self.acquire_timeout.as_millis(),
                    self.max_size
                );
                return Err(StoreError::Unavailable(format!(
                    "no session available within {}ms",
                    self.acquire_timeout.as_millis()
                )));
            }

            let (guard, _) = self
                .returned
                .wait_timeout(state, deadline - now)
                .map_err(|_| poisoned())?;
            state = guard;
        }
    }

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|_| poisoned())
    }

    fn release(&self, conn: Connection) {
        // A poisoned pool drops the connection instead of handing it out again.
        if let Ok(mut state) = self.state.lock() {
            state.idle.push(conn);
            drop(state);
            self.returned.notify_one();
        }
    }
}

/// Connection on loan from a [`SessionPool`].
pub struct PooledSession<'pool> {
    pool: &'pool SessionPool,
    conn: Option<Connection>,
}

impl Deref for PooledSession<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("session used after release"))
    }
}

impl DerefMut for PooledSession<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("session used after release"))
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

fn connect(location: &DatabaseLocation, busy_timeout: Duration) -> DbResult<Connection> {
    match location {
        DatabaseLocation::File(path) => open_db(path, busy_timeout),
        DatabaseLocation::Memory => open_db_in_memory(busy_timeout),
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("session pool lock poisoned".to_string())
}
