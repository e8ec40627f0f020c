//! Fixed-size pool of connections to one upstream node.
//!
//! Each connection is held by at most one caller at a time. A semaphore with
//! one permit per slot bounds the number of holders, so a saturated claim
//! parks on the semaphore instead of spinning. Once a permit is held, a short
//! scan under the cursor lock try-locks slots round-robin; a free slot always
//! exists because permits never outnumber free slots.

use std::ops::Deref;
use std::sync::{Mutex as StdMutex, PoisonError};

use futures::future::try_join_all;
use tokio::sync::{Mutex, MutexGuard, OnceCell, Semaphore, SemaphorePermit};
use tracing::info;

use crate::error::{RpcError, TransportError};
use crate::transport::{Connect, RpcTransport};

/// A fixed set of exclusively claimed connections.
pub struct ConnectionPool<C> {
    url: String,
    slots: Vec<Mutex<C>>,
    permits: Semaphore,
    /// Next slot to probe. The lock also serializes the slot scan.
    cursor: StdMutex<usize>,
    /// Set once every connection has been closed.
    shut: OnceCell<()>,
}

/// Exclusive hold on one pooled connection. Dropping it returns the slot.
pub struct PooledConnection<'a, C> {
    // Field order matters: the slot unlocks before the permit is returned,
    // so a new permit holder always finds a free slot.
    conn: MutexGuard<'a, C>,
    _permit: SemaphorePermit<'a>,
    index: usize,
}

impl<C> PooledConnection<'_, C> {
    /// Position of the claimed slot in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the slot to the pool. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl<C> Deref for PooledConnection<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: RpcTransport> ConnectionPool<C> {
    /// Dial `size` connections to `url` concurrently.
    ///
    /// Fails fast if any dial fails; no partial pool is returned.
    pub async fn connect<K>(connector: &K, url: &str, size: usize) -> Result<Self, RpcError>
    where
        K: Connect<Conn = C>,
    {
        check_size(size)?;
        let dials = (0..size).map(|index| async move {
            connector
                .connect(url)
                .await
                .map_err(|e| TransportError::Dial {
                    index,
                    url: url.to_string(),
                    reason: e.to_string(),
                })
        });
        let conns = try_join_all(dials).await?;
        info!(url, size, "connection pool established");
        Self::from_connections(url, conns)
    }

    /// Build a pool from connections that are already established.
    pub fn from_connections(url: impl Into<String>, conns: Vec<C>) -> Result<Self, RpcError> {
        check_size(conns.len())?;
        let size = conns.len();
        Ok(Self {
            url: url.into(),
            slots: conns.into_iter().map(Mutex::new).collect(),
            permits: Semaphore::new(size),
            cursor: StdMutex::new(0),
            shut: OnceCell::new(),
        })
    }

    /// Claim one connection exclusively, waiting while all are in use.
    ///
    /// Fails with [`TransportError::PoolClosed`] once [`close`](Self::close)
    /// has started.
    pub async fn claim(&self) -> Result<PooledConnection<'_, C>, TransportError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::PoolClosed)?;

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let n = self.slots.len();
        for _ in 0..n {
            let index = *cursor;
            *cursor = (index + 1) % n;
            if let Ok(conn) = self.slots[index].try_lock() {
                return Ok(PooledConnection {
                    conn,
                    _permit: permit,
                    index,
                });
            }
        }
        Err(TransportError::Other(
            "connection pool has a permit but no free slot".into(),
        ))
    }

    /// Wait for every outstanding claim to be released, then shut the pool.
    ///
    /// Later claims fail with [`TransportError::PoolClosed`]. Concurrent
    /// callers all return once the connections are closed; closing a closed
    /// pool is a no-op.
    pub async fn close(&self) {
        self.shut.get_or_init(|| self.shut_down()).await;
    }

    async fn shut_down(&self) {
        // Fails only if an earlier, cancelled shutdown already closed the semaphore.
        if let Ok(all) = self.permits.acquire_many(self.slots.len() as u32).await {
            all.forget();
            self.permits.close();
        }
        for slot in &self.slots {
            slot.lock().await.close().await;
        }
        info!(url = %self.url, size = self.slots.len(), "connection pool closed");
    }

    /// Number of connections in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; a pool holds at least one connection.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Connections not currently claimed.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// The upstream endpoint every connection targets.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn check_size(size: usize) -> Result<(), RpcError> {
    if size == 0 {
        return Err(RpcError::InvalidArgument("pool size must be positive".into()));
    }
    if size > Semaphore::MAX_PERMITS || u32::try_from(size).is_err() {
        return Err(RpcError::InvalidArgument(format!("pool size {size} is too large")));
    }
    Ok(())
}
