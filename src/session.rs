//! Session handles over a physical transaction or the autocommit pool.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};

use crate::error::TxError;

type TxSlot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Handle to the database session a unit-of-work callback writes through.
///
/// Cheap to clone; clones refer to the same underlying session. A
/// transactional session is finalized exactly once by the frame that began
/// it, after which any use surfaces [`TxError::SessionClosed`]. An autocommit
/// session checks a fresh pooled connection out per [`acquire`](Self::acquire)
/// and every statement commits on its own.
#[derive(Clone)]
pub struct Session {
    kind: SessionKind,
}

#[derive(Clone)]
enum SessionKind {
    Transactional(TxSlot),
    Autocommit(PgPool),
}

impl Session {
    pub(crate) fn transactional(tx: Transaction<'static, Postgres>) -> Self {
        Session {
            kind: SessionKind::Transactional(Arc::new(Mutex::new(Some(tx)))),
        }
    }

    pub(crate) fn autocommit(pool: PgPool) -> Self {
        Session {
            kind: SessionKind::Autocommit(pool),
        }
    }

    /// Check out the session's connection for issuing statements.
    ///
    /// Drop the returned guard before re-entering the manager on the same
    /// logical chain; a nested frame that joins this session cannot make
    /// progress while the guard is held.
    pub async fn acquire(&self) -> Result<SessionConn, TxError> {
        match &self.kind {
            SessionKind::Transactional(slot) => {
                let guard = Arc::clone(slot).lock_owned().await;
                match OwnedMutexGuard::try_map(guard, Option::as_mut) {
                    Ok(tx) => Ok(SessionConn {
                        inner: ConnInner::Tx(tx),
                    }),
                    Err(_) => Err(TxError::SessionClosed),
                }
            }
            SessionKind::Autocommit(pool) => Ok(SessionConn {
                inner: ConnInner::Raw(pool.acquire().await?),
            }),
        }
    }

    /// Commit the owned transaction, emptying the slot.
    pub(crate) async fn commit(&self) -> Result<(), TxError> {
        let tx = self.take().await?;
        tx.commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll the owned transaction back, emptying the slot.
    pub(crate) async fn rollback(&self) -> Result<(), TxError> {
        let tx = self.take().await?;
        tx.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    pub(crate) async fn savepoint_begin(&self, name: &str) -> Result<(), TxError> {
        self.execute_control(&format!("SAVEPOINT {name}")).await
    }

    pub(crate) async fn savepoint_release(&self, name: &str) -> Result<(), TxError> {
        self.execute_control(&format!("RELEASE SAVEPOINT {name}"))
            .await
    }

    pub(crate) async fn savepoint_rollback_to(&self, name: &str) -> Result<(), TxError> {
        self.execute_control(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .await
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>, TxError> {
        match &self.kind {
            SessionKind::Transactional(slot) => {
                slot.lock().await.take().ok_or(TxError::SessionClosed)
            }
            SessionKind::Autocommit(_) => Err(TxError::SessionClosed),
        }
    }

    async fn execute_control(&self, sql: &str) -> Result<(), TxError> {
        let mut conn = self.acquire().await?;
        sqlx::raw_sql(sql).execute(&mut *conn).await?;
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SessionKind::Transactional(_) => f.write_str("Session(transactional)"),
            SessionKind::Autocommit(_) => f.write_str("Session(autocommit)"),
        }
    }
}

/// RAII guard vending the session's underlying [`PgConnection`].
///
/// Dereference mutably to pass the connection to `sqlx` query executors:
///
/// ```ignore
/// let mut conn = session.acquire().await?;
/// sqlx::query("INSERT INTO users (username) VALUES ($1)")
///     .bind("alice")
///     .execute(&mut *conn)
///     .await?;
/// ```
pub struct SessionConn {
    inner: ConnInner,
}

enum ConnInner {
    Tx(OwnedMappedMutexGuard<Option<Transaction<'static, Postgres>>, Transaction<'static, Postgres>>),
    Raw(PoolConnection<Postgres>),
}

impl Deref for SessionConn {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match &self.inner {
            ConnInner::Tx(tx) => &***tx,
            ConnInner::Raw(conn) => &**conn,
        }
    }
}

impl DerefMut for SessionConn {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match &mut self.inner {
            ConnInner::Tx(tx) => &mut ***tx,
            ConnInner::Raw(conn) => &mut **conn,
        }
    }
}

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next savepoint name, unique process-wide (and so within any enclosing
/// physical transaction).
pub(crate) fn next_savepoint_name() -> String {
    format!("sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed))
}
