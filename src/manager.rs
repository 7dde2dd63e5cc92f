//! Unit-of-work runner: resource setup, callback invocation, finalization.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use sqlx::PgPool;

use crate::context::TxContext;
use crate::error::TxError;
use crate::propagation::{dispatch, Propagation, Strategy};
use crate::session::{next_savepoint_name, Session};

/// Declarative transaction manager over a configured connection pool.
///
/// Each [`transaction`](Self::transaction) call is one frame. The frame
/// inspects the context for an in-flight session, picks a strategy from the
/// requested propagation mode, runs the callback with a derived child context
/// and the session it should write through, and finalizes whatever resource
/// the frame owns (a fresh transaction, a savepoint, or nothing) exactly
/// once on every exit path, panics included.
#[derive(Clone)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `f` as a unit of work under the first mode in `modes`.
    ///
    /// An empty `modes` slice means [`Propagation::Required`]; entries past
    /// the first are ignored. Supply at most one mode at call sites.
    ///
    /// The callback receives the child context to hand to nested
    /// `transaction` calls and the session to write through. Returning
    /// `Err` rolls back the resource owned by this frame: the whole
    /// transaction for a frame that began one, the savepoint for a nested
    /// frame, nothing for a joined frame (the outermost owner decides). A
    /// panic in the callback triggers the same rollback, then resumes
    /// unwinding.
    pub fn transaction<'a, F, Fut>(
        &'a self,
        cx: &'a TxContext,
        modes: &[Propagation],
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<(), TxError>> + Send + 'a>>
    where
        F: FnOnce(TxContext, Session) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TxError>> + Send + 'static,
    {
        let mode = modes.first().copied().unwrap_or_default();
        Box::pin(async move {
            match dispatch(cx, mode) {
                Strategy::New | Strategy::SuspendAndNew => self.run_new(cx, mode, f).await,
                Strategy::Join(session) => {
                    tracing::debug!(?mode, "joining in-flight transaction");
                    f(cx.clone(), session).await
                }
                Strategy::RunWithoutTransaction | Strategy::SuspendAndNone => {
                    tracing::debug!(?mode, "running without transaction");
                    let session = Session::autocommit(self.pool.clone());
                    f(cx.hide(), session).await
                }
                Strategy::Savepoint(session) => self.run_savepoint(cx, session, f).await,
                Strategy::Refuse(err) => Err(err),
            }
        })
    }

    /// NEW / SUSPEND-AND-NEW: begin, bind, invoke, commit or roll back.
    ///
    /// Binding the fresh session replaces any outer binding in the child
    /// context, so suspension needs no separate handling here: the outer
    /// transaction simply stays out of the nested chain's reach.
    fn run_new<'a, F, Fut>(
        &'a self,
        cx: &'a TxContext,
        mode: Propagation,
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<(), TxError>> + Send + 'a>>
    where
        F: FnOnce(TxContext, Session) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TxError>> + Send + 'static,
    {
        Box::pin(async move {
            let tx = self.pool.begin().await?;
            let session = Session::transactional(tx);
            tracing::debug!(?mode, "began new transaction");

            let child = cx.bind(session.clone());
            let callback_session = session.clone();
            let outcome = AssertUnwindSafe(async move { f(child, callback_session).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => session.commit().await,
                Ok(Err(err)) => {
                    if let Err(rollback_err) = session.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback failed after callback error");
                    }
                    Err(err)
                }
                Err(panic) => {
                    if let Err(rollback_err) = session.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback failed after callback panic");
                    }
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }

    /// SAVEPOINT: open, invoke with the ambient session, release or roll
    /// back to it.
    fn run_savepoint<'a, F, Fut>(
        &'a self,
        cx: &'a TxContext,
        session: Session,
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<(), TxError>> + Send + 'a>>
    where
        F: FnOnce(TxContext, Session) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TxError>> + Send + 'static,
    {
        Box::pin(async move {
            let name = next_savepoint_name();
            session.savepoint_begin(&name).await?;
            tracing::debug!(savepoint = %name, "opened savepoint");

            let child = cx.clone();
            let callback_session = session.clone();
            let outcome = AssertUnwindSafe(async move { f(child, callback_session).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(savepoint = %name, "releasing savepoint");
                    session.savepoint_release(&name).await
                }
                Ok(Err(err)) => {
                    if let Err(rollback_err) = session.savepoint_rollback_to(&name).await {
                        tracing::warn!(
                            savepoint = %name,
                            error = %rollback_err,
                            "savepoint rollback failed after callback error"
                        );
                    }
                    Err(err)
                }
                Err(panic) => {
                    if let Err(rollback_err) = session.savepoint_rollback_to(&name).await {
                        tracing::warn!(
                            savepoint = %name,
                            error = %rollback_err,
                            "savepoint rollback failed after callback panic"
                        );
                    }
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }
}
