use thiserror::Error;

/// Errors surfaced by the transaction manager.
///
/// The two propagation violations are sentinels: they are returned before the
/// unit-of-work callback is invoked. Callback errors pass through unchanged;
/// when a rollback triggered by a callback error itself fails, the callback
/// error wins and the rollback failure is logged.
#[derive(Debug, Error)]
pub enum TxError {
    /// `Propagation::Mandatory` was requested with no transaction in flight.
    #[error("mandatory propagation requires an active transaction")]
    MandatoryWithoutTransaction,

    /// `Propagation::Never` was requested inside an active transaction.
    #[error("never propagation forbids an active transaction")]
    NeverInTransaction,

    /// A session handle was used after its transaction was finalized.
    #[error("session already finalized")]
    SessionClosed,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Application-level failure returned from a unit-of-work callback.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}
