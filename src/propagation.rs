//! Propagation modes and the strategy dispatcher.

use crate::context::TxContext;
use crate::error::TxError;
use crate::session::Session;

/// How a unit of work interacts with a transaction already in progress on the
/// caller's logical thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Join the current transaction; begin a new one if none exists.
    #[default]
    Required,
    /// Join the current transaction if one exists; otherwise run without one.
    Supports,
    /// Join the current transaction; fail if none exists.
    Mandatory,
    /// Always begin an independent transaction, hiding any current one from
    /// the nested chain.
    RequiresNew,
    /// Run without a transaction, hiding any current one from the nested
    /// chain. The current transaction is not suspended at the database layer:
    /// writes made here autocommit and stay durable even if it later rolls
    /// back.
    NotSupported,
    /// Open a savepoint on the current transaction; begin a new transaction
    /// if none exists.
    Nested,
    /// Run without a transaction; fail if one exists.
    Never,
}

/// Execution strategy chosen for one frame. Selection is pure: the dispatcher
/// performs no I/O.
pub(crate) enum Strategy {
    /// Begin a new transaction and bind it for the nested chain.
    New,
    /// Reuse the ambient session; the owning frame finalizes it.
    Join(Session),
    /// Run on an autocommit session with no binding.
    RunWithoutTransaction,
    /// Hide the ambient binding and begin an independent transaction.
    SuspendAndNew,
    /// Hide the ambient binding and run on an autocommit session.
    SuspendAndNone,
    /// Open a savepoint on the ambient session and expose it unchanged.
    Savepoint(Session),
    /// Propagation violation: surface the error without invoking the callback.
    Refuse(TxError),
}

pub(crate) fn dispatch(cx: &TxContext, mode: Propagation) -> Strategy {
    match (mode, cx.session().cloned()) {
        (Propagation::Required, None) => Strategy::New,
        (Propagation::Required, Some(session)) => Strategy::Join(session),
        (Propagation::Supports, None) => Strategy::RunWithoutTransaction,
        (Propagation::Supports, Some(session)) => Strategy::Join(session),
        (Propagation::Mandatory, None) => Strategy::Refuse(TxError::MandatoryWithoutTransaction),
        (Propagation::Mandatory, Some(session)) => Strategy::Join(session),
        (Propagation::RequiresNew, None) => Strategy::New,
        (Propagation::RequiresNew, Some(_)) => Strategy::SuspendAndNew,
        (Propagation::NotSupported, None) => Strategy::RunWithoutTransaction,
        (Propagation::NotSupported, Some(_)) => Strategy::SuspendAndNone,
        (Propagation::Nested, None) => Strategy::New,
        (Propagation::Nested, Some(session)) => Strategy::Savepoint(session),
        (Propagation::Never, None) => Strategy::RunWithoutTransaction,
        (Propagation::Never, Some(_)) => Strategy::Refuse(TxError::NeverInTransaction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn bare() -> TxContext {
        TxContext::new()
    }

    fn in_transaction() -> TxContext {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:5432/unused")
            .expect("lazy pool");
        TxContext::new().bind(Session::autocommit(pool))
    }

    #[test]
    fn default_mode_is_required() {
        assert_eq!(Propagation::default(), Propagation::Required);
    }

    #[tokio::test]
    async fn required_begins_or_joins() {
        assert!(matches!(dispatch(&bare(), Propagation::Required), Strategy::New));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::Required),
            Strategy::Join(_)
        ));
    }

    #[tokio::test]
    async fn supports_runs_bare_or_joins() {
        assert!(matches!(
            dispatch(&bare(), Propagation::Supports),
            Strategy::RunWithoutTransaction
        ));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::Supports),
            Strategy::Join(_)
        ));
    }

    #[tokio::test]
    async fn mandatory_joins_or_refuses() {
        assert!(matches!(
            dispatch(&bare(), Propagation::Mandatory),
            Strategy::Refuse(TxError::MandatoryWithoutTransaction)
        ));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::Mandatory),
            Strategy::Join(_)
        ));
    }

    #[tokio::test]
    async fn requires_new_always_begins() {
        assert!(matches!(
            dispatch(&bare(), Propagation::RequiresNew),
            Strategy::New
        ));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::RequiresNew),
            Strategy::SuspendAndNew
        ));
    }

    #[tokio::test]
    async fn not_supported_never_runs_transactionally() {
        assert!(matches!(
            dispatch(&bare(), Propagation::NotSupported),
            Strategy::RunWithoutTransaction
        ));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::NotSupported),
            Strategy::SuspendAndNone
        ));
    }

    #[tokio::test]
    async fn nested_begins_or_opens_savepoint() {
        assert!(matches!(dispatch(&bare(), Propagation::Nested), Strategy::New));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::Nested),
            Strategy::Savepoint(_)
        ));
    }

    #[tokio::test]
    async fn never_runs_bare_or_refuses() {
        assert!(matches!(
            dispatch(&bare(), Propagation::Never),
            Strategy::RunWithoutTransaction
        ));
        assert!(matches!(
            dispatch(&in_transaction(), Propagation::Never),
            Strategy::Refuse(TxError::NeverInTransaction)
        ));
    }
}
