//! Per-invocation carrier for the active session binding.

use crate::session::Session;

/// Immutable invocation context flowing down a unit-of-work call chain.
///
/// A context carries at most one binding: the session governing writes for the
/// current logical thread of control. Deriving a child (`bind`/`hide`) never
/// mutates the parent, so a frame's binding disappears with the frame.
///
/// Cancellation follows the caller's own future scope; dropping the future of
/// an in-flight `transaction` call abandons the chain and the underlying
/// transaction rolls back when its connection is released.
#[derive(Clone, Default)]
pub struct TxContext {
    session: Option<Session>,
}

impl TxContext {
    /// An empty context: no transaction is active on this logical thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child context with `session` as the active binding.
    pub(crate) fn bind(&self, session: Session) -> Self {
        TxContext {
            session: Some(session),
        }
    }

    /// Derive a child context with the binding cleared.
    pub(crate) fn hide(&self) -> Self {
        TxContext { session: None }
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn stub_session() -> Session {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:5432/unused")
            .expect("lazy pool");
        Session::autocommit(pool)
    }

    #[tokio::test]
    async fn bind_derives_child_without_touching_parent() {
        let parent = TxContext::new();
        let child = parent.bind(stub_session());

        assert!(parent.session().is_none());
        assert!(child.session().is_some());
    }

    #[tokio::test]
    async fn hide_clears_binding_in_child_only() {
        let parent = TxContext::new().bind(stub_session());
        let child = parent.hide();

        assert!(parent.session().is_some());
        assert!(child.session().is_none());
    }
}
