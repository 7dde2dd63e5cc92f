//! Base construct for application repositories.

use crate::manager::TransactionManager;

/// Convenience alias re-exposing the transaction manager so repository types
/// can embed one and share a single pool across calls:
///
/// ```ignore
/// struct UserRepository {
///     base: BaseRepository,
/// }
///
/// impl UserRepository {
///     fn new(pool: sqlx::PgPool) -> Self {
///         Self { base: BaseRepository::new(pool) }
///     }
/// }
/// ```
pub type BaseRepository = TransactionManager;
