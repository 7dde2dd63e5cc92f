//! Declarative transaction manager for PostgreSQL over `sqlx`.
//!
//! Application code composes nested units of work, async callbacks that read
//! and write through a handed-in [`Session`], and a [`Propagation`] mode
//! decides, per nesting level, whether the unit joins the enclosing
//! transaction, suspends it, begins an independent one, opens a savepoint, or
//! refuses outright. The active session travels down the call chain inside an
//! immutable [`TxContext`], and every frame finalizes the resource it owns
//! (transaction or savepoint) exactly once, whether the callback returns
//! `Ok`, returns `Err`, or panics.
//!
//! ```no_run
//! use txflow::{Propagation, TransactionManager, TxContext};
//!
//! # async fn demo() -> Result<(), txflow::TxError> {
//! let config = txflow::config::Config::load()?;
//! let pool = txflow::db::create_pool(&config).await?;
//! let manager = TransactionManager::new(pool);
//! let manager = &manager;
//!
//! manager
//!     .transaction(&TxContext::new(), &[Propagation::Required], |cx, session| async move {
//!         {
//!             let mut conn = session.acquire().await?;
//!             sqlx::query("INSERT INTO users (username) VALUES ($1)")
//!                 .bind("alice")
//!                 .execute(&mut *conn)
//!                 .await?;
//!         }
//!
//!         // Nested unit: joins the transaction above via the child context.
//!         manager
//!             .transaction(&cx, &[Propagation::Required], |_cx, session| async move {
//!                 let mut conn = session.acquire().await?;
//!                 sqlx::query("INSERT INTO users (username) VALUES ($1)")
//!                     .bind("bob")
//!                     .execute(&mut *conn)
//!                     .await?;
//!                 Ok(())
//!             })
//!             .await
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod manager;
pub mod propagation;
pub mod repository;
pub mod session;

pub use context::TxContext;
pub use error::TxError;
pub use manager::TransactionManager;
pub use propagation::Propagation;
pub use repository::BaseRepository;
pub use session::{Session, SessionConn};
