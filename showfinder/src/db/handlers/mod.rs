//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed [`sqlx::PgConnection`] and exposes strongly-typed operations
//! for one table, returning records from [`crate::db::models`].
//!
//! - [`Users`]: credential records
//! - [`Sessions`]: server-side login sessions
//!
//! ```ignore
//! use showfinder::db::handlers::Users;
//!
//! let mut conn = pool.acquire().await?;
//! let user = Users::new(&mut conn).get_user_by_username("alice").await?;
//! ```
//!
//! Every operation is a single statement; nothing here opens a transaction.

pub mod sessions;
pub mod users;

pub use sessions::Sessions;
pub use users::Users;
