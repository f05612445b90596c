//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Route handlers  │
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │ CredentialStore  │  (db::credentials, auth::session - trait objects in AppState)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │   Repositories   │  (db::handlers - queries)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │    PostgreSQL    │
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`credentials`]: The [`credentials::CredentialStore`] trait and its Postgres implementation
//! - [`handlers`]: Repository implementations for each table
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! showfinder::migrator().run(&pool).await?;
//! ```

pub mod credentials;
pub mod errors;
pub mod handlers;
pub mod models;
