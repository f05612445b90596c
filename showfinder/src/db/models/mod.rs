//! Database record structures.
//!
//! These are the shapes repositories in [`crate::db::handlers`] accept and return. They are
//! separate from the request/response models in [`crate::api::models`] so that, for example,
//! a password hash can never end up in a session snapshot by accident.

pub mod sessions;
pub mod users;
