//! HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # Routes
//!
//! - `GET /` redirects to `/login`
//! - `GET|POST /register`, `GET|POST /login`: account pages, open to everyone
//! - `GET /discover`, `GET /logout`: require a session
//! - `GET /welcome`, `GET /healthz`: probes
//! - `GET /uploads/{file}`: stored profile images

pub mod handlers;
pub mod models;
