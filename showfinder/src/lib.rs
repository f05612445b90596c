//! # showfinder: session-authenticated event discovery
//!
//! `showfinder` is a small web application. Visitors register and log in with a username and
//! password; once logged in they can open a discovery page listing upcoming events fetched live
//! from the Ticketmaster Discovery API.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for users and (by default) sessions. Everything a handler touches lives in
//! [`AppState`] behind a trait object, so the whole router can be exercised in tests against
//! in-memory stores and canned upstream responses.
//!
//! ### Request Flow
//!
//! Requests to `/discover` and `/logout` first pass through
//! [`auth::middleware::require_session`]. It reads the signed session cookie, checks the
//! signature, and looks the session up in the [`auth::session::SessionStore`]. Anonymous
//! requests are redirected to `/login`; authenticated ones carry the session's user snapshot to
//! the handler. Registration and login are open to everyone.
//!
//! ### Core Components
//!
//! - **API layer** ([`api`]): route handlers and request models
//! - **Authentication** ([`auth`]): Argon2 password hashing, session stores, the route gate
//! - **Database** ([`db`]): the [`db::credentials::CredentialStore`] seam and its repositories
//! - **Event search** ([`discovery`]): the upstream API client
//! - **Views** ([`views`]): HTML templates rendered with minijinja
//! - **Uploads** ([`uploads`]): profile image storage
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use showfinder::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     rustls::crypto::aws_lc_rs::default_provider()
//!         .install_default()
//!         .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
//!
//!     let args = showfinder::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     showfinder::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`config`] for the YAML layout and the environment variables it honours.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod discovery;
pub mod errors;
pub mod telemetry;
pub mod uploads;
pub mod views;

#[cfg(test)]
mod test;
#[cfg(test)]
mod test_utils;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header::X_CONTENT_TYPE_OPTIONS},
    middleware::from_fn_with_state,
    routing::get,
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, set_header::SetResponseHeader, trace::TraceLayer};
use tracing::{debug, info};

pub use config::Config;

use crate::{
    api::handlers::{auth as auth_handlers, discover, probes},
    auth::{
        middleware::require_session,
        session::{InMemorySessionStore, PgSessionStore, SessionStore},
    },
    config::{PoolSettings, SessionStoreKind},
    db::credentials::{CredentialStore, PgCredentialStore},
    discovery::{EventSearch, TicketmasterClient},
    uploads::UploadStore,
    views::{Render, Views},
};

/// Room left in the register body limit for the text fields and multipart framing.
const REGISTER_BODY_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// Every collaborator is a trait object, so tests can assemble a state around in-memory
/// stores:
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .users(Arc::new(PgCredentialStore::new(pool.clone())))
///     .sessions(Arc::new(PgSessionStore::new(pool, timeout)))
///     .events(Arc::new(TicketmasterClient::new(&discovery)?))
///     .views(Arc::new(Views::new()?))
///     .uploads(UploadStore::new(&uploads))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub events: Arc<dyn EventSearch>,
    pub views: Arc<dyn Render>,
    pub uploads: UploadStore,
}

/// Get the showfinder database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(secs(settings.idle_timeout_secs))
        .max_lifetime(secs(settings.max_lifetime_secs))
}

/// Connect to PostgreSQL and bring the schema up to date.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let options = config.database.connect_options()?;
    let pool = pool_options(&config.database.pool).connect_with(options).await?;
    info!("Database connection successful");

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Build the application router.
///
/// `/discover` and `/logout` sit behind the session gate; everything else is public.
pub fn build_router(state: AppState) -> Router {
    let register_limit = usize::try_from(state.config.uploads.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(REGISTER_BODY_OVERHEAD);

    let protected = Router::new()
        .route("/discover", get(discover::discover))
        .route("/logout", get(auth_handlers::logout))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let public = Router::new()
        .route("/", get(auth_handlers::landing))
        .route(
            "/register",
            get(auth_handlers::register_page)
                .post(auth_handlers::register)
                .layer(DefaultBodyLimit::max(register_limit)),
        )
        .route("/login", get(auth_handlers::login_page).post(auth_handlers::login))
        .route("/welcome", get(probes::welcome))
        .route("/healthz", get(probes::healthz))
        .nest_service(
            uploads::PUBLIC_PREFIX,
            SetResponseHeader::overriding(
                ServeDir::new(state.uploads.dir()),
                X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main application struct that owns the database pool and router.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and wires up
///    the stores
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool is
///    closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting showfinder with configuration: {:#?}", config);
        let pool = setup_database(&config).await?;
        Self::with_pool(config, pool).await
    }

    /// Create an application around an existing, migrated pool.
    pub async fn with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let uploads = UploadStore::new(&config.uploads);
        uploads.ensure_dir().await?;

        let sessions: Arc<dyn SessionStore> = match config.session.store {
            SessionStoreKind::Postgres => Arc::new(PgSessionStore::new(pool.clone(), config.session.timeout)),
            SessionStoreKind::Memory => {
                info!("Using in-memory session store; sessions will not survive a restart");
                Arc::new(InMemorySessionStore::new(config.session.timeout))
            }
        };

        let state = AppState::builder()
            .config(config.clone())
            .users(Arc::new(PgCredentialStore::new(pool.clone())))
            .sessions(sessions)
            .events(Arc::new(TicketmasterClient::new(&config.discovery)?))
            .views(Arc::new(Views::new()?))
            .uploads(uploads)
            .build();

        Ok(Self {
            router: build_router(state),
            config,
            pool,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "showfinder listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
