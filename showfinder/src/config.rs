//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides.
//! The configuration file path defaults to `config.yaml` but can be specified via `-f` flag or
//! `SHOWFINDER_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`, may be absent)
//! 2. **Deployment variables** - `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`,
//!    `POSTGRES_USER`, `POSTGRES_PASSWORD`, `DATABASE_URL`, `SESSION_SECRET` and `API_KEY`
//! 3. **Prefixed variables** - `SHOWFINDER_` variables override everything else
//!
//! Deployment variables other than `POSTGRES_PORT` are always read as strings, so an all-digit
//! password or key stays a string.
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SHOWFINDER_DISCOVERY__KEYWORD=jazz` sets the `discovery.keyword` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Typical docker-compose deployment
//! POSTGRES_HOST=db
//! POSTGRES_DB=users_db
//! POSTGRES_USER=postgres
//! POSTGRES_PASSWORD=pwd
//! SESSION_SECRET=super-duper-secret-value
//! API_KEY=<ticketmaster consumer key>
//!
//! # Override server port
//! SHOWFINDER_PORT=8080
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

use crate::{auth::password::Argon2Params, errors::Error};

/// Minimum length of the session signing secret, in bytes
pub const MIN_SESSION_SECRET_LEN: usize = 16;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SHOWFINDER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have sensible defaults defined in the `Default` implementation, except the
/// session secret which must always be supplied.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Credential store connection settings
    pub database: DatabaseConfig,
    /// Session store and cookie settings
    pub session: SessionConfig,
    /// Login/logout behavior switches
    pub auth: AuthConfig,
    /// Password hashing cost
    pub password: PasswordConfig,
    /// Profile image uploads
    pub uploads: UploadsConfig,
    /// Upstream event search API
    pub discovery: DiscoveryConfig,
}

/// PostgreSQL connection settings.
///
/// Either a full `url`, or the individual components. When `url` is set the components are
/// ignored.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub pool: PoolSettings,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

/// Session cookie configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Secret used to sign session cookies (required)
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Session lifetime; expired sessions are treated as logged out
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for the session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
    /// Where sessions live
    pub store: SessionStoreKind,
}

/// Backing store for sessions.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// `sessions` table in the application database
    Postgres,
    /// Process memory; sessions are lost on restart
    Memory,
}

/// Switches for the two historically inconsistent failure paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Send logins for unknown usernames to the registration page instead of showing the
    /// generic invalid-credentials message. This reveals which usernames exist.
    pub unknown_user_redirects_to_register: bool,
    /// When the session store fails during logout, redirect to `/discover` instead of
    /// confirming the logout.
    pub logout_error_redirects_to_discover: bool,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

/// Profile image upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Directory uploaded images are written to; created on startup
    pub dir: PathBuf,
    /// Maximum accepted image size in bytes (default: 5 MiB)
    pub max_file_size: u64,
}

/// Event search API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Events endpoint
    pub base_url: Url,
    /// Consumer key sent as the `apikey` query parameter
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Search keyword
    pub keyword: String,
    /// Number of results to request
    pub size: u32,
    /// Per-request timeout. Unset means wait indefinitely.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

/// Shown in place of secrets in `Debug` output.
const REDACTED: &str = "<redacted>";

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| REDACTED)
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the URL may carry a password
        f.debug_struct("DatabaseConfig")
            .field("url", &redacted(&self.url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &redacted(&self.password))
            .field("pool", &self.pool)
            .finish()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &redacted(&self.secret))
            .field("timeout", &self.timeout)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("store", &self.store)
            .finish()
    }
}

impl fmt::Debug for DiscoveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &redacted(&self.api_key))
            .field("keyword", &self.keyword)
            .field("size", &self.size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            password: PasswordConfig::default(),
            uploads: UploadsConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "db".to_string(),
            port: 5432,
            name: None,
            user: None,
            password: None,
            pool: PoolSettings::default(),
        }
    }
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "showfinder_session".to_string(),
            cookie_secure: false,
            cookie_same_site: "lax".to_string(),
            store: SessionStoreKind::Postgres,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            unknown_user_redirects_to_register: true,
            logout_error_redirects_to_discover: false,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        let params = Argon2Params::default();
        Self {
            argon2_memory_kib: params.memory_kib,
            argon2_iterations: params.iterations,
            argon2_parallelism: params.parallelism,
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_file_size: 5 * 1024 * 1024,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://app.ticketmaster.com/discovery/v2/events.json").expect("static URL is valid"),
            api_key: None,
            keyword: "music".to_string(),
            size: 5,
            request_timeout: None,
        }
    }
}

impl DatabaseConfig {
    /// Build sqlx connection options from either the URL or the individual components.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }

        let mut options = PgConnectOptions::new().host(&self.host).port(self.port);
        if let Some(name) = &self.name {
            options = options.database(name);
        }
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

impl SessionConfig {
    /// Build the `Set-Cookie` value carrying a signed session token.
    pub fn cookie(&self, value: &str) -> String {
        self.cookie_with_max_age(value, self.timeout.as_secs())
    }

    /// Build a `Set-Cookie` value that makes the browser forget the session.
    pub fn expired_cookie(&self) -> String {
        self.cookie_with_max_age("", 0)
    }

    fn cookie_with_max_age(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
            self.cookie_name, value, self.cookie_same_site, max_age
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        match self.session.secret.as_deref() {
            None => {
                return Err(Error::Internal {
                    operation: "Config validation: session secret is not configured. \
                     Please set SESSION_SECRET or add session.secret to the config file."
                        .to_string(),
                });
            }
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(Error::Internal {
                    operation: format!("Config validation: session secret must be at least {MIN_SESSION_SECRET_LEN} bytes"),
                });
            }
            Some(_) => {}
        }

        if self.session.timeout.as_secs() < 60 {
            return Err(Error::Internal {
                operation: "Config validation: session timeout is too short (minimum 1 minute)".to_string(),
            });
        }

        if !matches!(self.session.cookie_same_site.to_ascii_lowercase().as_str(), "strict" | "lax" | "none") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: cookie_same_site must be one of strict, lax or none (got '{}')",
                    self.session.cookie_same_site
                ),
            });
        }

        argon2::Params::new(
            self.password.argon2_memory_kib,
            self.password.argon2_iterations,
            self.password.argon2_parallelism,
            None,
        )
        .map_err(|e| Error::Internal {
            operation: format!("Config validation: invalid argon2 parameters: {e}"),
        })?;

        if self.uploads.max_file_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: uploads.max_file_size cannot be 0".to_string(),
            });
        }

        if self.discovery.size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: discovery.size must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Variables used by the docker-compose deployment
            .merge(Env::raw().only(&["POSTGRES_PORT"]).map(|_| "database.port".into()))
            .merge(Serialized::defaults(deployment_strings()))
            // Prefixed variables override everything else
            .merge(Env::prefixed("SHOWFINDER_").ignore(&["CONFIG"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Deployment variables holding text, with the config section and field each one sets.
const DEPLOYMENT_STRING_VARS: &[(&str, &str, &str)] = &[
    ("POSTGRES_HOST", "database", "host"),
    ("POSTGRES_DB", "database", "name"),
    ("POSTGRES_USER", "database", "user"),
    ("POSTGRES_PASSWORD", "database", "password"),
    ("DATABASE_URL", "database", "url"),
    ("SESSION_SECRET", "session", "secret"),
    ("API_KEY", "discovery", "api_key"),
];

/// Collect the set deployment variables as verbatim strings.
///
/// `Env` would parse `12345` into a number, which no longer deserializes into a string field.
fn deployment_strings() -> serde_json::Map<String, serde_json::Value> {
    let mut root = serde_json::Map::new();
    for (var, section, field) in DEPLOYMENT_STRING_VARS {
        let Ok(value) = std::env::var(var) else {
            continue;
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let serde_json::Value::Object(fields) = entry {
            fields.insert(field.to_string(), serde_json::Value::String(value));
        }
    }
    root
}
