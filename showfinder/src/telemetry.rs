//! Tracing initialization.
//!
//! Logs go to stdout through the `tracing-subscriber` fmt layer. Verbosity is controlled with
//! the standard `RUST_LOG` variable and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=showfinder=debug,tower_http=debug showfinder -f config.yaml
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
