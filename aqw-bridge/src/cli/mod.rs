//! CLI module for the aqw-bridge binary

use tracing_subscriber::EnvFilter;

pub mod run;
pub mod servers;

/// Install the fmt subscriber
///
/// An explicit filter wins over `RUST_LOG`; with neither, log at info.
pub fn init_logging(filter: Option<&str>) -> eyre::Result<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
