//! The default command: run one relay until Ctrl+C

use aqw_bridge::{DEFAULT_LISTEN_PORT, RelayConfig};
use eyre::WrapErr;

use super::servers;

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Loopback port the Flash client connects to
    #[arg(long, env = "AQW_BRIDGE_LISTEN_PORT", default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// Game server name from the built-in table (see `aqw-bridge servers`)
    #[arg(long, env = "AQW_BRIDGE_SERVER")]
    pub server: Option<String>,

    /// Upstream host, overrides --server
    #[arg(long, env = "AQW_BRIDGE_TARGET_HOST")]
    pub target_host: Option<String>,

    /// Upstream port, overrides --server
    #[arg(long, env = "AQW_BRIDGE_TARGET_PORT")]
    pub target_port: Option<u16>,
}

/// Turn CLI arguments into a validated relay config
///
/// Starts from the named server (or the built-in default target) and applies
/// explicit host/port overrides on top.
pub fn resolve_config(args: &RunArgs) -> eyre::Result<RelayConfig> {
    let base = match args.server.as_deref() {
        Some(name) => {
            let addr = servers::lookup(name).ok_or_else(|| {
                eyre::eyre!(
                    "Unknown server '{name}'. Known servers: {}",
                    servers::names().join(", ")
                )
            })?;
            RelayConfig::with_target(args.listen_port, addr)?
        }
        None => RelayConfig {
            listen_port: args.listen_port,
            ..RelayConfig::default()
        },
    };

    let config = RelayConfig::new(
        base.listen_port,
        args.target_host.clone().unwrap_or(base.target_host),
        args.target_port.unwrap_or(base.target_port),
    )?;
    Ok(config)
}

pub async fn run(args: RunArgs) -> eyre::Result<()> {
    let config = resolve_config(&args)?;
    let mut relay = aqw_bridge::start(config)
        .await
        .wrap_err("Failed to start bridge")?;

    if let Some(addr) = relay.local_addr() {
        println!("🌉 Bridge listening on {addr}");
    }
    println!("🔗 Forwarding to {}", relay.config().target_addr());
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for Ctrl+C")?;

    println!("\nShutting down...");
    relay.stop().await;
    Ok(())
}
