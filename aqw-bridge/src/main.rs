//! aqw-bridge: loopback relay for the Flash game client
//!
//! Starts one relay on `127.0.0.1:<listen-port>`, forwarding to the selected
//! game server, and stops it on Ctrl+C.

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "aqw-bridge")]
#[command(about = "Loopback TCP relay that answers Flash policy-file requests")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: cli::run::RunArgs,

    /// Log filter, e.g. "debug" or "aqw_bridge=trace" (defaults to RUST_LOG, then info)
    #[arg(long, env = "AQW_BRIDGE_LOG")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known game servers usable with --server
    Servers,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Some(Commands::Servers) => {
            cli::servers::print_table();
            Ok(())
        }
        None => cli::run::run(cli.run).await,
    }
}
