//! policy_probe: ask a running bridge for its policy file
//!
//! Sends `<policy-file-request/>` the way the Flash runtime does, prints the
//! reply, and exits non-zero unless the reply is the canonical document
//! followed by the connection closing.

use std::time::Duration;

use aqw_bridge::policy::{POLICY_REQUEST, POLICY_RESPONSE};
use clap::Parser;
use colored::Colorize;
use eyre::WrapErr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "policy_probe")]
#[command(about = "Check that a bridge answers Flash policy-file requests")]
struct Args {
    /// Bridge address
    #[arg(default_value = "127.0.0.1:8181")]
    addr: String,

    /// Seconds to wait for the reply and the close
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.addr)
        .await
        .wrap_err_with(|| format!("Failed to connect to {}", args.addr))?;
    println!("🔌 Connected to {}", args.addr);

    stream.write_all(POLICY_REQUEST).await?;
    stream.write_all(b"\0").await?;

    let mut reply = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(args.timeout),
        stream.read_to_end(&mut reply),
    )
    .await
    .wrap_err("Bridge did not close the connection in time")??;

    println!(
        "📥 {} bytes: {}",
        reply.len(),
        String::from_utf8_lossy(&reply).escape_debug()
    );

    if reply == POLICY_RESPONSE {
        println!("{}", "✅ Policy response is byte-exact".green());
        Ok(())
    } else {
        println!("{}", "❌ Policy response does not match".red());
        eyre::bail!("unexpected policy response")
    }
}
