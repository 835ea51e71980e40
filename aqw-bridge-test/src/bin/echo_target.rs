//! echo_target: stand-in game server for manual bridge testing
//!
//! Accepts connections, logs every chunk it receives, and echoes it back.
//! Point a bridge at it with:
//!
//!   aqw-bridge --target-host 127.0.0.1 --target-port 5588

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Parser)]
#[command(name = "echo_target")]
#[command(about = "Echo server that stands in for the game server")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = aqw_bridge::DEFAULT_TARGET_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    println!("🎧 Echo target listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(async move {
                    tracing::info!(%peer, "connected");
                    match echo(stream).await {
                        Ok(total) => tracing::info!(%peer, total, "disconnected"),
                        Err(e) => tracing::warn!(%peer, "connection error: {e}"),
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {e}");
            }
        }
    }
}

async fn echo(mut stream: TcpStream) -> std::io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut total = 0u64;

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        tracing::info!(bytes = n, "📥 {}", String::from_utf8_lossy(&buf[..n]).escape_debug());
        stream.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}
