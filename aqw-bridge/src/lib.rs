//! # aqw-bridge
//!
//! Loopback TCP relay for a Flash runtime embedded in a mobile app.
//!
//! The Flash client connects to a fixed port on `127.0.0.1`. Each accepted
//! connection becomes a session: if its first chunk is a legacy
//! `<policy-file-request/>` probe, the relay answers it locally with a
//! permissive cross-domain policy and hangs up. Anything else is forwarded
//! verbatim to the configured game server and spliced in both directions
//! until either side goes away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aqw_bridge::{RelayConfig, RelayServer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::new(8181, "socket.aq.com", 5588)?;
//! let mut relay = RelayServer::new(config);
//!
//! let addr = relay.start().await?;
//! println!("bridge listening on {addr}");
//!
//! // ... hosting session runs ...
//!
//! relay.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Ownership
//!
//! The listening socket belongs to the accept task alone. Every session task
//! owns its client socket and, once connected, its upstream socket; the two
//! copy tasks of a relaying session each own one read half and one write
//! half. Nothing mutable is shared across sessions, so there are no locks.
//!
//! ## Error Types
//!
//! - [`ConfigError`]: invalid relay configuration
//! - [`StartError`]: the listening socket could not be bound
//! - [`SessionError`]: a single session failed before relaying began

pub mod config;
pub mod error;
pub mod policy;
pub mod server;
pub mod session;

pub use config::{DEFAULT_LISTEN_PORT, DEFAULT_TARGET_HOST, DEFAULT_TARGET_PORT, RelayConfig};
pub use error::{ConfigError, SessionError, StartError};
pub use server::{RelayServer, RelayState};
pub use session::{Direction, SessionOutcome};

/// Create a relay for `config` and start it in one step.
pub async fn start(config: RelayConfig) -> Result<RelayServer, StartError> {
    let mut relay = RelayServer::new(config);
    relay.start().await?;
    Ok(relay)
}
