//! Error types for aqw-bridge

/// Invalid relay configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Target host must not be empty")]
    EmptyTargetHost,

    #[error("Target port must not be zero")]
    ZeroTargetPort,

    #[error("Invalid target address '{0}', expected host:port")]
    InvalidTarget(String),
}

/// Errors from [`crate::RelayServer::start`]
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Relay has already been stopped")]
    Stopped,
}

/// Errors that end a single session before relaying begins
///
/// Failures once both legs are spliced are not errors of the session as a
/// whole; they are recorded per direction in [`crate::SessionOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to read first chunk from client: {source}")]
    FirstRead { source: std::io::Error },

    #[error("Failed to write policy response: {source}")]
    PolicyWrite { source: std::io::Error },

    #[error("Failed to connect to upstream {target}: {source}")]
    UpstreamConnect {
        target: String,
        source: std::io::Error,
    },

    #[error("Failed to forward first chunk upstream: {source}")]
    ForwardFirstChunk { source: std::io::Error },
}
