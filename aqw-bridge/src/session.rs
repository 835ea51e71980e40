//! Per-connection handling
//!
//! A [`Session`] owns one accepted client socket. It reads the first chunk,
//! and either answers a policy-file probe locally or opens exactly one
//! upstream connection, forwards the first chunk, and splices both
//! directions until they finish:
//!
//! ```text
//! reading first chunk ─┬─► policy responding ───────────────► closed
//!                      └─► connecting upstream ─┬─► failed ──► closed
//!                                               └─► relaying ► closed
//! ```
//!
//! While relaying, each direction runs in its own task. A direction that
//! reaches end-of-stream shuts down the write side of its destination so the
//! peer sees EOF and leaves the other direction running. A direction that
//! fails cancels the other one, and both sockets are dropped once both tasks
//! have returned.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::SessionError;
use crate::policy::{FIRST_READ_LIMIT, POLICY_RESPONSE, is_policy_request};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// One direction of a relayed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToUpstream => write!(f, "client->upstream"),
            Direction::UpstreamToClient => write!(f, "upstream->client"),
        }
    }
}

/// How one direction of a relay ended
#[derive(Debug)]
pub enum DirectionEnd {
    /// Source reached end-of-stream; destination write side was shut down
    Eof,
    /// Read or write failed
    Failed(std::io::Error),
    /// The other direction failed first
    Cancelled,
}

/// Bytes moved in one direction and how it ended
#[derive(Debug)]
pub struct DirectionReport {
    pub direction: Direction,
    pub bytes: u64,
    pub end: DirectionEnd,
}

/// What a finished session did
#[derive(Debug)]
pub enum SessionOutcome {
    /// Client closed without sending anything
    Closed,
    /// Policy document was served and the client disconnected
    PolicyServed,
    /// Traffic was relayed until both directions finished. The
    /// client-to-upstream count includes the first chunk.
    Relayed {
        client_to_upstream: DirectionReport,
        upstream_to_client: DirectionReport,
    },
}

/// One accepted client connection
///
/// Session id and peer address live on the `session` span the accept loop
/// wraps around [`Session::serve`].
pub struct Session {
    client: TcpStream,
    target: Arc<str>,
}

impl Session {
    pub fn new(client: TcpStream, target: Arc<str>) -> Self {
        Self { client, target }
    }

    /// Run the session and log how it ended
    ///
    /// Errors never leave the session; this is what the accept loop spawns.
    pub async fn serve(self) {
        match self.run().await {
            Ok(SessionOutcome::Closed) => {
                tracing::debug!("client closed before sending data");
            }
            Ok(SessionOutcome::PolicyServed) => {
                tracing::info!("served policy file");
            }
            Ok(SessionOutcome::Relayed {
                client_to_upstream,
                upstream_to_client,
            }) => {
                tracing::info!(
                    sent = client_to_upstream.bytes,
                    received = upstream_to_client.bytes,
                    "session finished"
                );
            }
            Err(e) => {
                tracing::warn!("session failed: {e}");
            }
        }
    }

    /// Run the session to completion
    pub async fn run(self) -> Result<SessionOutcome, SessionError> {
        let Session { mut client, target } = self;

        let mut first = [0u8; FIRST_READ_LIMIT];
        let n = client
            .read(&mut first)
            .await
            .map_err(|source| SessionError::FirstRead { source })?;
        if n == 0 {
            return Ok(SessionOutcome::Closed);
        }
        let first = &first[..n];

        if is_policy_request(first) {
            serve_policy(&mut client).await?;
            return Ok(SessionOutcome::PolicyServed);
        }

        let mut upstream = TcpStream::connect(&*target).await.map_err(|source| {
            SessionError::UpstreamConnect {
                target: target.to_string(),
                source,
            }
        })?;
        tracing::debug!(%target, "connected upstream");

        client.set_nodelay(true).ok();
        upstream.set_nodelay(true).ok();

        // The first chunk is part of the client's handshake and must reach
        // upstream before anything else.
        upstream
            .write_all(first)
            .await
            .map_err(|source| SessionError::ForwardFirstChunk { source })?;

        let (client_to_upstream, upstream_to_client) = splice(client, upstream).await;

        Ok(SessionOutcome::Relayed {
            client_to_upstream: DirectionReport {
                bytes: client_to_upstream.bytes + n as u64,
                ..client_to_upstream
            },
            upstream_to_client,
        })
    }
}

async fn serve_policy(client: &mut TcpStream) -> Result<(), SessionError> {
    client
        .write_all(POLICY_RESPONSE)
        .await
        .map_err(|source| SessionError::PolicyWrite { source })?;
    client
        .flush()
        .await
        .map_err(|source| SessionError::PolicyWrite { source })?;
    // Best effort FIN before the socket is dropped.
    client.shutdown().await.ok();
    Ok(())
}

/// Relay both directions, each on its own task, until both have finished
async fn splice(client: TcpStream, upstream: TcpStream) -> (DirectionReport, DirectionReport) {
    let (client_read, client_write) = client.into_split();
    let (upstream_read, upstream_write) = upstream.into_split();
    let abort = CancellationToken::new();

    let outbound = tokio::spawn(
        pump(
            client_read,
            upstream_write,
            Direction::ClientToUpstream,
            abort.clone(),
        )
        .in_current_span(),
    );
    let inbound = tokio::spawn(
        pump(
            upstream_read,
            client_write,
            Direction::UpstreamToClient,
            abort.clone(),
        )
        .in_current_span(),
    );

    let outbound = joined(outbound.await, Direction::ClientToUpstream);
    let inbound = joined(inbound.await, Direction::UpstreamToClient);
    (outbound, inbound)
}

fn joined(
    result: Result<DirectionReport, tokio::task::JoinError>,
    direction: Direction,
) -> DirectionReport {
    result.unwrap_or_else(|e| {
        tracing::error!(%direction, "relay task panicked: {e}");
        DirectionReport {
            direction,
            bytes: 0,
            end: DirectionEnd::Failed(std::io::Error::other(e.to_string())),
        }
    })
}

/// Copy `reader` into `writer` until EOF, error, or `abort`
///
/// A read/`write_all` loop rather than `tokio::io::copy`, so the byte count
/// survives when the other direction cancels this one mid-copy.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    abort: CancellationToken,
) -> DirectionReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut bytes = 0u64;

    let end = loop {
        let n = tokio::select! {
            _ = abort.cancelled() => break DirectionEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break DirectionEnd::Eof,
                Ok(n) => n,
                Err(e) => break DirectionEnd::Failed(e),
            },
        };
        tokio::select! {
            _ = abort.cancelled() => break DirectionEnd::Cancelled,
            written = writer.write_all(&buf[..n]) => {
                if let Err(e) = written {
                    break DirectionEnd::Failed(e);
                }
            }
        }
        bytes += n as u64;
    };

    match &end {
        DirectionEnd::Eof => {
            tracing::debug!(%direction, bytes, "source closed");
            // The peer may already be gone; nothing to do about it.
            writer.shutdown().await.ok();
        }
        DirectionEnd::Failed(e) => {
            tracing::warn!(%direction, bytes, "relay error: {e}");
            abort.cancel();
        }
        DirectionEnd::Cancelled => {
            tracing::debug!(%direction, bytes, "cancelled by other direction");
        }
    }

    DirectionReport {
        direction,
        bytes,
        end,
    }
}
