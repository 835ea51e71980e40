//! Listening socket and relay lifecycle
//!
//! [`RelayServer`] binds `127.0.0.1:listen_port` and runs the accept loop on
//! its own task. Every accepted connection is handed to a [`Session`] on a
//! separate task, so a stalled peer never delays the next accept.
//!
//! Lifecycle: `Created -> Running -> Stopped`. `stop()` cancels the accept
//! loop and waits for it to drop the listener, so once it returns new
//! connections are refused. Sessions already in flight are not touched and
//! finish on their own.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::session::Session;
use crate::{RelayConfig, StartError};

/// Pause after an unexpected accept error, e.g. descriptor exhaustion
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Created,
    Running,
    Stopped,
}

/// A loopback relay for one hosting session
pub struct RelayServer {
    config: RelayConfig,
    state: RelayState,
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: RelayState::Created,
            local_addr: None,
            shutdown: CancellationToken::new(),
            accept_task: None,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the listening socket and start accepting
    ///
    /// Returns as soon as the socket is bound. A bind failure is final for
    /// this instance's attempt; the caller decides whether to try another
    /// port. Calling `start` again while running returns the same address.
    pub async fn start(&mut self) -> Result<SocketAddr, StartError> {
        match self.state {
            RelayState::Running => {
                if let Some(addr) = self.local_addr {
                    return Ok(addr);
                }
            }
            RelayState::Stopped => return Err(StartError::Stopped),
            RelayState::Created => {}
        }

        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartError::Bind { addr, source })?;

        let target: Arc<str> = Arc::from(self.config.target_addr());
        tracing::info!(%local_addr, %target, "relay listening");

        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            target,
            self.shutdown.clone(),
        )));
        self.local_addr = Some(local_addr);
        self.state = RelayState::Running;

        Ok(local_addr)
    }

    /// Stop accepting new connections
    ///
    /// Waits only for the accept loop to release the listening socket.
    /// In-flight sessions keep running. A no-op unless running.
    pub async fn stop(&mut self) {
        if self.state != RelayState::Running {
            return;
        }

        self.shutdown.cancel();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::error!("accept loop ended abnormally: {e}");
            }
        }

        self.state = RelayState::Stopped;
        self.local_addr = None;
        tracing::info!("relay stopped");
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept_loop(listener: TcpListener, target: Arc<str>, shutdown: CancellationToken) {
    let mut next_id: u64 = 0;

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                next_id += 1;
                let span = tracing::info_span!("session", id = next_id, %peer);
                span.in_scope(|| tracing::debug!("accepted"));

                let session = Session::new(stream, target.clone());
                tokio::spawn(session.serve().instrument(span));
            }
            Err(e) if is_transient(&e) => {
                tracing::debug!("transient accept error: {e}");
            }
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    drop(listener);
    tracing::debug!("accept loop finished");
}

/// Errors caused by a single half-open connection, not the listener
fn is_transient(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
