//! WebSocket server.
//!
//! Accepts client connections and runs one [`Session`] per connection.
//!
//! # Connection Flow
//!
//! 1. `RelayServer::bind` - Bind the TCP listener
//! 2. `RelayServer::serve` - Accept connections until shutdown
//! 3. Upgrade each connection to WebSocket
//! 4. Run a `Session` on its own task, scoped under the server shutdown token

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::Result;
use crate::relay::{Session, SessionContext};

// ============================================================================
// RelayServer
// ============================================================================

/// A bound WebSocket relay server.
///
/// # Example
///
/// ```ignore
/// use wsmux::{RelayServer, SessionContext};
/// use tokio_util::sync::CancellationToken;
///
/// let server = RelayServer::bind("127.0.0.1:0".parse()?, context).await?;
/// println!("listening on {}", server.ws_url());
///
/// let shutdown = CancellationToken::new();
/// server.serve(shutdown.clone()).await?;
/// ```
pub struct RelayServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Shared Session collaborators.
    context: SessionContext,
}

impl RelayServer {
    /// Binds the server to `addr`.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if binding fails.
    pub async fn bind(addr: SocketAddr, context: SessionContext) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "WebSocket server bound");

        Ok(Self {
            listener,
            local_addr,
            context,
        })
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Accepts connections until `shutdown` is cancelled.
    ///
    /// Each Session's master scope is a child of `shutdown`, so cancelling
    /// it tears every live Session down. Returns once all Sessions have
    /// finished.
    ///
    /// # Errors
    ///
    /// Currently infallible; accept errors are logged and skipped.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let sessions = TaskTracker::new();
        info!(addr = %self.local_addr, "Relay listening");

        loop {
            let accepted = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let context = self.context.clone();
                    let token = shutdown.child_token();
                    sessions.spawn(Self::handle(stream, peer, context, token));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }

        sessions.close();
        info!(live = sessions.len(), "Relay shutting down");
        sessions.wait().await;
        Ok(())
    }

    /// Upgrades one connection and runs its Session.
    async fn handle(
        stream: TcpStream,
        peer: SocketAddr,
        context: SessionContext,
        token: CancellationToken,
    ) {
        debug!(%peer, "TCP connection accepted");

        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%peer, error = %e, "WebSocket upgrade failed");
                return;
            }
        };

        let (session, receiver) = Session::new(context, token);
        let span = info_span!("session", id = %session.id(), %peer);
        session.run(receiver, ws).instrument(span).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
