//! Per-connection multiplexing session.
//!
//! A [`Session`] owns everything one client connection needs: the
//! subscription registry, the outbound event queue and the master
//! cancellation scope. It decodes inbound messages one at a time, in
//! arrival order, and executes them. Frames are read on a separate task,
//! so a client that goes away while a command waits on its backend still
//! tears the Session down.
//!
//! # Tasks
//!
//! | Task | Count | Role |
//! |------|-------|------|
//! | control loop | 1 | executes client commands in arrival order |
//! | inbound reader | 1 | reads client frames, detects disconnects |
//! | writer | 1 | drains the event queue into the WebSocket |
//! | stream reader | 1 per open subscription | relays backend lines |
//!
//! # Teardown
//!
//! When the connection closes or fails, the master scope is cancelled
//! (cancelling every subscription transitively), the registry is cleared,
//! and the queue is closed exactly once. `run` returns only after every
//! reader task and the writer have exited.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, info, warn};

use crate::backend::{Backend, Resolver};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{CloseCommand, Command, ConnectCommand, Event};
use crate::transport::writer;

use super::queue::{self, EventQueue, EventReceiver};
use super::reader::StreamReader;
use super::registry::SubscriptionRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Client messages buffered while a command is executing.
const INBOUND_CAPACITY: usize = 16;

/// A client message, or the reason it could not be accepted.
type Inbound = Result<String>;

// ============================================================================
// SessionContext
// ============================================================================

/// Collaborators and limits shared by every Session of a server.
///
/// Cloning is cheap.
#[derive(Clone)]
pub struct SessionContext {
    /// Logical path resolver.
    pub resolver: Arc<dyn Resolver>,
    /// Backend HTTP client.
    pub backend: Backend,
    /// Outbound queue capacity per Session.
    pub queue_capacity: usize,
    /// Longest accepted backend line.
    pub max_line_bytes: Option<usize>,
}

impl SessionContext {
    /// Creates a context from collaborators and a [`RelayConfig`].
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>, backend: Backend, config: &RelayConfig) -> Self {
        Self {
            resolver,
            backend,
            queue_capacity: config.queue_capacity,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Multiplexing state for one client connection.
pub struct Session {
    id: SessionId,
    context: SessionContext,
    registry: Arc<SubscriptionRegistry>,
    events: EventQueue,
    token: CancellationToken,
    readers: TaskTracker,
}

impl Session {
    /// Creates a Session whose master scope is `token`.
    ///
    /// Returns the Session and the receiving half of its event queue, which
    /// belongs to the writer.
    #[must_use]
    pub fn new(context: SessionContext, token: CancellationToken) -> (Self, EventReceiver) {
        let (events, receiver) = queue::channel(context.queue_capacity);
        let session = Self {
            id: SessionId::generate(),
            context,
            registry: Arc::new(SubscriptionRegistry::new()),
            events,
            token,
            readers: TaskTracker::new(),
        };
        (session, receiver)
    }

    /// Returns the Session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the subscription registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns the number of running stream readers.
    #[inline]
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    // ========================================================================
    // Control Loop
    // ========================================================================

    /// Runs the Session over `ws` until the connection ends.
    ///
    /// Spawns the writer and the inbound reader, executes commands
    /// sequentially in arrival order, then tears down and waits for all
    /// subscription tasks.
    pub async fn run<S>(self, receiver: EventReceiver, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let writer = tokio::spawn(
            writer::run(sink, receiver, self.token.clone()).in_current_span(),
        );

        let (inbound_tx, mut inbound) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(
            read_inbound(stream, inbound_tx, self.events.clone(), self.token.clone())
                .in_current_span(),
        );

        info!("Session started");

        loop {
            let message = tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    debug!("Session scope cancelled");
                    break;
                }
                message = inbound.recv() => message,
            };

            match message {
                Some(Ok(text)) => self.handle_text(&text).await,
                Some(Err(e)) => self.report(e).await,
                None => break,
            }
        }

        self.shutdown();
        self.readers.close();
        self.readers.wait().await;

        if let Err(e) = reader.await {
            warn!(error = %e, "Inbound reader task failed");
        }

        match writer.await {
            Ok(Ok(written)) => info!(written, "Session closed"),
            Ok(Err(e)) => warn!(error = %e, "Session closed after write failure"),
            Err(e) => warn!(error = %e, "Writer task failed"),
        }
    }

    /// Tears the Session down.
    ///
    /// Cancels the master scope and every registered subscription, then
    /// closes the event queue. Safe to call more than once.
    pub fn shutdown(&self) {
        self.token.cancel();
        let cancelled = self.registry.cancel_all();
        if self.events.close() {
            debug!(cancelled, "Session torn down");
        }
    }

    // ========================================================================
    // Command Dispatcher
    // ========================================================================

    /// Decodes and executes one inbound text message.
    ///
    /// Failures are reported to the client as `error` events; they never
    /// end the Session.
    pub async fn handle_text(&self, raw: &str) {
        let result = match Command::decode(raw) {
            Ok(command) => self.execute(command).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.report(e).await;
        }
    }

    /// Executes a decoded command.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`] and [`Session::close`].
    pub async fn execute(&self, command: Command) -> Result<()> {
        debug!(cmd = command.name(), id = %command.id(), "Executing command");
        match command {
            Command::Connect(cmd) => self.connect(cmd).await,
            Command::Close(cmd) => self.close(cmd),
        }
    }

    async fn report(&self, err: Error) {
        if matches!(err, Error::QueueClosed) {
            debug!("Event queue closed, dropping error report");
            return;
        }

        debug!(error = %err, "Command failed");
        if self.events.send(Event::error(err.to_string())).await.is_err() {
            debug!("Event queue closed, dropping error report");
        }
    }

    // ========================================================================
    // Connect
    // ========================================================================

    /// Opens a subscription.
    ///
    /// Emits `close{code, reason: body}` for a non-200 answer, or
    /// `connected` followed by a background stream reader for a 200.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the path does not resolve
    /// - [`Error::DuplicateId`] if the id is already live
    /// - [`Error::BackendConnect`] if the backend cannot be reached
    /// - [`Error::BackendStream`] if a non-200 body cannot be read
    /// - [`Error::QueueClosed`] if the Session is shutting down
    pub async fn connect(&self, cmd: ConnectCommand) -> Result<()> {
        let id = cmd.id;
        let url = cmd.resolve(self.context.resolver.as_ref())?;

        let cancel = self.token.child_token();
        let generation = self.registry.register(id, cancel.clone())?;

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            opened = self.context.backend.open(&url, cmd.body.as_deref()) => Some(opened),
        };

        let response = match opened {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                self.registry.unregister(id, generation);
                return Err(e);
            }
            None => {
                self.registry.unregister(id, generation);
                debug!(%id, "Connect cancelled before backend answered");
                return Ok(());
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                body = Backend::drain(response) => Some(body),
            };
            self.registry.unregister(id, generation);

            let Some(body) = body else {
                return Ok(());
            };
            debug!(%id, status, "Backend refused subscription");
            return self.events.send(Event::close(id, status, Some(body?))).await;
        }

        if let Err(e) = self.events.send(Event::connected(id)).await {
            self.registry.unregister(id, generation);
            return Err(e);
        }

        let reader = StreamReader::new(
            id,
            generation,
            status,
            cancel,
            self.token.clone(),
            Arc::clone(&self.registry),
            self.events.clone(),
            self.context.max_line_bytes,
        );
        self.readers
            .spawn(reader.run(response).instrument(debug_span!("subscription", %id)));

        debug!(%id, %url, "Subscription streaming");
        Ok(())
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Requests cancellation of a subscription.
    ///
    /// Emits nothing itself; the subscription's reader emits the terminal
    /// `close` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownId`] if the id is not live.
    pub fn close(&self, cmd: CloseCommand) -> Result<()> {
        self.registry.cancel(cmd.id)
    }
}

// ============================================================================
// Inbound Reader
// ============================================================================

/// Reads client frames and forwards them to the control loop.
///
/// Runs on its own task so a disconnect is noticed while a command is
/// still executing. A fatal read outcome cancels `token`, which aborts any
/// pending connect and ends the control loop.
async fn read_inbound<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    inbound: mpsc::Sender<Inbound>,
    events: EventQueue,
    token: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            () = token.cancelled() => return,
            message = stream.next() => message,
        };

        let item = match message {
            Some(Ok(Message::Text(text))) => Ok(text.to_string()),
            Some(Ok(Message::Binary(_))) => Err(Error::protocol("binary messages not supported")),
            Some(Ok(Message::Close(_))) | None => Err(Error::ConnectionClosed),
            Some(Err(e)) => Err(Error::from(e)),
            // Ping, Pong and raw frames are handled by tungstenite
            Some(Ok(_)) => continue,
        };

        match item {
            Err(err) if err.is_fatal() => {
                if let Error::WebSocket(e) = &err {
                    warn!(error = %e, "WebSocket read failed");
                    let report = Event::error(format!("read websocket message: {e}"));
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {}
                        _ = events.send(report) => {}
                    }
                } else {
                    debug!(reason = %err, "WebSocket closed by client");
                }
                token.cancel();
                return;
            }

            item => {
                let forwarded = tokio::select! {
                    biased;
                    () = token.cancelled() => return,
                    sent = inbound.send(item) => sent,
                };
                if forwarded.is_err() {
                    return;
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::backend::StaticResolver;

    const WAIT: Duration = Duration::from_secs(5);

    async fn backend(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
            .mount(&server)
            .await;
        server
    }

    fn session_for(server: &MockServer) -> (Session, EventReceiver) {
        let target = format!("{}/stream", server.uri());
        let resolver = StaticResolver::new()
            .route("/system/autoupdate", &target)
            .expect("valid url");
        let context = SessionContext::new(
            Arc::new(resolver),
            Backend::new().expect("client"),
            &RelayConfig::builder().queue_capacity(16).build().expect("config"),
        );
        Session::new(context, CancellationToken::new())
    }

    async fn next(receiver: &mut EventReceiver) -> String {
        tokio::time::timeout(WAIT, receiver.recv())
            .await
            .expect("event in time")
            .expect("queue open")
            .encode()
            .expect("encode")
    }

    #[tokio::test]
    async fn test_non_200_closes_with_body() {
        let server = backend(503, "overloaded").await;
        let (session, mut receiver) = session_for(&server);

        session
            .handle_text(r#"{"cmd":"connect","id":2,"url":"/system/autoupdate"}"#)
            .await;

        assert_eq!(
            next(&mut receiver).await,
            r#"{"event":"close","id":2,"code":503,"reason":"overloaded"}"#
        );
        assert!(session.registry().is_empty());
        assert_eq!(session.reader_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_to_natural_end() {
        let server = backend(200, "\"p1\"\n\"p2\"\n\"p3\"\n").await;
        let (session, mut receiver) = session_for(&server);

        session
            .handle_text(r#"{"cmd":"connect","id":7,"url":"/system/autoupdate"}"#)
            .await;

        let mut events = Vec::new();
        for _ in 0..5 {
            events.push(next(&mut receiver).await);
        }
        assert_eq!(events, vec![
            r#"{"event":"connected","id":7}"#,
            r#"{"event":"data","id":7,"data":"p1"}"#,
            r#"{"event":"data","id":7,"data":"p2"}"#,
            r#"{"event":"data","id":7,"data":"p3"}"#,
            r#"{"event":"close","id":7,"code":200,"reason":null}"#,
        ]);

        session.shutdown();
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_url_registers_nothing() {
        let server = backend(200, "").await;
        let (session, mut receiver) = session_for(&server);

        session
            .handle_text(r#"{"cmd":"connect","id":3,"url":"/unknown"}"#)
            .await;
        assert_eq!(
            next(&mut receiver).await,
            r#"{"event":"error","reason":"Validation error: unknown url"}"#
        );
        assert!(session.registry().is_empty());

        session.handle_text(r#"{"cmd":"close","id":3}"#).await;
        assert_eq!(
            next(&mut receiver).await,
            r#"{"event":"error","reason":"Unknown subscription id: 3"}"#
        );
    }

    #[tokio::test]
    async fn test_protocol_errors_keep_session_alive() {
        let server = backend(200, "").await;
        let (session, mut receiver) = session_for(&server);

        session.handle_text(r#"{"id":1}"#).await;
        assert_eq!(
            next(&mut receiver).await,
            r#"{"event":"error","reason":"Protocol error: missing cmd"}"#
        );

        session.handle_text(r#"{"cmd":"reconnect","id":1}"#).await;
        assert_eq!(
            next(&mut receiver).await,
            r#"{"event":"error","reason":"Protocol error: unknown command: reconnect"}"#
        );

        session.handle_text(r#"{"cmd":"close","id":0}"#).await;
        let event = next(&mut receiver).await;
        assert!(event.starts_with(r#"{"event":"error","reason":"Validation error:"#));
    }

    #[tokio::test]
    async fn test_backend_unreachable_reports_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let resolver = move |_: &str| Url::parse(&format!("http://{addr}/stream")).ok();
        let context = SessionContext::new(
            Arc::new(resolver),
            Backend::new().expect("client"),
            &RelayConfig::default(),
        );
        let (session, mut receiver) = Session::new(context, CancellationToken::new());

        session
            .handle_text(r#"{"cmd":"connect","id":4,"url":"/anything"}"#)
            .await;

        let event = next(&mut receiver).await;
        assert!(event.starts_with(r#"{"event":"error","reason":"Backend connection to"#));
        assert!(session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_reader_forwards_frames_and_cancels_on_close() {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::protocol::Role;

        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let mut client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

        let (_sink, stream) = server.split();
        let (events, _receiver) = queue::channel(4);
        let (inbound_tx, mut inbound) = mpsc::channel(4);
        let token = CancellationToken::new();
        let task = tokio::spawn(read_inbound(stream, inbound_tx, events, token.clone()));

        client
            .send(Message::text(r#"{"cmd":"close","id":1}"#))
            .await
            .expect("send text");
        client
            .send(Message::binary(vec![0u8, 1]))
            .await
            .expect("send binary");
        let _ = client.close(None).await;

        let text = inbound.recv().await.expect("text forwarded");
        assert_eq!(text.expect("accepted"), r#"{"cmd":"close","id":1}"#);

        let binary = inbound.recv().await.expect("binary forwarded");
        assert!(matches!(binary, Err(Error::Protocol { .. })));

        tokio::time::timeout(WAIT, task)
            .await
            .expect("reader exits")
            .expect("join");
        assert!(token.is_cancelled());
        assert!(inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_later_events() {
        let server = backend(503, "overloaded").await;
        let (session, mut receiver) = session_for(&server);

        session.shutdown();
        session
            .handle_text(r#"{"cmd":"connect","id":2,"url":"/system/autoupdate"}"#)
            .await;

        assert!(receiver.recv().await.is_none());
        assert!(session.registry().is_empty());
    }
}
