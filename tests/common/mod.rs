//! Shared harness for relay integration tests.
//!
//! Provides a running [`RelayServer`], a WebSocket test client, and a
//! chunked NDJSON backend whose stream is driven line by line from the test.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use wsmux::{Backend, RelayConfig, RelayServer, SessionContext, StaticResolver};

/// Upper bound on every wait in these tests.
pub const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Relay
// ============================================================================

/// A relay server running on a random local port.
pub struct Relay {
    pub ws_url: String,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<wsmux::Result<()>>,
}

impl Relay {
    /// Starts a relay routing each `(path, url)` pair.
    pub async fn start(routes: &[(&str, &str)]) -> Self {
        let mut resolver = StaticResolver::new();
        for (path, url) in routes {
            resolver = resolver.route(*path, url).expect("valid route");
        }

        let config = RelayConfig::builder()
            .listen_addr("127.0.0.1:0".parse().expect("addr"))
            .queue_capacity(16)
            .build()
            .expect("valid config");
        let context = SessionContext::new(
            Arc::new(resolver),
            Backend::new().expect("http client"),
            &config,
        );

        let server = RelayServer::bind(config.listen_addr, context)
            .await
            .expect("bind relay");
        let ws_url = server.ws_url();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(shutdown.clone()));

        Self {
            ws_url,
            shutdown,
            handle,
        }
    }

    /// Opens a client connection.
    pub async fn client(&self) -> Client {
        Client::connect(&self.ws_url).await
    }
}

// ============================================================================
// Client
// ============================================================================

/// WebSocket client speaking the relay protocol.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn connect(url: &str) -> Self {
        let (ws, _) = tokio::time::timeout(TIMEOUT, tokio_tungstenite::connect_async(url))
            .await
            .expect("connect timed out")
            .expect("connect to relay");
        Self { ws }
    }

    pub async fn send(&mut self, command: Value) {
        self.ws
            .send(Message::Text(command.to_string().into()))
            .await
            .expect("send command");
    }

    pub async fn send_binary(&mut self, bytes: &[u8]) {
        self.ws
            .send(Message::Binary(bytes.to_vec().into()))
            .await
            .expect("send binary");
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Value {
        self.try_next_event(TIMEOUT)
            .await
            .expect("expected an event")
    }

    /// Waits up to `wait` for an event; `None` on silence or end of stream.
    pub async fn try_next_event(&mut self, wait: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let message = tokio::time::timeout_at(deadline, self.ws.next()).await.ok()??;
            match message.ok()? {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).expect("event is JSON"));
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    /// Asserts that nothing arrives for a short while.
    pub async fn expect_silence(&mut self) {
        let event = self.try_next_event(Duration::from_millis(300)).await;
        assert!(event.is_none(), "unexpected event: {event:?}");
    }

    /// Waits until the relay closes the connection.
    pub async fn wait_closed(&mut self) {
        let closed = tokio::time::timeout(TIMEOUT, async {
            while let Some(message) = self.ws.next().await {
                if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "relay did not close the connection");
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ============================================================================
// Chunked Backend
// ============================================================================

/// HTTP backend that answers every GET with an open-ended chunked body,
/// or with nothing at all.
pub struct StreamBackend {
    url: String,
    accepted: mpsc::UnboundedReceiver<BackendConn>,
}

impl StreamBackend {
    pub async fn start() -> Self {
        Self::listen(true).await
    }

    /// Starts a backend that reads each request and never answers it.
    pub async fn unresponsive() -> Self {
        Self::listen(false).await
    }

    async fn listen(respond: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
        let addr = listener.local_addr().expect("backend addr");
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(conn) = BackendConn::handshake(stream, respond).await {
                        let _ = tx.send(conn);
                    }
                });
            }
        });

        Self {
            url: format!("http://{addr}/stream"),
            accepted,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Waits for the relay to open the next backend request.
    pub async fn accept(&mut self) -> BackendConn {
        tokio::time::timeout(TIMEOUT, self.accepted.recv())
            .await
            .expect("backend request timed out")
            .expect("backend listener alive")
    }
}

/// One streaming backend response.
pub struct BackendConn {
    stream: TcpStream,
    pub request: String,
}

impl BackendConn {
    async fn handshake(mut stream: TcpStream, respond: bool) -> Option<Self> {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            request.extend_from_slice(&buf[..n]);
        }

        if !respond {
            return Some(Self {
                stream,
                request: String::from_utf8_lossy(&request).into_owned(),
            });
        }

        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: application/x-ndjson\r\n\
                  Transfer-Encoding: chunked\r\n\
                  Connection: close\r\n\r\n",
            )
            .await
            .ok()?;
        stream.flush().await.ok()?;

        Some(Self {
            stream,
            request: String::from_utf8_lossy(&request).into_owned(),
        })
    }

    /// Writes one newline-terminated record as its own chunk.
    pub async fn send_line(&mut self, line: &str) {
        let record = format!("{line}\n");
        let chunk = format!("{:x}\r\n{record}\r\n", record.len());
        self.stream
            .write_all(chunk.as_bytes())
            .await
            .expect("write chunk");
        self.stream.flush().await.expect("flush chunk");
    }

    /// Ends the body cleanly.
    pub async fn end(mut self) {
        self.stream
            .write_all(b"0\r\n\r\n")
            .await
            .expect("write last chunk");
        let _ = self.stream.shutdown().await;
    }

    /// Drops the connection in the middle of the body.
    pub fn abort(self) {
        drop(self.stream);
    }

    /// Waits until the relay hangs up.
    pub async fn wait_disconnect(mut self) {
        let hung_up = tokio::time::timeout(TIMEOUT, async {
            let mut buf = [0u8; 256];
            loop {
                match self.stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        assert!(hung_up.is_ok(), "relay kept the backend connection open");
    }
}
