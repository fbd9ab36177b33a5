//! Backend stream reader.
//!
//! One reader task runs per streaming subscription, from the moment the
//! backend answered 200 until the subscription reaches its terminal state.
//!
//! # State Machine
//!
//! ```text
//!              line                 EOF / failure / cancel
//! Streaming ───────► data event    ───────────────────────► Closed
//!     ▲                  │
//!     └──────────────────┘
//! ```
//!
//! The reader is the only producer of events for its subscription after
//! `connected`, so `data` events always precede the single terminal
//! `close` and nothing follows it.
//!
//! | Termination | Close event |
//! |-------------|-------------|
//! | Backend EOF | `close{code, reason: null}` |
//! | Close command | `close{code, reason: null}` |
//! | Session teardown | none |
//! | Body read failure | `close{code, reason: "connection to backend lost"}` |
//! | Oversized line | `close{code, reason: "backend line exceeds N bytes"}` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::identifiers::SubscriptionId;
use crate::protocol::{BACKEND_LOST_REASON, Event};

use super::lines::LineSplitter;
use super::queue::EventQueue;
use super::registry::{Generation, SubscriptionRegistry};

// ============================================================================
// Termination
// ============================================================================

/// Why a reader left the `Streaming` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Backend body ended cleanly.
    EndOfStream,
    /// Subscription or Session scope was cancelled.
    Cancelled,
    /// Backend body failed; carries the close reason.
    Failed(String),
    /// The outbound queue is closed; nobody is listening.
    QueueClosed,
}

impl Termination {
    /// Builds the terminal event for this outcome, if any.
    ///
    /// `session_cancelled` distinguishes teardown, which is silent, from an
    /// explicit close of this one subscription.
    #[must_use]
    pub fn close_event(
        &self,
        id: SubscriptionId,
        status: u16,
        session_cancelled: bool,
    ) -> Option<Event> {
        match self {
            Self::EndOfStream => Some(Event::close(id, status, None)),
            Self::Cancelled if session_cancelled => None,
            Self::Cancelled => Some(Event::close(id, status, None)),
            Self::Failed(reason) => Some(Event::close(id, status, Some(reason.clone()))),
            Self::QueueClosed => None,
        }
    }
}

// ============================================================================
// StreamReader
// ============================================================================

/// Relays one backend body as `data` events.
pub(crate) struct StreamReader {
    id: SubscriptionId,
    generation: Generation,
    status: u16,
    cancel: CancellationToken,
    session: CancellationToken,
    registry: Arc<SubscriptionRegistry>,
    events: EventQueue,
    lines: LineSplitter,
}

impl StreamReader {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SubscriptionId,
        generation: Generation,
        status: u16,
        cancel: CancellationToken,
        session: CancellationToken,
        registry: Arc<SubscriptionRegistry>,
        events: EventQueue,
        max_line_bytes: Option<usize>,
    ) -> Self {
        Self {
            id,
            generation,
            status,
            cancel,
            session,
            registry,
            events,
            lines: LineSplitter::new(max_line_bytes),
        }
    }

    /// Streams `response` until a terminal transition, then emits the
    /// terminal event.
    pub(crate) async fn run(mut self, response: Response) {
        let termination = self.stream(response).await;
        debug!(id = %self.id, ?termination, "Backend stream finished");

        self.registry.unregister(self.id, self.generation);

        let event = termination.close_event(self.id, self.status, self.session.is_cancelled());
        if let Some(event) = event
            && let Err(e) = self.events.send(event).await
        {
            debug!(id = %self.id, error = %e, "Dropped close event");
        }
    }

    async fn stream(&mut self, response: Response) -> Termination {
        let mut body = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Termination::Cancelled,
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    self.lines.push(&bytes);
                    if let Err(termination) = self.relay_lines().await {
                        return termination;
                    }
                }

                Some(Err(e)) => {
                    if self.cancel.is_cancelled() {
                        return Termination::Cancelled;
                    }
                    warn!(id = %self.id, error = %e, "Reading from backend failed");
                    return Termination::Failed(BACKEND_LOST_REASON.to_string());
                }

                None => {
                    if let Some(line) = self.lines.finish()
                        && let Err(termination) = self.emit(Event::data(self.id, &line)).await
                    {
                        return termination;
                    }
                    return Termination::EndOfStream;
                }
            }
        }
    }

    /// Emits every complete buffered line.
    async fn relay_lines(&mut self) -> Result<(), Termination> {
        loop {
            match self.lines.next_line() {
                Ok(Some(line)) => {
                    trace!(id = %self.id, len = line.len(), "Relaying line");
                    self.emit(Event::data(self.id, &line)).await?;
                }
                Ok(None) => return Ok(()),
                Err(Error::BackendStream { message }) => {
                    warn!(id = %self.id, %message, "Backend line rejected");
                    return Err(Termination::Failed(message));
                }
                Err(e) => return Err(Termination::Failed(e.to_string())),
            }
        }
    }

    /// Sends a data event unless the subscription was cancelled first.
    async fn emit(&self, event: Event) -> Result<(), Termination> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Termination::Cancelled),
            sent = self.events.send(event) => sent.map_err(|_| Termination::QueueClosed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
