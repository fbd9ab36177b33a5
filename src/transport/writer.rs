//! Single outbound writer.
//!
//! Drains a Session's [`EventReceiver`] into the WebSocket sink, one text
//! message per event, in enqueue order. A failed write means the client
//! is gone: the writer cancels the Session scope and stops.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::relay::EventReceiver;

// ============================================================================
// Writer Loop
// ============================================================================

/// Writes events until the queue is closed and drained.
///
/// Returns the number of events written.
///
/// # Errors
///
/// Returns [`crate::Error::WebSocket`] on the first failed write, after
/// cancelling `session`.
pub async fn run<S>(
    mut sink: S,
    mut events: EventReceiver,
    session: CancellationToken,
) -> Result<usize>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut written = 0;

    while let Some(event) = events.recv().await {
        let json = match event.encode() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to encode event");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(json.into())).await {
            warn!(error = %e, "Write to client failed");
            session.cancel();
            return Err(e.into());
        }

        written += 1;
        trace!(written, "Event written");
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "Closing WebSocket sink failed");
    }

    debug!(written, "Writer finished");
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================
