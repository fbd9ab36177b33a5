//! Outbound event queue.
//!
//! One bounded FIFO per Session. Every producer (command execution, stream
//! readers, the control loop) sends into it; a single writer drains it.
//! A full queue blocks producers, so a slow client throttles the Session
//! instead of dropping events.
//!
//! The queue is closed explicitly, once, at teardown. After that every
//! send returns [`Error::QueueClosed`], including sends already waiting
//! for capacity, and the receiver yields whatever was buffered before
//! reporting the end.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::Event;

// ============================================================================
// Constructor
// ============================================================================

/// Creates a queue with room for `capacity` events (at least one).
#[must_use]
pub fn channel(capacity: usize) -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();

    let queue = EventQueue {
        tx,
        closed: closed.clone(),
        close_once: Arc::new(AtomicBool::new(false)),
    };
    let receiver = EventReceiver {
        rx,
        closed,
        draining: false,
    };
    (queue, receiver)
}

// ============================================================================
// EventQueue
// ============================================================================

/// Sending half of the outbound queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
    closed: CancellationToken,
    close_once: Arc<AtomicBool>,
}

impl EventQueue {
    /// Enqueues `event`, waiting for capacity if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the queue is or becomes closed.
    pub async fn send(&self, event: Event) -> Result<()> {
        if self.is_closed() {
            return Err(Error::QueueClosed);
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(Error::QueueClosed),
            sent = self.tx.send(event) => sent.map_err(|_| Error::QueueClosed),
        }
    }

    /// Closes the queue.
    ///
    /// Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        let first = !self.close_once.swap(true, Ordering::AcqRel);
        if first {
            self.closed.cancel();
        }
        first
    }

    /// Returns `true` once the queue is closed or the receiver is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

// ============================================================================
// EventReceiver
// ============================================================================

/// Receiving half of the outbound queue, owned by the writer.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
    closed: CancellationToken,
    draining: bool,
}

impl EventReceiver {
    /// Returns the next event in enqueue order.
    ///
    /// Returns `None` after the queue is closed and fully drained.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => return event,
                () = self.closed.cancelled(), if !self.draining => {
                    self.rx.close();
                    self.draining = true;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
