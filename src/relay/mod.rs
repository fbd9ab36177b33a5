//! Multiplexing engine.
//!
//! Everything with real concurrency lives here: the per-connection
//! [`Session`], its [`SubscriptionRegistry`], the outbound [`EventQueue`],
//! and the backend stream readers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | Control loop, command dispatch, teardown |
//! | `registry` | Subscription id → cancellation token |
//! | `queue` | Bounded FIFO with explicit close |
//! | `reader` | Backend stream reader and termination classification |
//! | `lines` | Growable-buffer line splitter |

// ============================================================================
// Submodules
// ============================================================================

/// Newline-delimited record splitting.
pub mod lines;

/// Outbound event queue.
pub mod queue;

/// Backend stream reader.
pub mod reader;

/// Subscription registry.
pub mod registry;

/// Per-connection Session.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use lines::LineSplitter;
pub use queue::{EventQueue, EventReceiver};
pub use reader::Termination;
pub use registry::{Generation, SubscriptionRegistry};
pub use session::{Session, SessionContext};
