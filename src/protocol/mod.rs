//! WebSocket protocol message types.
//!
//! This module defines the message format between the client and the relay.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Command`] | Client → Relay | Open or close a subscription |
//! | [`Event`] | Relay → Client | Subscription lifecycle, data, errors |
//!
//! Each message is a single JSON object in one WebSocket text frame.
//! Commands are discriminated by `cmd`, events by `event`. Subscription
//! events carry the client-assigned `id` they belong to.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command decoding and validation |
//! | `event` | Event construction and encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Client command types.
pub mod command;

/// Relay event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{CloseCommand, Command, ConnectCommand};
pub use event::{BACKEND_LOST_REASON, Event};
