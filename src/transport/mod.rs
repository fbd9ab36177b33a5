//! WebSocket transport layer.
//!
//! This module connects Sessions to clients over WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   WebSocket    ┌──────────────────────────┐   HTTP GET   ┌─────────┐
//! │  Client  │◄──────────────►│ RelayServer              │─────────────►│ Backend │
//! │          │  commands /    │  └─ Session per client   │   NDJSON     │         │
//! │          │  events        │      ├─ control loop     │◄─────────────│         │
//! └──────────┘                │      ├─ writer           │              └─────────┘
//!                             │      └─ stream readers   │
//!                             └──────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `server` | Listener, WebSocket upgrade, Session spawning |
//! | `writer` | Single writer from the event queue to the socket |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket server.
pub mod server;

/// Outbound event writer.
pub mod writer;

// ============================================================================
// Re-exports
// ============================================================================

pub use server::RelayServer;
