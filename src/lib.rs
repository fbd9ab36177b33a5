//! wsmux - WebSocket to HTTP streaming multiplexer.
//!
//! This library relays many long-lived newline-delimited HTTP streams to a
//! client over a single WebSocket connection.
//!
//! # Architecture
//!
//! The relay sits between WebSocket clients and HTTP backends:
//!
//! - **Client side**: Sends `connect` / `close` commands, receives events
//! - **Backend side**: Streams newline-delimited JSON over HTTP GET
//!
//! Key design principles:
//!
//! - Each WebSocket connection owns one [`Session`] with a cancellation scope
//! - Every subscription runs under a child of that scope
//! - All outbound events flow through one bounded queue and one writer
//! - A subscription emits exactly one terminal event, or none on teardown
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//! use wsmux::{AutoupdateResolver, Backend, RelayConfig, RelayServer, Result, SessionContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::builder().build()?;
//!     let resolver = AutoupdateResolver::new("http", "localhost", 8002)?;
//!     let context = SessionContext::new(Arc::new(resolver), Backend::new()?, &config);
//!
//!     let server = RelayServer::bind(config.listen_addr, context).await?;
//!     server.serve(CancellationToken::new()).await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | Path resolution and streaming HTTP client |
//! | [`config`] | Relay configuration and builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Client commands and relay events |
//! | [`relay`] | Sessions, registry, queue, stream readers |
//! | [`transport`] | WebSocket server and writer |

// ============================================================================
// Modules
// ============================================================================

/// Backend path resolution and HTTP streaming.
pub mod backend;

/// Relay configuration.
///
/// Use [`RelayConfig::builder()`] to create a validated configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for subscriptions and sessions.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Multiplexing engine.
pub mod relay;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Backend types
pub use backend::{AUTOUPDATE_PATH, AutoupdateResolver, Backend, Resolver, StaticResolver};

// Config types
pub use config::{RelayConfig, RelayConfigBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SessionId, SubscriptionId};

// Protocol types
pub use protocol::{Command, Event};

// Relay types
pub use relay::{Session, SessionContext};

// Transport types
pub use transport::RelayServer;
