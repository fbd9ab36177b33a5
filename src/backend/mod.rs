//! Backend collaborators.
//!
//! A subscription targets a logical path chosen by the client. The
//! [`Resolver`] turns that path into an absolute URL, and the [`Backend`]
//! issues the streaming GET against it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `resolver` | Logical path → absolute URL |
//! | `client` | Streaming HTTP requests over `reqwest` |

// ============================================================================
// Submodules
// ============================================================================

/// Streaming HTTP client.
pub mod client;

/// Logical path resolution.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::Backend;
pub use resolver::{AUTOUPDATE_PATH, AutoupdateResolver, Resolver, StaticResolver};
