//! Relay configuration.
//!
//! Provides [`RelayConfig`] and a fluent [`RelayConfigBuilder`] with
//! validation.
//!
//! # Example
//!
//! ```
//! use wsmux::RelayConfig;
//!
//! # fn example() -> wsmux::Result<()> {
//! let config = RelayConfig::builder()
//!     .listen_addr("127.0.0.1:9013".parse().unwrap())
//!     .queue_capacity(16)
//!     .max_line_bytes(4 * 1024 * 1024)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9013);

/// Default outbound queue capacity per Session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

// ============================================================================
// RelayConfig
// ============================================================================

/// Validated relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: SocketAddr,
    /// Outbound events buffered per Session before producers block.
    pub queue_capacity: usize,
    /// Longest accepted backend line; `None` means unbounded.
    pub max_line_bytes: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line_bytes: None,
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }
}

// ============================================================================
// RelayConfigBuilder
// ============================================================================

/// Builder for [`RelayConfig`].
#[derive(Debug, Default, Clone)]
pub struct RelayConfigBuilder {
    listen_addr: Option<SocketAddr>,
    queue_capacity: Option<usize>,
    max_line_bytes: Option<usize>,
}

impl RelayConfigBuilder {
    /// Creates a builder with every field at its default.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address.
    #[inline]
    #[must_use]
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Sets the per-Session outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Caps backend line length.
    #[inline]
    #[must_use]
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = Some(max);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `queue_capacity` is zero
    /// - [`Error::Config`] if `max_line_bytes` is zero
    pub fn build(self) -> Result<RelayConfig> {
        let queue_capacity = self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if queue_capacity == 0 {
            return Err(Error::config("queue capacity must be at least 1"));
        }

        if self.max_line_bytes == Some(0) {
            return Err(Error::config("max line bytes must be at least 1"));
        }

        Ok(RelayConfig {
            listen_addr: self.listen_addr.unwrap_or(DEFAULT_LISTEN_ADDR),
            queue_capacity,
            max_line_bytes: self.max_line_bytes,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::builder().build().expect("valid");
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.listen_addr.port(), 9013);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.max_line_bytes, None);
    }

    #[test]
    fn test_overrides() {
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
        let config = RelayConfig::builder()
            .listen_addr(addr)
            .queue_capacity(32)
            .max_line_bytes(1024)
            .build()
            .expect("valid");

        assert_eq!(config.listen_addr, addr);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.max_line_bytes, Some(1024));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = RelayConfig::builder().queue_capacity(0).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_zero_line_limit() {
        let err = RelayConfig::builder().max_line_bytes(0).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
