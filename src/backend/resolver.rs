//! Logical path resolution.
//!
//! Clients never name backend hosts directly. They send a logical path
//! such as `/system/autoupdate` and the relay maps it to an absolute URL.
//! An unresolved path rejects the `connect` command.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Logical path of the autoupdate service.
pub const AUTOUPDATE_PATH: &str = "/system/autoupdate";

// ============================================================================
// Resolver
// ============================================================================

/// Maps a logical path to an absolute backend URL.
///
/// Returning `None` means the path is unknown.
pub trait Resolver: Send + Sync {
    /// Resolves `path`, or returns `None` if it is not routable.
    fn resolve(&self, path: &str) -> Option<Url>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Option<Url> + Send + Sync,
{
    fn resolve(&self, path: &str) -> Option<Url> {
        self(path)
    }
}

// ============================================================================
// StaticResolver
// ============================================================================

/// Resolver backed by a fixed table of exact paths.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    routes: FxHashMap<String, Url>,
}

impl StaticResolver {
    /// Creates an empty resolver.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route from `path` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `url` is not an absolute URL.
    pub fn route(mut self, path: impl Into<String>, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::config(format!("invalid url `{url}`: {e}")))?;
        self.routes.insert(path.into(), url);
        Ok(self)
    }

    /// Returns the number of routes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are configured.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, path: &str) -> Option<Url> {
        self.routes.get(path).cloned()
    }
}

// ============================================================================
// AutoupdateResolver
// ============================================================================

/// Routes [`AUTOUPDATE_PATH`] to `<protocol>://<host>:<port>/system/autoupdate`.
///
/// Every other path is unresolved.
#[derive(Debug, Clone)]
pub struct AutoupdateResolver {
    target: Url,
}

impl AutoupdateResolver {
    /// Creates a resolver for the autoupdate service at `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the parts do not form a valid URL.
    pub fn new(protocol: &str, host: &str, port: u16) -> Result<Self> {
        let raw = format!("{protocol}://{host}:{port}{AUTOUPDATE_PATH}");
        let target =
            Url::parse(&raw).map_err(|e| Error::config(format!("invalid autoupdate url `{raw}`: {e}")))?;
        Ok(Self { target })
    }

    /// Returns the absolute autoupdate URL.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Url {
        &self.target
    }
}

impl Resolver for AutoupdateResolver {
    fn resolve(&self, path: &str) -> Option<Url> {
        (path == AUTOUPDATE_PATH).then(|| self.target.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
