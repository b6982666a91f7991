//! Provider traits for dependency injection
//!
//! These traits define what types can be registered and resolved, and which
//! built-in caching policy governs them.

/// Marker trait for types that can be registered and resolved.
///
/// This is automatically implemented for all types that are
/// `Send + Sync + 'static`, including unsized trait objects such as
/// `dyn Greeter + Send + Sync`, so capability keys can be traits.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Built-in caching policy selector.
///
/// Each kind maps to a scope strategy instance owned by the container's
/// context (see [`Scopes`](crate::Scopes)); `Container` maps to the
/// resolving container's own embedded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeKind {
    /// New instance on every resolve, never stored
    Unique,

    /// Reused within one resolution cycle, discarded when it completes
    #[default]
    Graph,

    /// Strongly cached until the context's application scope is reset
    Application,

    /// Strongly cached until the context's cached scope is reset
    Cached,

    /// Reused while something outside the registry still holds it
    Shared,

    /// Strongly cached in the resolving container itself
    Container,
}

impl ScopeKind {
    /// Lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Unique => "unique",
            ScopeKind::Graph => "graph",
            ScopeKind::Application => "application",
            ScopeKind::Cached => "cached",
            ScopeKind::Shared => "shared",
            ScopeKind::Container => "container",
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
