//! Scope strategies
//!
//! A scope decides whether a resolution reuses a stored instance or asks the
//! registration to build a fresh one. Stores are keyed by the registration's
//! [`ServiceKey`] and hold `Arc<T>` (or `Weak<T>` for the shared scope) behind
//! type erasure.
//!
//! Stores are only touched from inside a resolution, which already holds the
//! owning context's reentrant lock. The inner mutexes are never held while a
//! factory runs, so nested resolutions through the same scope cannot deadlock.

use crate::registration::Registration;
use crate::{Args, Container, Injectable, ScopeKind, ServiceKey};
use ahash::RandomState;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

type StrongStore = HashMap<ServiceKey, Box<dyn Any + Send + Sync>, RandomState>;

/// Handle to the scope strategy governing one registration.
///
/// Cheap to clone. Built-in instances come from [`Scopes`]; applications
/// may also create their own [`CachedScope`] (for example a per-session
/// cache) and attach it with
/// [`RegistrationHandle::custom_scope`](crate::RegistrationHandle::custom_scope).
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{CachedScope, Container, Scope};
/// use std::sync::Arc;
///
/// struct Session { user: String }
///
/// let session_scope = Arc::new(CachedScope::new("session"));
/// let container = Container::new();
/// container
///     .register(|_, _| Some(Session { user: "fred".into() }))
///     .custom_scope(Scope::Cached(Arc::clone(&session_scope)));
///
/// let a = container.resolve::<Session>().unwrap();
/// let b = container.resolve::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// // Logging out drops the session-scoped instances
/// session_scope.reset();
/// let c = container.resolve::<Session>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Clone, Debug)]
pub enum Scope {
    /// Always instantiate; nothing is stored
    Unique,
    /// Reuse within one resolution cycle
    Graph(Arc<GraphScope>),
    /// Reuse until the store is reset
    Cached(Arc<CachedScope>),
    /// Reuse while a strong owner exists outside the registry
    Shared(Arc<SharedScope>),
    /// Reuse within the resolving container's own cache
    Container,
}

impl Scope {
    /// Produce an instance for `registration`, consulting this scope's store.
    pub(crate) fn resolve<T: ?Sized + Injectable>(
        &self,
        registration: &Registration<T>,
        container: &Container,
        args: &Args,
    ) -> Option<Arc<T>> {
        match self {
            Scope::Unique => registration.instantiate(container, args),
            Scope::Graph(graph) => graph.resolve(registration, container, args),
            Scope::Cached(cache) => cache.resolve(registration, container, args),
            Scope::Shared(shared) => shared.resolve(registration, container, args),
            Scope::Container => container.cache().resolve(registration, container, args),
        }
    }

    /// Label used in logs and `Debug` output
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Unique => "unique",
            Scope::Graph(_) => "graph",
            Scope::Cached(cache) => cache.label(),
            Scope::Shared(_) => "shared",
            Scope::Container => "container",
        }
    }
}

// =============================================================================
// Cached Scope
// =============================================================================

/// Strong cache: the first instance built is kept until [`reset`](Self::reset).
///
/// The application and cached scopes are two instances of this strategy, and
/// every container embeds one more for [`ScopeKind::Container`].
pub struct CachedScope {
    label: &'static str,
    store: Mutex<StrongStore>,
}

impl CachedScope {
    /// Create an empty cache; `label` only shows up in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            store: Mutex::new(HashMap::default()),
        }
    }

    pub(crate) fn resolve<T: ?Sized + Injectable>(
        &self,
        registration: &Registration<T>,
        container: &Container,
        args: &Args,
    ) -> Option<Arc<T>> {
        let key = registration.cache_key();
        if let Some(cached) = lookup_strong::<T>(&self.store, key) {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_resolver",
                service = %key,
                scope = self.label,
                "Returning cached instance"
            );
            return Some(cached);
        }

        let instance = registration.instantiate(container, args)?;
        self.store.lock().insert(key.clone(), Box::new(Arc::clone(&instance)));
        Some(instance)
    }

    /// Drop every stored instance.
    pub fn reset(&self) {
        let mut store = self.store.lock();

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            scope = self.label,
            instances_removed = store.len(),
            "Scope cache reset"
        );

        store.clear();
    }

    /// Number of stored instances
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl std::fmt::Debug for CachedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedScope")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Graph Scope
// =============================================================================

/// Cycle-local cache.
///
/// Instances built through this scope are shared among every resolution
/// nested inside the same top-level resolve, then discarded in bulk once the
/// outermost graph-scoped construction returns.
pub struct GraphScope {
    depth: AtomicUsize,
    store: Mutex<StrongStore>,
}

impl GraphScope {
    pub fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
            store: Mutex::new(HashMap::default()),
        }
    }

    pub(crate) fn resolve<T: ?Sized + Injectable>(
        &self,
        registration: &Registration<T>,
        container: &Container,
        args: &Args,
    ) -> Option<Arc<T>> {
        let key = registration.cache_key();
        if self.depth() > 0 {
            if let Some(cached) = lookup_strong::<T>(&self.store, key) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "dependency_resolver",
                    service = %key,
                    depth = self.depth(),
                    "Reusing instance from current resolution cycle"
                );
                return Some(cached);
            }
        }

        let instance = {
            let _entered = DepthGuard::enter(self);
            registration.instantiate(container, args)
        };

        if self.depth() > 0 {
            if let Some(instance) = &instance {
                self.store.lock().insert(key.clone(), Box::new(Arc::clone(instance)));
            }
        }
        instance
    }

    /// Current nesting of graph-scoped constructions
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Number of instances held for the cycle in progress
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}

impl Default for GraphScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphScope")
            .field("depth", &self.depth())
            .field("len", &self.len())
            .finish()
    }
}

/// Tracks one graph-scoped construction; leaving the outermost one flushes
/// the cycle's store, also when the factory unwinds.
struct DepthGuard<'a> {
    scope: &'a GraphScope,
}

impl<'a> DepthGuard<'a> {
    fn enter(scope: &'a GraphScope) -> Self {
        scope.depth.fetch_add(1, Ordering::AcqRel);
        Self { scope }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        if self.scope.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut store = self.scope.store.lock();

            #[cfg(feature = "logging")]
            if !store.is_empty() {
                trace!(
                    target: "dependency_resolver",
                    instances_released = store.len(),
                    "Resolution cycle complete, releasing graph instances"
                );
            }

            store.clear();
        }
    }
}

// =============================================================================
// Shared Scope
// =============================================================================

/// Type-erased weak entry that can report liveness without knowing `T`.
trait WeakSlot: Send + Sync {
    fn is_alive(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: ?Sized + Injectable> WeakSlot for Weak<T> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Weak cache: an instance is reused only while something outside the
/// registry still owns it. Once the last strong owner drops it, the next
/// resolution builds a new one.
pub struct SharedScope {
    store: Mutex<HashMap<ServiceKey, Box<dyn WeakSlot>, RandomState>>,
}

impl SharedScope {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::default()),
        }
    }

    pub(crate) fn resolve<T: ?Sized + Injectable>(
        &self,
        registration: &Registration<T>,
        container: &Container,
        args: &Args,
    ) -> Option<Arc<T>> {
        let key = registration.cache_key();
        if let Some(alive) = self.lookup::<T>(key) {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_resolver",
                service = %key,
                "Returning live shared instance"
            );
            return Some(alive);
        }

        let instance = registration.instantiate(container, args)?;
        self.store.lock().insert(key.clone(), Box::new(Arc::downgrade(&instance)));
        Some(instance)
    }

    fn lookup<T: ?Sized + Injectable>(&self, key: &ServiceKey) -> Option<Arc<T>> {
        let mut store = self.store.lock();
        let slot = store.get(key)?;
        match slot.as_any().downcast_ref::<Weak<T>>().and_then(Weak::upgrade) {
            Some(alive) => Some(alive),
            None => {
                store.remove(key);
                None
            }
        }
    }

    /// Forget every entry, live or not.
    pub fn reset(&self) {
        let mut store = self.store.lock();

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            scope = "shared",
            entries_removed = store.len(),
            "Scope cache reset"
        );

        store.clear();
    }

    /// Remove entries whose instance has already been released.
    pub fn prune(&self) -> usize {
        let mut store = self.store.lock();
        let before = store.len();
        store.retain(|_, slot| slot.is_alive());
        before - store.len()
    }

    /// Number of entries whose instance is still alive
    pub fn len(&self) -> usize {
        self.store.lock().values().filter(|slot| slot.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedScope").field("alive", &self.len()).finish()
    }
}

fn lookup_strong<T: ?Sized + Injectable>(store: &Mutex<StrongStore>, key: &ServiceKey) -> Option<Arc<T>> {
    store.lock().get(key)?.downcast_ref::<Arc<T>>().cloned()
}

// =============================================================================
// Built-in scope instances
// =============================================================================

/// The scope instances shared by every container of one context.
///
/// `application` and `cached` behave identically; they are separate stores
/// so that each can be reset on its own.
#[derive(Debug)]
pub struct Scopes {
    pub application: Arc<CachedScope>,
    pub cached: Arc<CachedScope>,
    pub graph: Arc<GraphScope>,
    pub shared: Arc<SharedScope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            application: Arc::new(CachedScope::new("application")),
            cached: Arc::new(CachedScope::new("cached")),
            graph: Arc::new(GraphScope::new()),
            shared: Arc::new(SharedScope::new()),
        }
    }

    /// Handle for a built-in scope kind
    pub fn get(&self, kind: ScopeKind) -> Scope {
        match kind {
            ScopeKind::Unique => Scope::Unique,
            ScopeKind::Graph => Scope::Graph(Arc::clone(&self.graph)),
            ScopeKind::Application => Scope::Cached(Arc::clone(&self.application)),
            ScopeKind::Cached => Scope::Cached(Arc::clone(&self.cached)),
            ScopeKind::Shared => Scope::Shared(Arc::clone(&self.shared)),
            ScopeKind::Container => Scope::Container,
        }
    }

    /// Clear the application, cached and shared stores.
    ///
    /// The graph store empties itself at the end of every cycle and
    /// container caches live and die with their containers.
    pub fn reset(&self) {
        self.application.reset();
        self.cached.reset();
        self.shared.reset();
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
