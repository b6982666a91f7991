//! Service container
//!
//! The `Container` owns registration records, composes child containers and
//! runs the resolution algorithm: lock, look up the record locally then in
//! children depth-first, and hand it to its scope.

use crate::factory;
use crate::registration::{Registration, RegistrationHandle};
use crate::scope::{CachedScope, Scopes};
use crate::storage::ServiceStorage;
use crate::{Args, DiError, Injectable, Name, Result, ScopeKind, ServiceKey};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Shared Context
// =============================================================================

/// Hook run once before the first resolution in a context
pub(crate) type ContextHook = Arc<dyn Fn() + Send + Sync>;

/// State shared by every container built from the same root: the resolution
/// lock, the built-in scope instances, the default scope and the bootstrap
/// gate.
pub(crate) struct Context {
    /// Serializes every registration and resolution. Reentrant because
    /// factories resolve their own dependencies while the outer call still
    /// holds it.
    lock: ReentrantMutex<()>,
    scopes: Scopes,
    default_scope: RwLock<ScopeKind>,
    bootstrap: RwLock<Option<ContextHook>>,
    needs_bootstrap: AtomicBool,
}

impl Context {
    pub(crate) fn new(default_scope: ScopeKind) -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            scopes: Scopes::new(),
            default_scope: RwLock::new(default_scope),
            bootstrap: RwLock::new(None),
            needs_bootstrap: AtomicBool::new(false),
        }
    }

    /// Install `hook` and arm it for the next resolution.
    pub(crate) fn set_bootstrap(&self, hook: ContextHook) {
        let _guard = self.lock();
        *self.bootstrap.write() = Some(hook);
        self.needs_bootstrap.store(true, Ordering::Release);
    }

    /// Arm the installed hook again, if any.
    pub(crate) fn rearm_bootstrap(&self) {
        let _guard = self.lock();
        let armed = self.bootstrap.read().is_some();
        self.needs_bootstrap.store(armed, Ordering::Release);
    }

    pub(crate) fn needs_bootstrap(&self) -> bool {
        self.needs_bootstrap.load(Ordering::Acquire)
    }

    /// Run the armed hook under the lock; later calls do nothing until the
    /// hook is armed again. Resolutions made by the hook itself pass straight
    /// through.
    pub(crate) fn bootstrap(&self) {
        let _guard = self.lock();
        if !self.needs_bootstrap.swap(false, Ordering::AcqRel) {
            return;
        }

        let hook = self.bootstrap.read().clone();
        if let Some(hook) = hook {
            #[cfg(feature = "logging")]
            debug!(target: "dependency_resolver", "Running bootstrap");

            hook();
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    #[inline]
    pub(crate) fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub(crate) fn default_scope(&self) -> ScopeKind {
        *self.default_scope.read()
    }

    pub(crate) fn set_default_scope(&self, kind: ScopeKind) {
        *self.default_scope.write() = kind;
    }
}

// =============================================================================
// Container
// =============================================================================

/// Registry of construction recipes with scoped instance caching.
///
/// Cloning a `Container` yields another handle to the same registrations.
/// Containers created with [`sibling`](Self::sibling) share the resolution
/// lock and scope caches; composition with [`add_child`](Self::add_child)
/// is meant for containers of the same context.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Container, ScopeKind};
///
/// struct Database { url: String }
/// struct UserService { db: std::sync::Arc<Database> }
///
/// let container = Container::new();
/// container
///     .register(|_, _| Some(Database { url: "postgres://localhost".into() }))
///     .scope(ScopeKind::Application);
/// container.register(|c, _| Some(UserService { db: c.optional()? }));
///
/// let users = container.resolve::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    /// Registration records owned by this container
    storage: Arc<ServiceStorage>,
    /// Containers searched, in order, when a key is not registered locally
    children: Arc<RwLock<Vec<Container>>>,
    /// Store for registrations scoped to the resolving container
    cache: Arc<CachedScope>,
    context: Arc<Context>,
}

impl Container {
    /// Create a new container with its own lock and scope caches.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dependency_resolver::Container;
    /// let container = Container::new();
    /// assert!(container.is_empty());
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::with_context(Arc::new(Context::new(ScopeKind::default())), 0)
    }

    /// Create a container with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_context(Arc::new(Context::new(ScopeKind::default())), capacity)
    }

    pub(crate) fn with_context(context: Arc<Context>, capacity: usize) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            capacity = capacity,
            "Creating new container"
        );

        Self {
            storage: Arc::new(ServiceStorage::with_capacity(capacity)),
            children: Arc::new(RwLock::new(Vec::new())),
            cache: Arc::new(CachedScope::new("container")),
            context,
        }
    }

    /// Create an empty container sharing this container's lock, scope
    /// caches and default scope.
    ///
    /// Use it to build containers that will be composed with
    /// [`add_child`](Self::add_child).
    #[inline]
    pub fn sibling(&self) -> Self {
        Self::with_context(Arc::clone(&self.context), 0)
    }

    /// Append `child` to the containers searched when a key is missing here.
    ///
    /// Children are searched in the order they were added, depth-first.
    /// Local registrations always take precedence, which lets a specific
    /// container override a general one without touching it.
    ///
    /// The hierarchy must stay a tree: adding a container to its own
    /// descendants makes lookups recurse forever.
    ///
    /// # Panics
    ///
    /// Panics if `child` belongs to another context (it was not created with
    /// [`sibling`](Self::sibling) or
    /// [`Registry::container`](crate::Registry::container) from this one):
    /// its records would then be resolved under two different locks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dependency_resolver::Container;
    ///
    /// struct Endpoint(&'static str);
    ///
    /// let general = Container::new();
    /// general.register(|_, _| Some(Endpoint("https://api.example.com")));
    ///
    /// let testing = general.sibling();
    /// testing.add_child(general.clone());
    /// assert_eq!(testing.resolve::<Endpoint>().unwrap().0, "https://api.example.com");
    ///
    /// testing.register(|_, _| Some(Endpoint("http://localhost:8080")));
    /// assert_eq!(testing.resolve::<Endpoint>().unwrap().0, "http://localhost:8080");
    /// assert_eq!(general.resolve::<Endpoint>().unwrap().0, "https://api.example.com");
    /// ```
    pub fn add_child(&self, child: Container) {
        assert!(
            self.same_context(&child),
            "Cannot add child container: it belongs to a different resolution context"
        );

        let _guard = self.lock();
        let mut children = self.children.write();
        children.push(child);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            child_count = children.len(),
            "Added child container"
        );
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register a factory for `T` under the nameless key.
    ///
    /// The factory receives the resolving container and the call's
    /// arguments; returning `None` declines construction. The record is
    /// governed by the default scope until configured otherwise through the
    /// returned handle. Registering the same key again replaces the record.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dependency_resolver::Container;
    ///
    /// let container = Container::new();
    /// container.register(|_, _| Some(String::from("Fred")));
    /// container.register(|_, _| Some(String::from("Barney")));
    ///
    /// assert_eq!(*container.optional::<String>().unwrap(), "Barney");
    /// ```
    #[inline]
    pub fn register<T, F>(&self, factory: F) -> RegistrationHandle<T>
    where
        T: Injectable,
        F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
    {
        self.insert(None, factory::from_value(factory))
    }

    /// Register a factory for `T` under `name`.
    #[inline]
    pub fn register_named<T, F>(&self, name: impl Into<Name>, factory: F) -> RegistrationHandle<T>
    where
        T: Injectable,
        F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
    {
        self.insert(Some(name.into()), factory::from_value(factory))
    }

    /// Register a factory that returns `Arc<T>` directly.
    ///
    /// This is the only way to register unsized targets such as trait
    /// objects, and lets a factory hand out instances it already shares.
    #[inline]
    pub fn register_arc<T, F>(&self, name: Option<Name>, factory: F) -> RegistrationHandle<T>
    where
        T: ?Sized + Injectable,
        F: Fn(&Container, &Args) -> Option<Arc<T>> + Send + Sync + 'static,
    {
        self.insert(name, factory::from_arc(factory))
    }

    /// Register a pre-built instance; every resolution returns it.
    #[inline]
    pub fn register_instance<T: Injectable>(&self, instance: T) -> RegistrationHandle<T> {
        self.insert(None, factory::from_instance(Arc::new(instance)))
    }

    fn insert<T: ?Sized + Injectable>(&self, name: Option<Name>, factory: factory::FactoryFn<T>) -> RegistrationHandle<T> {
        let _guard = self.lock();

        let kind = self.context.default_scope();
        let key = ServiceKey::of::<T>(name);
        let registration = Arc::new(Registration::new(key, factory, self.context.scopes().get(kind)));

        let _replaced = self.storage.insert(Arc::clone(&registration));

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            service = %registration.key(),
            scope = kind.as_str(),
            replaced = _replaced,
            service_count = self.storage.len(),
            "Registering service"
        );

        RegistrationHandle::new(registration, self.clone())
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve the nameless registration for `T`.
    ///
    /// Fails with [`DiError::NotFound`] when nothing is registered for `T`
    /// here or in any child, and with [`DiError::Declined`] when the factory
    /// produced no instance.
    #[inline]
    pub fn resolve<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.resolve_with(None, &Args::default())
    }

    /// Resolve the registration for `T` under `name`.
    #[inline]
    pub fn resolve_named<T: ?Sized + Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_with(Some(name), &Args::default())
    }

    /// Resolve the nameless registration for `T`, passing `args` to factories.
    #[inline]
    pub fn resolve_args<T: ?Sized + Injectable>(&self, args: &Args) -> Result<Arc<T>> {
        self.resolve_with(None, args)
    }

    /// Resolve `T` under an optional name with arguments.
    ///
    /// This is the full resolution algorithm every other entry point uses.
    pub fn resolve_with<T: ?Sized + Injectable>(&self, name: Option<&str>, args: &Args) -> Result<Arc<T>> {
        let _guard = self.lock();
        self.context.bootstrap();

        let Some(registration) = self.lookup::<T>(name) else {
            #[cfg(feature = "logging")]
            debug!(
                target: "dependency_resolver",
                service = std::any::type_name::<T>(),
                name = name,
                "Service not registered in container or children"
            );
            return Err(DiError::not_found::<T>(name));
        };

        match registration.resolve(self, args) {
            Some(instance) => Ok(instance),
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    service = %registration.key(),
                    "Factory produced no instance"
                );
                Err(DiError::declined::<T>(name))
            }
        }
    }

    /// Resolve the nameless registration for `T`, or `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dependency_resolver::Container;
    ///
    /// struct NeverRegistered;
    ///
    /// let container = Container::new();
    /// assert!(container.optional::<NeverRegistered>().is_none());
    /// assert!(container.resolve::<NeverRegistered>().is_err());
    /// ```
    #[inline]
    pub fn optional<T: ?Sized + Injectable>(&self) -> Option<Arc<T>> {
        self.resolve_with(None, &Args::default()).ok()
    }

    /// Resolve `T` under `name`, or `None`.
    #[inline]
    pub fn optional_named<T: ?Sized + Injectable>(&self, name: &str) -> Option<Arc<T>> {
        self.resolve_with(Some(name), &Args::default()).ok()
    }

    /// Resolve the nameless registration for `T` with arguments, or `None`.
    #[inline]
    pub fn optional_args<T: ?Sized + Injectable>(&self, args: &Args) -> Option<Arc<T>> {
        self.resolve_with(None, args).ok()
    }

    /// Resolve `T` under an optional name with arguments, or `None`.
    #[inline]
    pub fn optional_with<T: ?Sized + Injectable>(&self, name: Option<&str>, args: &Args) -> Option<Arc<T>> {
        self.resolve_with(name, args).ok()
    }

    /// Find the record for `T` here, then in each child depth-first.
    pub fn lookup<T: ?Sized + Injectable>(&self, name: Option<&str>) -> Option<Arc<Registration<T>>> {
        if let Some(registration) = self.storage.get::<T>(name) {
            return Some(registration);
        }

        let children = self.children.read().clone();
        let found = children.iter().find_map(|child| child.lookup::<T>(name));

        #[cfg(feature = "logging")]
        if found.is_some() {
            trace!(
                target: "dependency_resolver",
                service = std::any::type_name::<T>(),
                name = name,
                "Registration found in child container"
            );
        }

        found
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Check if a nameless registration for `T` exists here or in children.
    #[inline]
    pub fn contains<T: ?Sized + Injectable>(&self) -> bool {
        self.contains_key(&TypeId::of::<T>(), None)
    }

    /// Check if a registration for `T` under `name` exists here or in children.
    #[inline]
    pub fn contains_named<T: ?Sized + Injectable>(&self, name: &str) -> bool {
        self.contains_key(&TypeId::of::<T>(), Some(name))
    }

    fn contains_key(&self, type_id: &TypeId, name: Option<&str>) -> bool {
        self.storage.contains(type_id, name)
            || self
                .children
                .read()
                .iter()
                .any(|child| child.contains_key(type_id, name))
    }

    /// Number of registrations in this container (not including children).
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if this container has no local registrations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Keys registered locally, in no particular order.
    pub fn registered_keys(&self) -> Vec<ServiceKey> {
        self.storage.keys()
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    // =========================================================================
    // Scope Configuration
    // =========================================================================

    /// Built-in scope instances shared by this container's context.
    #[inline]
    pub fn scopes(&self) -> &Scopes {
        self.context.scopes()
    }

    /// Scope assigned to new registrations in this context.
    #[inline]
    pub fn default_scope(&self) -> ScopeKind {
        self.context.default_scope()
    }

    /// Change the scope assigned to registrations made from now on, in every
    /// container of this context. Existing records keep their scope.
    pub fn set_default_scope(&self, kind: ScopeKind) {
        let _guard = self.lock();
        self.context.set_default_scope(kind);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            scope = kind.as_str(),
            "Default scope changed"
        );
    }

    /// Drop every instance cached under [`ScopeKind::Container`] in this container.
    pub fn reset_cache(&self) {
        let _guard = self.lock();
        self.cache.reset();
    }

    /// Whether `self` and `other` are handles to the same container.
    #[inline]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Whether `self` and `other` share a lock and scope caches, so that
    /// one can be composed into the other.
    #[inline]
    pub fn same_context(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }

    #[inline]
    pub(crate) fn cache(&self) -> &CachedScope {
        &self.cache
    }

    #[inline]
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.context.lock()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .field("child_count", &self.child_count())
            .field("default_scope", &self.default_scope())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    #[derive(Debug)]
    struct AnotherService {
        name: String,
    }

    fn test_service(value: &str) -> Option<TestService> {
        Some(TestService { value: value.into() })
    }

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.register(|_, _| test_service("test"));

        let service = container.resolve::<TestService>().unwrap();
        assert_eq!(service.value, "test");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_register_instance() {
        let container = Container::new();
        container.register_instance(TestService { value: "fixed".into() });

        let a = container.resolve::<TestService>().unwrap();
        let b = container.resolve::<TestService>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_not_found_vs_declined() {
        let container = Container::new();
        container.register_named::<TestService, _>("broken", |_, _| None);

        assert!(matches!(
            container.resolve::<TestService>(),
            Err(DiError::NotFound { .. })
        ));
        let err = container.resolve_named::<TestService>("broken").unwrap_err();
        assert!(matches!(err, DiError::Declined { .. }));
        assert_eq!(err.name().map(Name::as_str), Some("broken"));
        assert!(container.optional_named::<TestService>("broken").is_none());
    }

    #[test]
    fn test_children_searched_in_order() {
        let root = Container::new();
        let first = root.sibling();
        let second = root.sibling();
        first.register(|_, _| test_service("first"));
        second.register(|_, _| test_service("second"));
        second.register(|_, _| Some(AnotherService { name: "only-second".into() }));
        root.add_child(first);
        root.add_child(second);

        assert_eq!(root.resolve::<TestService>().unwrap().value, "first");
        assert_eq!(root.resolve::<AnotherService>().unwrap().name, "only-second");
        assert!(root.contains::<AnotherService>());
        assert_eq!(root.child_count(), 2);
        assert!(root.is_empty());
    }

    #[test]
    fn test_grandchild_lookup() {
        let root = Container::new();
        let middle = root.sibling();
        let leaf = root.sibling();
        leaf.register_named("deep", |_, _| test_service("leaf"));
        middle.add_child(leaf);
        root.add_child(middle);

        assert!(root.contains_named::<TestService>("deep"));
        assert!(!root.contains::<TestService>());
        assert_eq!(root.resolve_named::<TestService>("deep").unwrap().value, "leaf");
    }

    #[test]
    fn test_child_factory_resolves_through_resolving_container() {
        // A record found in a child still receives the container that was asked
        let root = Container::new();
        let child = root.sibling();
        child.register(|c, _| {
            let dep = c.optional::<AnotherService>()?;
            test_service(&dep.name)
        });
        root.register(|_, _| Some(AnotherService { name: "from-root".into() }));
        root.add_child(child.clone());

        assert_eq!(root.resolve::<TestService>().unwrap().value, "from-root");
        assert!(child.optional::<TestService>().is_none());
    }

    #[test]
    fn test_default_scope_applies_to_new_registrations() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        struct Counted(#[allow(dead_code)] u32);

        let container = Container::new();
        assert_eq!(container.default_scope(), ScopeKind::Graph);
        container.set_default_scope(ScopeKind::Application);
        container.register(|_, _| Some(Counted(COUNTER.fetch_add(1, Ordering::SeqCst))));

        let sibling = container.sibling();
        assert_eq!(sibling.default_scope(), ScopeKind::Application);

        let a = container.resolve::<Counted>().unwrap();
        let b = container.resolve::<Counted>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registered_keys() {
        let container = Container::new();
        container.register(|_, _| test_service("a"));
        container.register_named("b", |_, _| test_service("b"));

        let mut keys: Vec<String> = container.registered_keys().iter().map(|k| k.to_string()).collect();
        keys.sort();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().any(|k| k.ends_with(":b")));
        assert!(keys.iter().any(|k| k.ends_with(":NONAME")));
    }

    #[test]
    fn test_concurrent_resolution() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container
            .register(|c, _| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                let dep = c.optional::<AnotherService>()?;
                test_service(&dep.name)
            })
            .scope(ScopeKind::Application);
        container.register(|_, _| Some(AnotherService { name: "dep".into() }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| container.resolve::<TestService>().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Arc<TestService>> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        // Serialized resolution: the application scope builds exactly once
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|s| Arc::ptr_eq(s, &results[0])));
        assert_eq!(container.scopes().graph.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "different resolution context")]
    fn test_add_child_rejects_foreign_context() {
        let general = Container::new();
        let specific = Container::new();
        specific.add_child(general);
    }

    #[test]
    fn test_composed_containers_build_application_instance_once() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let general = Container::new();
        general
            .register(|_, _| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(50));
                test_service("slow")
            })
            .scope(ScopeKind::Application);
        let specific = general.sibling();
        specific.add_child(general.clone());
        assert!(specific.same_context(&general));

        let handles: Vec<_> = [general, specific]
            .into_iter()
            .map(|container| thread::spawn(move || container.resolve::<TestService>().unwrap()))
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&results[0], &results[1]));
    }

    #[test]
    fn test_ptr_eq() {
        let container = Container::new();
        let handle = container.clone();
        assert!(container.ptr_eq(&handle));
        assert!(!container.ptr_eq(&container.sibling()));
    }
}
