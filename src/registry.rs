//! Process entry point
//!
//! A [`Registry`] owns one resolution context and two containers: `main`,
//! where applications register, and `root`, where resolution starts. Both
//! are the same container until [`Registry::set_root`] installs another one,
//! typically a test container that has `main` as a child.

use crate::container::{Container, Context};
use crate::registration::RegistrationHandle;
use crate::{Args, Injectable, Name, Result, ScopeKind, Scopes};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::debug;

/// One-time registration routine run before the first resolution
pub type BootstrapFn = Arc<dyn Fn(&Registry) + Send + Sync>;

struct RegistryState {
    context: Arc<Context>,
    main: RwLock<Container>,
    root: RwLock<Container>,
    capacity: usize,
}

/// Explicitly owned registry with an optional bootstrap gate.
///
/// The bootstrap routine runs once, under the resolution lock, before the
/// first resolution made through any container of this registry: the
/// registry itself, [`main`](Self::main), [`root`](Self::root) or a
/// container from [`container`](Self::container). Cloning yields another
/// handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Registry, ScopeKind};
///
/// struct Config { port: u16 }
///
/// let registry = Registry::builder()
///     .default_scope(ScopeKind::Application)
///     .bootstrap(|registry| {
///         registry.register(|_, _| Some(Config { port: 8080 }));
///     })
///     .build();
///
/// // The bootstrap runs on first resolution
/// assert_eq!(registry.main().resolve::<Config>().unwrap().port, 8080);
/// ```
#[derive(Clone)]
pub struct Registry {
    state: Arc<RegistryState>,
}

impl Registry {
    /// Create a registry with the default configuration.
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Container that receives registrations.
    pub fn main(&self) -> Container {
        self.state.main.read().clone()
    }

    /// Container where resolution starts.
    pub fn root(&self) -> Container {
        self.state.root.read().clone()
    }

    /// Make `container` the resolution entry point.
    ///
    /// # Panics
    ///
    /// Panics if `container` was not created by [`Registry::container`] (or
    /// as a sibling of one), since it would resolve under another lock.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dependency_resolver::Registry;
    ///
    /// struct Mailer(&'static str);
    ///
    /// let registry = Registry::new();
    /// registry.register(|_, _| Some(Mailer("smtp")));
    ///
    /// let mocks = registry.container();
    /// mocks.register(|_, _| Some(Mailer("mock")));
    /// mocks.add_child(registry.main());
    /// registry.set_root(mocks);
    ///
    /// assert_eq!(registry.resolve::<Mailer>().unwrap().0, "mock");
    /// ```
    pub fn set_root(&self, container: Container) {
        assert!(
            container.same_context(&self.main()),
            "Cannot set root container: it belongs to a different resolution context"
        );

        let _guard = self.state.context.lock();
        *self.state.root.write() = container;

        #[cfg(feature = "logging")]
        debug!(target: "dependency_resolver", "Root container replaced");
    }

    /// New empty container sharing this registry's context.
    pub fn container(&self) -> Container {
        Container::with_context(Arc::clone(&self.state.context), self.state.capacity)
    }

    /// Built-in scope instances of this registry.
    pub fn scopes(&self) -> &Scopes {
        self.state.context.scopes()
    }

    pub fn default_scope(&self) -> ScopeKind {
        self.state.context.default_scope()
    }

    /// Change the scope assigned to registrations made from now on.
    pub fn set_default_scope(&self, kind: ScopeKind) {
        self.main().set_default_scope(kind);
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Install the bootstrap routine and arm it to run before the next
    /// resolution.
    pub fn set_bootstrap<F>(&self, bootstrap: F)
    where
        F: Fn(&Registry) + Send + Sync + 'static,
    {
        self.install_bootstrap(Arc::new(bootstrap));
    }

    fn install_bootstrap(&self, bootstrap: BootstrapFn) {
        // Held weakly: the state owns the context that stores this hook
        let state: Weak<RegistryState> = Arc::downgrade(&self.state);
        self.state.context.set_bootstrap(Arc::new(move || {
            if let Some(state) = state.upgrade() {
                bootstrap(&Registry { state });
            }
        }));
    }

    /// Run the bootstrap routine now if it has not run since the last
    /// arming. Does nothing otherwise.
    pub fn bootstrap(&self) {
        self.state.context.bootstrap();
    }

    /// Whether the bootstrap routine is armed and has not run yet
    pub fn needs_bootstrap(&self) -> bool {
        self.state.context.needs_bootstrap()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register on [`main`](Self::main); see [`Container::register`].
    pub fn register<T, F>(&self, factory: F) -> RegistrationHandle<T>
    where
        T: Injectable,
        F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
    {
        self.main().register(factory)
    }

    pub fn register_named<T, F>(&self, name: impl Into<Name>, factory: F) -> RegistrationHandle<T>
    where
        T: Injectable,
        F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
    {
        self.main().register_named(name, factory)
    }

    pub fn register_arc<T, F>(&self, name: Option<Name>, factory: F) -> RegistrationHandle<T>
    where
        T: ?Sized + Injectable,
        F: Fn(&Container, &Args) -> Option<Arc<T>> + Send + Sync + 'static,
    {
        self.main().register_arc(name, factory)
    }

    pub fn register_instance<T: Injectable>(&self, instance: T) -> RegistrationHandle<T> {
        self.main().register_instance(instance)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve from [`root`](Self::root).
    pub fn resolve_with<T: ?Sized + Injectable>(&self, name: Option<&str>, args: &Args) -> Result<Arc<T>> {
        let _guard = self.state.context.lock();
        // Bootstrap first: it may register into `main` or replace `root`
        self.bootstrap();
        self.root().resolve_with(name, args)
    }

    pub fn resolve<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.resolve_with(None, &Args::default())
    }

    pub fn resolve_named<T: ?Sized + Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_with(Some(name), &Args::default())
    }

    pub fn resolve_args<T: ?Sized + Injectable>(&self, args: &Args) -> Result<Arc<T>> {
        self.resolve_with(None, args)
    }

    pub fn optional<T: ?Sized + Injectable>(&self) -> Option<Arc<T>> {
        self.resolve_with(None, &Args::default()).ok()
    }

    pub fn optional_named<T: ?Sized + Injectable>(&self, name: &str) -> Option<Arc<T>> {
        self.resolve_with(Some(name), &Args::default()).ok()
    }

    pub fn optional_args<T: ?Sized + Injectable>(&self, args: &Args) -> Option<Arc<T>> {
        self.resolve_with(None, args).ok()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start over: fresh `main` and `root`, empty application, cached and
    /// shared stores, and the bootstrap armed again.
    ///
    /// Instances already handed out stay valid; they are just no longer
    /// reachable through the registry.
    pub fn reset(&self) {
        let _guard = self.state.context.lock();

        let main = self.container();
        *self.state.root.write() = main.clone();
        *self.state.main.write() = main;
        self.state.context.scopes().reset();
        self.state.context.rearm_bootstrap();

        #[cfg(feature = "logging")]
        debug!(target: "dependency_resolver", "Registry reset");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("main", &*self.state.main.read())
            .field("root", &*self.state.root.read())
            .field("needs_bootstrap", &self.needs_bootstrap())
            .finish()
    }
}

/// Builder for [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    default_scope: ScopeKind,
    bootstrap: Option<BootstrapFn>,
    capacity: usize,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope assigned to registrations that do not choose one.
    pub fn default_scope(mut self, kind: ScopeKind) -> Self {
        self.default_scope = kind;
        self
    }

    /// Routine run once, under the resolution lock, before the first
    /// resolution and again after every [`Registry::reset`].
    pub fn bootstrap<F>(mut self, bootstrap: F) -> Self
    where
        F: Fn(&Registry) + Send + Sync + 'static,
    {
        self.bootstrap = Some(Arc::new(bootstrap));
        self
    }

    /// Pre-allocated registration capacity of each container.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Registry {
        let context = Arc::new(Context::new(self.default_scope));
        let main = Container::with_context(Arc::clone(&context), self.capacity);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            default_scope = self.default_scope.as_str(),
            bootstrap = self.bootstrap.is_some(),
            "Building registry"
        );

        let registry = Registry {
            state: Arc::new(RegistryState {
                context,
                root: RwLock::new(main.clone()),
                main: RwLock::new(main),
                capacity: self.capacity,
            }),
        };
        if let Some(bootstrap) = self.bootstrap {
            registry.install_bootstrap(bootstrap);
        }
        registry
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("default_scope", &self.default_scope)
            .field("bootstrap", &self.bootstrap.is_some())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    struct Config {
        env: &'static str,
    }

    #[test]
    fn test_main_is_root_by_default() {
        let registry = Registry::new();
        assert!(registry.main().ptr_eq(&registry.root()));
        assert!(!registry.needs_bootstrap());
    }

    #[test]
    fn test_bootstrap_runs_once() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let registry = Registry::builder()
            .bootstrap(move |registry| {
                counter.fetch_add(1, Ordering::SeqCst);
                registry.register(|_, _| Some(Config { env: "prod" }));
            })
            .build();

        assert!(registry.needs_bootstrap());
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(registry.resolve::<Config>().unwrap().env, "prod");
        assert!(registry.optional::<Config>().is_some());
        registry.bootstrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bootstrap_may_resolve() {
        struct Banner(String);

        let registry = Registry::builder()
            .bootstrap(|registry| {
                registry.register(|_, _| Some(Config { env: "dev" }));
                let env = registry.resolve::<Config>().map(|c| c.env).unwrap_or("none");
                registry.register_instance(Banner(format!("running in {env}")));
            })
            .build();

        assert_eq!(registry.resolve::<Banner>().unwrap().0, "running in dev");
    }

    #[test]
    fn test_bootstrap_is_serialized_across_threads() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let registry = Arc::new(
            Registry::builder()
                .bootstrap(move |registry| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(10));
                    registry.register(|_, _| Some(Config { env: "prod" }));
                })
                .build(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.resolve::<Config>().is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bootstrap_gates_direct_container_resolution() {
        let registry = Registry::builder()
            .bootstrap(|registry| {
                registry.register(|_, _| Some(Config { env: "prod" }));
            })
            .build();

        assert_eq!(registry.main().optional::<Config>().map(|c| c.env), Some("prod"));
        assert!(!registry.needs_bootstrap());

        registry.reset();
        assert_eq!(registry.root().resolve::<Config>().unwrap().env, "prod");

        registry.reset();
        let scratch = registry.container();
        scratch.add_child(registry.main());
        assert!(scratch.optional::<Config>().is_some());
    }

    #[test]
    fn test_bootstrap_hook_does_not_keep_registry_alive() {
        let registry = Registry::builder().bootstrap(|_| {}).build();
        let state = Arc::downgrade(&registry.state);
        let main = registry.main();
        drop(registry);

        assert!(state.upgrade().is_none());
        // The orphaned context still resolves; the hook simply has nothing to run
        assert!(main.optional::<Config>().is_none());
    }

    #[test]
    #[should_panic(expected = "different resolution context")]
    fn test_set_root_rejects_foreign_container() {
        let registry = Registry::new();
        registry.set_root(crate::Container::new());
    }

    #[test]
    fn test_set_root_overrides_without_touching_main() {
        let registry = Registry::new();
        registry.register(|_, _| Some(Config { env: "prod" }));

        let mocks = registry.container();
        mocks.register(|_, _| Some(Config { env: "test" }));
        mocks.add_child(registry.main());
        registry.set_root(mocks);

        assert_eq!(registry.resolve::<Config>().unwrap().env, "test");
        assert_eq!(registry.main().resolve::<Config>().unwrap().env, "prod");
    }

    #[test]
    fn test_reset_clears_registrations_and_caches() {
        let registry = Registry::new();
        registry
            .register(|_, _| Some(Config { env: "prod" }))
            .scope(ScopeKind::Application);
        let before = registry.resolve::<Config>().unwrap();
        assert_eq!(registry.scopes().application.len(), 1);

        registry.reset();
        assert!(registry.optional::<Config>().is_none());
        assert!(registry.scopes().application.is_empty());
        assert!(registry.main().ptr_eq(&registry.root()));

        registry
            .register(|_, _| Some(Config { env: "prod" }))
            .scope(ScopeKind::Application);
        assert!(!Arc::ptr_eq(&before, &registry.resolve::<Config>().unwrap()));
    }

    #[test]
    fn test_reset_rearms_bootstrap() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let registry = Registry::builder()
            .bootstrap(move |registry| {
                counter.fetch_add(1, Ordering::SeqCst);
                registry.register(|_, _| Some(Config { env: "prod" }));
            })
            .build();

        assert!(registry.resolve::<Config>().is_ok());
        registry.reset();
        assert!(registry.needs_bootstrap());
        assert!(registry.resolve::<Config>().is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_bootstrap_arms_hook() {
        let registry = Registry::new();
        registry.set_bootstrap(|registry| {
            registry.register_named("ci", |_, _| Some(Config { env: "ci" }));
        });

        assert!(registry.needs_bootstrap());
        assert_eq!(registry.resolve_named::<Config>("ci").unwrap().env, "ci");
    }

    #[test]
    fn test_builder_configures_context() {
        let registry = Registry::builder()
            .default_scope(ScopeKind::Unique)
            .capacity(32)
            .build();
        assert_eq!(registry.default_scope(), ScopeKind::Unique);
        assert_eq!(registry.container().default_scope(), ScopeKind::Unique);

        registry.register(|_, _| Some(Config { env: "prod" }));
        let a = registry.resolve::<Config>().unwrap();
        let b = registry.resolve::<Config>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        registry.set_default_scope(ScopeKind::Cached);
        assert_eq!(registry.main().default_scope(), ScopeKind::Cached);
    }
}
