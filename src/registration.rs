//! Registration records
//!
//! A [`Registration`] ties a [`ServiceKey`] to a factory and the scope that
//! governs reuse of what the factory builds. It is created by a container's
//! `register*` call and configured through the returned
//! [`RegistrationHandle`] before anything resolves it.

use crate::factory::{self, FactoryFn};
use crate::{Args, Container, Injectable, Name, Scope, ScopeKind, ServiceKey};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Stored recipe for one resolvable type and name.
pub struct Registration<T: ?Sized> {
    key: ServiceKey,
    factory: RwLock<FactoryFn<T>>,
    scope: RwLock<Scope>,
    /// Set on first resolution; the scope is frozen from then on
    resolved: AtomicBool,
}

impl<T: ?Sized + Injectable> Registration<T> {
    pub(crate) fn new(key: ServiceKey, factory: FactoryFn<T>, scope: Scope) -> Self {
        Self {
            key,
            factory: RwLock::new(factory),
            scope: RwLock::new(scope),
            resolved: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Key under which scope stores keep this registration's instances
    #[inline]
    pub fn cache_key(&self) -> &ServiceKey {
        &self.key
    }

    /// Scope currently governing this registration
    pub fn scope(&self) -> Scope {
        self.scope.read().clone()
    }

    /// Whether any resolution has gone through this registration yet
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Run the factory, bypassing every cache.
    pub fn instantiate(&self, container: &Container, args: &Args) -> Option<Arc<T>> {
        let factory = Arc::clone(&*self.factory.read());
        factory(container, args)
    }

    /// Produce an instance through this registration's scope.
    ///
    /// Holds the container's resolution lock for the duration.
    pub fn resolve(&self, container: &Container, args: &Args) -> Option<Arc<T>> {
        let _guard = container.lock();
        self.resolved.store(true, Ordering::Release);
        let scope = self.scope();
        scope.resolve(self, container, args)
    }

    /// Replace the factory with one built around the existing factory.
    ///
    /// Wrappers must return `None` whenever the inner factory does.
    /// `wrap` runs with no lock on this record held, so it may call
    /// [`instantiate`](Self::instantiate). Containers serialize concurrent
    /// updates through their resolution lock.
    pub fn update<W>(&self, wrap: W)
    where
        W: FnOnce(FactoryFn<T>) -> FactoryFn<T>,
    {
        let existing = Arc::clone(&*self.factory.read());
        let wrapped = wrap(existing);
        *self.factory.write() = wrapped;
    }

    /// Change the governing scope.
    ///
    /// # Panics
    ///
    /// Panics if the registration has already been resolved: instances
    /// cached under the old scope are not migrated.
    pub fn set_scope(&self, scope: Scope) {
        if self.is_resolved() {
            panic!("Cannot change scope of {}: registration has already been resolved", self.key);
        }
        *self.scope.write() = scope;
    }
}

impl<T: ?Sized> std::fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("scope", &self.scope.read().label())
            .field("resolved", &self.resolved.load(Ordering::Relaxed))
            .finish()
    }
}

/// Chained configuration for a freshly registered service.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Container, ScopeKind};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English { name: String }
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         format!("Hello, {}", self.name)
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(|_, _| Some(English { name: String::new() }))
///     .scope(ScopeKind::Application)
///     .resolve_properties(|_, _, english| english.name = "Fred".into())
///     .implements::<dyn Greeter>(|english| english);
///
/// let greeter = container.resolve::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "Hello, Fred");
/// ```
pub struct RegistrationHandle<T: ?Sized> {
    registration: Arc<Registration<T>>,
    container: Container,
}

impl<T: ?Sized + Injectable> RegistrationHandle<T> {
    pub(crate) fn new(registration: Arc<Registration<T>>, container: Container) -> Self {
        Self {
            registration,
            container,
        }
    }

    /// Govern this registration with one of the built-in scopes.
    pub fn scope(self, kind: ScopeKind) -> Self {
        let scope = self.container.scopes().get(kind);
        self.custom_scope(scope)
    }

    /// Govern this registration with a specific scope instance.
    pub fn custom_scope(self, scope: Scope) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            service = %self.registration.key(),
            scope = scope.label(),
            "Setting registration scope"
        );

        self.registration.set_scope(scope);
        self
    }

    /// Append a step that adjusts every freshly built instance.
    ///
    /// Steps run in the order they were added, after the factory returns.
    /// A step is skipped, with a warning, when the factory hands back an
    /// instance that is already shared.
    pub fn resolve_properties<S>(self, step: S) -> Self
    where
        S: Fn(&Container, &Args, &mut T) + Send + Sync + 'static,
    {
        {
            let _guard = self.container.lock();
            self.registration
                .update(|inner| factory::with_property_step(inner, step));
        }
        self
    }

    /// Also expose this service under the nameless key for `P`.
    ///
    /// `convert` performs the upcast, typically `|service| service` with
    /// `P = dyn Trait`. Resolving `P` resolves this registration through the
    /// same container, so both keys share whatever instance this
    /// registration's scope has stored.
    pub fn implements<P>(self, convert: impl Fn(Arc<T>) -> Arc<P> + Send + Sync + 'static) -> Self
    where
        P: ?Sized + Injectable,
    {
        self.expose(None, convert)
    }

    /// Like [`implements`](Self::implements), under a named key for `P`.
    pub fn implements_named<P>(
        self,
        name: impl Into<Name>,
        convert: impl Fn(Arc<T>) -> Arc<P> + Send + Sync + 'static,
    ) -> Self
    where
        P: ?Sized + Injectable,
    {
        self.expose(Some(name.into()), convert)
    }

    fn expose<P, C>(self, name: Option<Name>, convert: C) -> Self
    where
        P: ?Sized + Injectable,
        C: Fn(Arc<T>) -> Arc<P> + Send + Sync + 'static,
    {
        let target = self.registration.key().clone();
        self.container.register_arc::<P, _>(name, move |container: &Container, args: &Args| {
            container
                .optional_with::<T>(target.name_str(), args)
                .map(&convert)
        });
        self
    }

    /// Wrap the factory; see [`Registration::update`].
    pub fn update<W>(self, wrap: W) -> Self
    where
        W: FnOnce(FactoryFn<T>) -> FactoryFn<T>,
    {
        {
            let _guard = self.container.lock();
            self.registration.update(wrap);
        }
        self
    }

    #[inline]
    pub fn key(&self) -> &ServiceKey {
        self.registration.key()
    }

    #[inline]
    pub fn registration(&self) -> &Arc<Registration<T>> {
        &self.registration
    }
}

impl<T: ?Sized> std::fmt::Debug for RegistrationHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("registration", &self.registration)
            .finish()
    }
}
