//! Process-wide registry
//!
//! One lazily created [`Registry`] for applications that want a single
//! well-known entry point instead of threading a registry through start-up.
//! Libraries should take a [`Registry`] or [`Container`](crate::Container)
//! parameter instead.
//!
//! ```rust
//! use dependency_resolver::global;
//!
//! struct Clock(&'static str);
//!
//! global::register(|_, _| Some(Clock("utc")));
//! assert_eq!(global::resolve::<Clock>().unwrap().0, "utc");
//! global::reset();
//! assert!(global::optional::<Clock>().is_none());
//! ```

use crate::registration::RegistrationHandle;
use crate::{Args, Container, Injectable, Name, Registry, Result};
use once_cell::sync::Lazy;
use std::sync::Arc;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide registry, created on first use.
#[inline]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn register<T, F>(factory: F) -> RegistrationHandle<T>
where
    T: Injectable,
    F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
{
    registry().register(factory)
}

pub fn register_named<T, F>(name: impl Into<Name>, factory: F) -> RegistrationHandle<T>
where
    T: Injectable,
    F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
{
    registry().register_named(name, factory)
}

pub fn resolve<T: ?Sized + Injectable>() -> Result<Arc<T>> {
    registry().resolve()
}

pub fn resolve_named<T: ?Sized + Injectable>(name: &str) -> Result<Arc<T>> {
    registry().resolve_named(name)
}

pub fn optional<T: ?Sized + Injectable>() -> Option<Arc<T>> {
    registry().optional()
}

pub fn optional_named<T: ?Sized + Injectable>(name: &str) -> Option<Arc<T>> {
    registry().optional_named(name)
}

/// See [`Registry::set_bootstrap`].
pub fn set_bootstrap<F>(bootstrap: F)
where
    F: Fn(&Registry) + Send + Sync + 'static,
{
    registry().set_bootstrap(bootstrap)
}

/// See [`Registry::reset`].
pub fn reset() {
    registry().reset()
}
