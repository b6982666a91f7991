//! Factory shapes for creating service instances
//!
//! Every registration holds exactly one factory of the unified shape
//! `(container, args) -> Option<Arc<T>>`. Returning `None` means
//! "construction declined" and propagates as an empty resolution result;
//! wrappers added through configuration keep that contract.

use crate::{Args, Container, Injectable};
use std::sync::Arc;

/// Shared, type-erased construction function for `T`
pub type FactoryFn<T> = Arc<dyn Fn(&Container, &Args) -> Option<Arc<T>> + Send + Sync>;

/// Adapt a value-producing closure to the unified factory shape
#[inline]
pub(crate) fn from_value<T, F>(factory: F) -> FactoryFn<T>
where
    T: Injectable,
    F: Fn(&Container, &Args) -> Option<T> + Send + Sync + 'static,
{
    Arc::new(move |container: &Container, args: &Args| factory(container, args).map(Arc::new))
}

/// Adapt an `Arc`-producing closure, usable for unsized targets
#[inline]
pub(crate) fn from_arc<T, F>(factory: F) -> FactoryFn<T>
where
    T: ?Sized + Injectable,
    F: Fn(&Container, &Args) -> Option<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Factory that always hands back the same pre-built instance
#[inline]
pub(crate) fn from_instance<T: ?Sized + Injectable>(instance: Arc<T>) -> FactoryFn<T> {
    Arc::new(move |_: &Container, _: &Args| Some(Arc::clone(&instance)))
}

/// Wrap `inner` so that `step` runs on every freshly built instance.
///
/// The step needs exclusive access; when the inner factory hands back an
/// instance that is already shared elsewhere the step is skipped.
pub(crate) fn with_property_step<T, S>(inner: FactoryFn<T>, step: S) -> FactoryFn<T>
where
    T: ?Sized + Injectable,
    S: Fn(&Container, &Args, &mut T) + Send + Sync + 'static,
{
    Arc::new(move |container: &Container, args: &Args| {
        let mut instance = inner(container, args)?;
        match Arc::get_mut(&mut instance) {
            Some(value) => step(container, args, value),
            None => {
                #[cfg(feature = "logging")]
                tracing::warn!(
                    target: "dependency_resolver",
                    service = std::any::type_name::<T>(),
                    "Skipping property step: factory returned a shared instance"
                );
            }
        }
        Some(instance)
    })
}
