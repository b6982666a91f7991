//! Registration storage for a container
//!
//! Uses DashMap with ahash, one map for nameless registrations keyed by
//! `TypeId` and one for named registrations keyed by `TypeId` then name.

use crate::Injectable;
use crate::key::{Name, ServiceKey};
use crate::registration::Registration;
use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A stored registration: its key plus the type-erased `Registration<T>`
#[derive(Clone)]
struct Entry {
    key: ServiceKey,
    registration: Arc<dyn Any + Send + Sync>,
}

/// Thread-safe storage for registration records
pub(crate) struct ServiceStorage {
    unnamed: DashMap<TypeId, Entry, RandomState>,
    named: DashMap<TypeId, HashMap<Name, Entry, RandomState>, RandomState>,
}

impl ServiceStorage {
    /// Create new empty storage.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity for nameless registrations.
    ///
    /// Uses 8 shards for typical registries; DashMap's default of
    /// `num_cpus * 4` makes container creation needlessly expensive.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 64 { 8 } else { 16 };
        Self {
            unnamed: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            named: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Insert a registration, replacing any previous one for the same key.
    ///
    /// Returns `true` if a previous registration was replaced.
    pub fn insert<T: ?Sized + Injectable>(&self, registration: Arc<Registration<T>>) -> bool {
        let key = registration.key().clone();
        let type_id = key.type_id();
        let name = key.name().cloned();
        let entry = Entry {
            key,
            registration,
        };
        match name {
            None => self.unnamed.insert(type_id, entry).is_some(),
            Some(name) => self
                .named
                .entry(type_id)
                .or_default()
                .insert(name, entry)
                .is_some(),
        }
    }

    /// Look up the registration for `T` under an optional name
    pub fn get<T: ?Sized + Injectable>(&self, name: Option<&str>) -> Option<Arc<Registration<T>>> {
        let type_id = TypeId::of::<T>();
        let registration = match name {
            None => self
                .unnamed
                .get(&type_id)
                .map(|entry| Arc::clone(&entry.registration)),
            Some(name) => self
                .named
                .get(&type_id)
                .and_then(|names| names.get(name).map(|entry| Arc::clone(&entry.registration))),
        }?;
        // Keyed by TypeId::of::<T>(), so this only fails on a TypeId collision
        registration.downcast::<Registration<T>>().ok()
    }

    /// Check if a key is registered
    pub fn contains(&self, type_id: &TypeId, name: Option<&str>) -> bool {
        match name {
            None => self.unnamed.contains_key(type_id),
            Some(name) => self
                .named
                .get(type_id)
                .is_some_and(|names| names.contains_key(name)),
        }
    }

    /// Get number of registrations
    pub fn len(&self) -> usize {
        self.unnamed.len() + self.named.iter().map(|names| names.len()).sum::<usize>()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every stored registration, in no particular order
    pub fn keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self.unnamed.iter().map(|entry| entry.key.clone()).collect();
        for names in self.named.iter() {
            keys.extend(names.values().map(|entry| entry.key.clone()));
        }
        keys
    }
}

impl Default for ServiceStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FactoryFn;
    use crate::{Args, Container, Scope};

    struct TestService {
        value: i32,
    }

    fn registration(name: Option<&str>, value: i32) -> Arc<Registration<TestService>> {
        let factory: FactoryFn<TestService> =
            Arc::new(move |_: &Container, _: &Args| Some(Arc::new(TestService { value })));
        Arc::new(Registration::new(
            ServiceKey::of::<TestService>(name.map(Name::from)),
            factory,
            Scope::Unique,
        ))
    }

    #[test]
    fn test_storage_insert_and_get() {
        let storage = ServiceStorage::new();
        assert!(!storage.insert(registration(None, 42)));

        let container = Container::new();
        let found = storage.get::<TestService>(None).unwrap();
        let service = found.instantiate(&container, &Args::new()).unwrap();
        assert_eq!(service.value, 42);
        assert!(storage.get::<i32>(None).is_none());
    }

    #[test]
    fn test_named_slots_are_independent() {
        let storage = ServiceStorage::new();
        storage.insert(registration(None, 0));
        storage.insert(registration(Some("Fred"), 1));
        storage.insert(registration(Some("Barney"), 2));

        let type_id = TypeId::of::<TestService>();
        assert!(storage.contains(&type_id, None));
        assert!(storage.contains(&type_id, Some("Fred")));
        assert!(!storage.contains(&type_id, Some("Wilma")));
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.keys().len(), 3);
    }

    #[test]
    fn test_insert_replaces() {
        let storage = ServiceStorage::new();
        storage.insert(registration(Some("Fred"), 1));
        assert!(storage.insert(registration(Some("Fred"), 2)));
        assert_eq!(storage.len(), 1);

        let container = Container::new();
        let found = storage.get::<TestService>(Some("Fred")).unwrap();
        assert_eq!(found.instantiate(&container, &Args::new()).unwrap().value, 2);
    }
}
