#![no_main]

//! Fuzz target for registration and resolution sequences
//!
//! Drives one container through arbitrary register/resolve/optional calls
//! across scopes and names, checking the outcomes against a shadow model of
//! which keys are registered and which factories decline. Keys that may hold
//! a cached instance from an earlier registration only check presence.

use arbitrary::Arbitrary;
use dependency_resolver::{Args, Container, DiError, ScopeKind};
use libfuzzer_sys::fuzz_target;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct Payload {
    value: u32,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzScope {
    Unique,
    Graph,
    Application,
    Cached,
    Shared,
    Container,
}

impl FuzzScope {
    fn caches(self) -> bool {
        !matches!(self, FuzzScope::Unique | FuzzScope::Graph)
    }
}

impl From<FuzzScope> for ScopeKind {
    fn from(scope: FuzzScope) -> Self {
        match scope {
            FuzzScope::Unique => ScopeKind::Unique,
            FuzzScope::Graph => ScopeKind::Graph,
            FuzzScope::Application => ScopeKind::Application,
            FuzzScope::Cached => ScopeKind::Cached,
            FuzzScope::Shared => ScopeKind::Shared,
            FuzzScope::Container => ScopeKind::Container,
        }
    }
}

#[derive(Debug, Arbitrary)]
enum ContainerOp {
    /// Register under an optional name (index into a small name table)
    Register {
        name: Option<u8>,
        value: u32,
        scope: FuzzScope,
        declines: bool,
    },
    Resolve(Option<u8>),
    Optional(Option<u8>),
    Contains(Option<u8>),
    Reset,
}

const NAMES: [&str; 4] = ["Fred", "Barney", "Wilma", "Betty"];

fn name_of(index: Option<u8>) -> Option<&'static str> {
    index.map(|i| NAMES[i as usize % NAMES.len()])
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let container = Container::new();
    // key -> (value, declines, scope)
    let mut model: HashMap<Option<&'static str>, (u32, bool, FuzzScope)> = HashMap::new();
    let mut cached: HashSet<Option<&'static str>> = HashSet::new();
    let mut held = Vec::new();

    for op in ops.into_iter().take(256) {
        match op {
            ContainerOp::Register {
                name,
                value,
                scope,
                declines,
            } => {
                let name = name_of(name);
                let factory = move |_: &Container, _: &Args| {
                    (!declines).then_some(Payload { value })
                };
                let handle = match name {
                    Some(name) => container.register_named(name, factory),
                    None => container.register(factory),
                };
                handle.scope(scope.into());
                model.insert(name, (value, declines, scope));
            }
            ContainerOp::Resolve(name) => {
                let name = name_of(name);
                let result = match name {
                    Some(name) => container.resolve_named::<Payload>(name),
                    None => container.resolve::<Payload>(),
                };
                let stale = cached.contains(&name);
                match (model.get(&name), result) {
                    (None, Err(DiError::NotFound { .. })) => {}
                    (Some(_), Err(DiError::NotFound { .. })) => panic!("registered key not found"),
                    (Some(_), _) if stale => {}
                    (Some((_, true, _)), Err(DiError::Declined { .. })) => {}
                    (Some((value, false, scope)), Ok(payload)) => {
                        assert_eq!(payload.value, *value);
                        if scope.caches() {
                            cached.insert(name);
                        }
                        held.push(payload);
                    }
                    (expected, actual) => panic!("model {expected:?} vs {actual:?}"),
                }
            }
            ContainerOp::Optional(name) => {
                let name = name_of(name);
                let result = container.optional_with::<Payload>(name, &Default::default());
                match model.get(&name) {
                    None => assert!(result.is_none()),
                    Some(_) if cached.contains(&name) => {}
                    Some((_, declines, scope)) => {
                        assert_eq!(result.is_some(), !declines);
                        if result.is_some() && scope.caches() {
                            cached.insert(name);
                        }
                    }
                }
            }
            ContainerOp::Contains(name) => {
                let name = name_of(name);
                let contains = match name {
                    Some(name) => container.contains_named::<Payload>(name),
                    None => container.contains::<Payload>(),
                };
                assert_eq!(contains, model.contains_key(&name));
            }
            ContainerOp::Reset => {
                container.scopes().reset();
                container.reset_cache();
                cached.clear();
                held.clear();
            }
        }
    }

    assert_eq!(container.len(), model.len());
    assert_eq!(container.scopes().graph.depth(), 0);
    drop(held);
    container.scopes().shared.prune();
    assert!(container.scopes().shared.is_empty());
});
