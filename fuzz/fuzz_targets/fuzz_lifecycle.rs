#![no_main]

//! Fuzz target for registry lifecycle
//!
//! Interleaves bootstrap, root replacement, reset and scope-governed
//! resolution, and checks that reset always brings back the bootstrapped
//! registrations and nothing else.

use arbitrary::Arbitrary;
use dependency_resolver::{Registry, ScopeKind};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
struct Booted;

#[derive(Debug)]
struct Session {
    id: u64,
}

#[derive(Debug, Arbitrary)]
enum LifecycleOp {
    RegisterSession { shared: bool },
    ResolveSession,
    DropHeld,
    ResolveBooted,
    Bootstrap,
    OverrideRoot,
    Reset,
}

fuzz_target!(|ops: Vec<LifecycleOp>| {
    let registry = Registry::builder()
        .bootstrap(|registry| {
            registry.register_instance(Booted);
        })
        .build();

    let mut session_registered = false;
    let mut held: Vec<Arc<Session>> = Vec::new();

    for op in ops.into_iter().take(128) {
        match op {
            LifecycleOp::RegisterSession { shared } => {
                let kind = if shared { ScopeKind::Shared } else { ScopeKind::Unique };
                registry
                    .register(|_, _| {
                        Some(Session {
                            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                        })
                    })
                    .scope(kind);
                session_registered = true;
            }
            LifecycleOp::ResolveSession => {
                let session = registry.optional::<Session>();
                assert_eq!(session.is_some(), session_registered);
                held.extend(session);
            }
            LifecycleOp::DropHeld => held.clear(),
            LifecycleOp::ResolveBooted => assert!(registry.resolve::<Booted>().is_ok()),
            LifecycleOp::Bootstrap => {
                registry.bootstrap();
                assert!(!registry.needs_bootstrap());
            }
            LifecycleOp::OverrideRoot => {
                let root = registry.container();
                root.add_child(registry.main());
                registry.set_root(root);
            }
            LifecycleOp::Reset => {
                registry.reset();
                session_registered = false;
                assert!(registry.needs_bootstrap());
                assert!(registry.optional::<Session>().is_none());
            }
        }
    }

    assert!(registry.resolve::<Booted>().is_ok());
    assert!(held.iter().all(|session| session.id < NEXT_ID.load(Ordering::Relaxed)));
});
