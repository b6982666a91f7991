#![no_main]

//! Fuzz target for concurrent resolution
//!
//! Several threads register and resolve against one registry. Resolution is
//! serialized, so application-scoped services must still be built once.

use arbitrary::Arbitrary;
use dependency_resolver::{Registry, ScopeKind};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Debug)]
struct SharedConfig {
    value: u32,
}

#[derive(Debug)]
struct Worker {
    config: Arc<SharedConfig>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ThreadOp {
    ResolveConfig,
    ResolveWorker,
    OptionalNamed(u8),
    RegisterNamed(u8, u32),
    Contains,
}

#[derive(Debug, Arbitrary)]
struct ConcurrentScenario {
    thread_count: u8,
    ops: Vec<ThreadOp>,
}

fuzz_target!(|scenario: ConcurrentScenario| {
    let built = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(Registry::new());

    let counter = Arc::clone(&built);
    registry
        .register(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(SharedConfig { value: 42 })
        })
        .scope(ScopeKind::Application);
    registry.register(|c, _| Some(Worker { config: c.optional()? }));

    let thread_count = (scenario.thread_count % 8).max(1) as usize;
    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let ops = scenario.ops.clone();
            thread::spawn(move || {
                for op in ops.into_iter().take(50) {
                    match op {
                        ThreadOp::ResolveConfig => {
                            assert_eq!(registry.resolve::<SharedConfig>().map(|c| c.value), Ok(42));
                        }
                        ThreadOp::ResolveWorker => {
                            let worker = registry.resolve::<Worker>();
                            assert!(worker.is_ok_and(|w| w.config.value == 42));
                        }
                        ThreadOp::OptionalNamed(name) => {
                            let _ = registry.optional_named::<SharedConfig>(&name.to_string());
                        }
                        ThreadOp::RegisterNamed(name, value) => {
                            registry
                                .register_named(name.to_string(), move |_, _| Some(SharedConfig { value }));
                        }
                        ThreadOp::Contains => {
                            assert!(registry.root().contains::<Worker>());
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    assert!(built.load(Ordering::SeqCst) <= 1);
    assert_eq!(registry.scopes().graph.depth(), 0);
});
