//! # Dependency Resolver - Scoped Service Registry for Rust
//!
//! A registry of construction recipes keyed by type and optional name, with
//! pluggable caching policies and composable containers.
//!
//! ## Features
//!
//! - **Type-keyed** - Any `Send + Sync + 'static` type is resolvable, trait objects included
//! - **Named registrations** - Several independent recipes for the same type
//! - **Scopes** - unique, graph, application, cached, shared (weak) and per-container caching
//! - **Composition** - Containers search their children depth-first for missing keys
//! - **Arguments** - Per-call positional and keyed values passed to factories
//! - **Serialized** - One reentrant lock per context makes every resolution atomic
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_resolver::{Container, ScopeKind};
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//! struct UserService { db: Arc<Database> }
//!
//! let container = Container::new();
//!
//! container
//!     .register(|_, _| Some(Database { url: "postgres://localhost".into() }))
//!     .scope(ScopeKind::Application);
//! container.register(|c, _| Some(UserService { db: c.optional()? }));
//!
//! let users = container.resolve::<UserService>().unwrap();
//! let db = container.resolve::<Database>().unwrap();
//! assert!(Arc::ptr_eq(&users.db, &db));
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use dependency_resolver::{Container, ScopeKind};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! struct RequestId(u64);
//!
//! let container = Container::new();
//!
//! // New instance every time
//! container
//!     .register(|_, _| Some(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst))))
//!     .scope(ScopeKind::Unique);
//! assert_ne!(container.resolve::<RequestId>().unwrap().0, container.resolve::<RequestId>().unwrap().0);
//!
//! // Kept alive only as long as the caller holds it
//! container
//!     .register_named("session", |_, _| Some(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst))))
//!     .scope(ScopeKind::Shared);
//! let held = container.resolve_named::<RequestId>("session").unwrap();
//! assert!(Arc::ptr_eq(&held, &container.resolve_named::<RequestId>("session").unwrap()));
//! ```
//!
//! ## Composed Containers
//!
//! ```rust
//! use dependency_resolver::Container;
//!
//! struct AppConfig { name: String }
//! struct RequestContext { id: String }
//!
//! let app = Container::new();
//! app.register(|_, _| Some(AppConfig { name: "MyApp".into() }));
//!
//! // Searches its own registrations first, then `app`
//! let request = app.sibling();
//! request.register(|_, _| Some(RequestContext { id: "req-123".into() }));
//! request.add_child(app.clone());
//!
//! assert!(request.contains::<AppConfig>());
//! assert!(request.contains::<RequestContext>());
//! assert!(!app.contains::<RequestContext>());
//! ```

mod args;
mod container;
mod error;
mod factory;
pub mod global;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod registration;
mod registry;
mod scope;
mod storage;

pub use args::Args;
pub use container::Container;
pub use error::{DiError, Result};
pub use factory::FactoryFn;
pub use key::{Name, ServiceKey};
pub use provider::{Injectable, ScopeKind};
pub use registration::{Registration, RegistrationHandle};
pub use registry::{BootstrapFn, Registry, RegistryBuilder};
pub use scope::{CachedScope, GraphScope, Scope, Scopes, SharedScope};

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Container, DiError, Injectable, Name, Registry, RegistrationHandle, Result, Scope, ScopeKind,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    struct Character {
        name: String,
    }

    fn character(name: &str) -> Option<Character> {
        Some(Character { name: name.into() })
    }

    #[test]
    fn test_overwrite_uses_latest_factory() {
        let container = Container::new();
        container.register(|_, _| character("Fred"));
        container.register(|_, _| character("Barney"));

        assert_eq!(container.optional::<Character>().unwrap().name, "Barney");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_named_isolation() {
        for kind in [ScopeKind::Shared, ScopeKind::Cached, ScopeKind::Application] {
            let container = Container::new();
            container.register_named("Fred", |_, _| character("Fred")).scope(kind);
            container.register_named("Barney", |_, _| character("Barney")).scope(kind);

            let fred = container.resolve_named::<Character>("Fred").unwrap();
            let barney = container.resolve_named::<Character>("Barney").unwrap();
            assert_eq!(fred.name, "Fred");
            assert_eq!(barney.name, "Barney");
            assert!(!Arc::ptr_eq(&fred, &barney));
            assert!(Arc::ptr_eq(&fred, &container.resolve_named::<Character>("Fred").unwrap()));
            assert!(container.optional::<Character>().is_none());
        }

        for kind in [ScopeKind::Unique, ScopeKind::Graph] {
            let container = Container::new();
            container.register_named("Fred", |_, _| character("Fred")).scope(kind);

            let a = container.resolve_named::<Character>("Fred").unwrap();
            let b = container.resolve_named::<Character>("Fred").unwrap();
            assert!(!Arc::ptr_eq(&a, &b));
        }
    }

    #[test]
    fn test_graph_coalescing() {
        struct Store;
        struct Reader(Arc<Store>);
        struct Writer(Arc<Store>);
        struct App {
            reader: Arc<Reader>,
            writer: Arc<Writer>,
        }

        let container = Container::new();
        container.register(|_, _| Some(Store));
        container.register(|c, _| Some(Reader(c.optional()?)));
        container.register(|c, _| Some(Writer(c.optional()?)));
        container.register(|c, _| {
            Some(App {
                reader: c.optional()?,
                writer: c.optional()?,
            })
        });

        let first = container.resolve::<App>().unwrap();
        assert!(Arc::ptr_eq(&first.reader.0, &first.writer.0));

        let second = container.resolve::<App>().unwrap();
        assert!(!Arc::ptr_eq(&first.reader.0, &second.reader.0));
        assert!(container.scopes().graph.is_empty());
    }

    #[test]
    fn test_shared_decay() {
        static BUILT: AtomicU32 = AtomicU32::new(0);
        struct Connection(u32);

        let container = Container::new();
        container
            .register(|_, _| Some(Connection(BUILT.fetch_add(1, Ordering::SeqCst))))
            .scope(ScopeKind::Shared);

        let first = container.resolve::<Connection>().unwrap();
        let again = container.resolve::<Connection>().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let first_id = first.0;
        drop(first);
        drop(again);

        let fresh = container.resolve::<Connection>().unwrap();
        assert_ne!(fresh.0, first_id);
    }

    #[test]
    fn test_unresolved_optional() {
        struct NeverRegistered;

        let container = Container::new();
        assert!(container.optional::<NeverRegistered>().is_none());
        assert!(matches!(
            container.resolve::<NeverRegistered>(),
            Err(DiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_chained_dependency() {
        struct Engine {
            cylinders: u8,
        }
        struct Car {
            engine: Option<Arc<Engine>>,
        }

        let container = Container::new();
        container.register(|c, _| {
            Some(Car {
                engine: c.optional::<Engine>(),
            })
        });
        container.register(|_, _| Some(Engine { cylinders: 6 }));

        let car = container.resolve::<Car>().unwrap();
        assert_eq!(car.engine.as_ref().map(|e| e.cylinders), Some(6));
    }

    #[test]
    fn test_protocol_exposure_within_cycle() {
        trait Speaker: Send + Sync {
            fn speak(&self) -> &str;
        }

        impl Speaker for Character {
            fn speak(&self) -> &str {
                &self.name
            }
        }

        struct Stage {
            actor: Arc<Character>,
            voice: Arc<dyn Speaker>,
        }

        let container = Container::new();
        container
            .register(|_, _| character("Wilma"))
            .implements::<dyn Speaker>(|c| c);
        container.register(|c, _| {
            Some(Stage {
                actor: c.optional()?,
                voice: c.optional::<dyn Speaker>()?,
            })
        });

        let stage = container.resolve::<Stage>().unwrap();
        assert_eq!(stage.voice.speak(), "Wilma");
        assert!(std::ptr::addr_eq(Arc::as_ptr(&stage.actor), Arc::as_ptr(&stage.voice)));
    }

    #[test]
    fn test_arguments_reach_nested_factories() {
        struct Greeting(String);
        struct Banner(Arc<Greeting>);

        let container = Container::new();
        container.register(|_, args| {
            let who = args.named::<&str>("who").copied().unwrap_or("world");
            Some(Greeting(format!("hello {who}")))
        });
        container.register(|c, args| Some(Banner(c.optional_args(args)?)));

        let args = Args::new().with_key("who", "fred");
        assert_eq!(container.resolve_args::<Banner>(&args).unwrap().0.0, "hello fred");
        assert_eq!(container.resolve::<Banner>().unwrap().0.0, "hello world");
    }

    #[test]
    fn test_concurrent_threads_share_application_instance() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let registry = Arc::new(Registry::new());
        registry
            .register(|_, _| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                character("Betty")
            })
            .scope(ScopeKind::Application);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.resolve::<Character>().unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|c| Arc::ptr_eq(c, &results[0])));
    }
}
