//! Walks through registration, composition and resolution with logging on
//!
//! JSON output:
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Pretty output, including cache hits:
//! ```bash
//! RUST_LOG=dependency_resolver=trace cargo run --example logging --features logging-pretty
//! ```

use dependency_resolver::{Args, Registry, ScopeKind};
use std::sync::Arc;

struct Database {
    url: String,
}

struct UserService {
    db: Arc<Database>,
}

#[derive(Debug)]
struct RequestContext {
    request_id: String,
}

trait Mailer: Send + Sync {
    fn send(&self, to: &str) -> String;
}

struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, to: &str) -> String {
        format!("smtp -> {to}")
    }
}

struct MockMailer;

impl Mailer for MockMailer {
    fn send(&self, to: &str) -> String {
        format!("mock -> {to}")
    }
}

fn main() {
    dependency_resolver::logging::init();

    println!("=== Dependency Resolver Logging Demo ===\n");

    let registry = Registry::builder()
        .bootstrap(|registry| {
            registry
                .register(|_, _| {
                    Some(Database {
                        url: "postgres://localhost/mydb".into(),
                    })
                })
                .scope(ScopeKind::Application);
            registry.register(|c, _| Some(UserService { db: c.optional()? }));
            registry
                .register(|_, _| Some(SmtpMailer))
                .scope(ScopeKind::Application)
                .implements::<dyn Mailer>(|smtp| smtp);
        })
        .build();

    // First resolution runs the bootstrap
    let users = registry.resolve::<UserService>().expect("user service");
    println!("  [App] UserService connected to {}", users.db.url);

    // Arguments reach the factory per call
    registry.register(|_, args| {
        Some(RequestContext {
            request_id: args.get::<String>()?.clone(),
        })
    });
    let ctx = registry
        .resolve_args::<RequestContext>(&Args::new().with("req-12345".to_string()))
        .expect("request context");
    println!("  [App] Handling {}", ctx.request_id);

    // Declined and missing registrations
    let declined = registry.resolve::<RequestContext>();
    println!("  [App] Without arguments: {declined:?}");
    assert!(registry.optional::<i32>().is_none());

    // Override the mailer through a root container that has main as a child
    let mocks = registry.container();
    mocks.register_arc::<dyn Mailer, _>(None, |_, _| Some(Arc::new(MockMailer)));
    mocks.add_child(registry.main());
    registry.set_root(mocks);

    let mailer = registry.resolve::<dyn Mailer>().expect("mailer");
    println!("  [App] {}", mailer.send("fred@example.com"));

    registry.reset();

    println!("\n=== Demo Complete ===");
}
