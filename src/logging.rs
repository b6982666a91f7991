//! Subscriber setup for the crate's `tracing` events
//!
//! Every event is emitted under the `dependency_resolver` target:
//! registration, composition, reset and bootstrap at `DEBUG`, cache hits and
//! child lookups at `TRACE`, skipped property steps at `WARN`.
//!
//! Installing a subscriber needs `logging-json` or `logging-pretty`; without
//! them [`LoggingBuilder::init`] installs nothing and returns `false`.
//!
//! ```rust,no_run
//! use dependency_resolver::logging;
//!
//! logging::builder()
//!     .trace()
//!     .resolver_only()
//!     .compact()
//!     .init();
//! ```

use tracing::Level;

/// Target used by every event this crate emits
pub const TARGET: &str = "dependency_resolver";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event; falls back to the default text layout
    /// when `logging-json` is off
    Json,
    /// Multi-line human readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
}

/// Builder for the global subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    directives: Vec<String>,
    respect_env: bool,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            directives: Vec::new(),
            respect_env: true,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Also shows cache hits and child lookups
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Only skipped property steps and worse
    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    /// Add a filter directive such as `my_app=info`.
    ///
    /// With no directive the level applies to every target.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Restrict output to this crate's events at the configured level.
    pub fn resolver_only(mut self) -> Self {
        self.directives.retain(|d| !d.starts_with(TARGET));
        self.directives.push(TARGET.to_string());
        self
    }

    /// Let `RUST_LOG` override the builder's filter (on by default).
    pub fn respect_env(mut self, respect: bool) -> Self {
        self.respect_env = respect;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Include source file and line of each event
    pub fn with_location(mut self) -> Self {
        self.with_file = true;
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    /// Filter expression the subscriber will use, before `RUST_LOG`.
    pub fn filter_spec(&self) -> String {
        if self.directives.is_empty() {
            return self.level.to_string().to_lowercase();
        }
        self.directives
            .iter()
            .map(|directive| {
                if directive.contains('=') {
                    directive.clone()
                } else {
                    format!("{}={}", directive, self.level.to_string().to_lowercase())
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Install the subscriber globally.
    ///
    /// Returns `false` when another subscriber is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let spec = self.filter_spec();
        let filter = if self.respect_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&spec))
        } else {
            EnvFilter::new(&spec)
        };

        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_target(true);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        };
        installed.is_ok()
    }

    /// Without a subscriber feature there is nothing to install.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber at `DEBUG`: JSON when `logging-json` is enabled,
/// pretty otherwise.
pub fn init() -> bool {
    if cfg!(feature = "logging-json") {
        builder().json().init()
    } else {
        builder().pretty().init()
    }
}
