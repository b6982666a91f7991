//! Per-call resolution arguments
//!
//! Lets one factory be parameterized per resolve call without a dedicated
//! registration per parameter set.

use ahash::RandomState;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ArgValue = Arc<dyn Any + Send + Sync>;

/// Bag of ad hoc values handed to factories at resolve time.
///
/// Values are stored positionally (`with`) or under a key (`with_key`).
/// Reads are typed; a missing entry or one of another type reads as `None`.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Args, Container};
///
/// struct Greeting(String);
///
/// let container = Container::new();
/// container.register(|_, args| {
///     let who = args.get::<&str>()?;
///     let punct = args.named::<char>("punct").copied().unwrap_or('.');
///     Some(Greeting(format!("Hello, {who}{punct}")))
/// });
///
/// let args = Args::new().with("Fred").with_key("punct", '!');
/// let greeting = container.resolve_args::<Greeting>(&args).unwrap();
/// assert_eq!(greeting.0, "Hello, Fred!");
///
/// // Without arguments the factory declines
/// assert!(container.optional::<Greeting>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Args {
    positional: Vec<ArgValue>,
    keyed: HashMap<String, ArgValue, RandomState>,
}

impl Args {
    /// Empty argument bag.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn with<V: Any + Send + Sync>(mut self, value: V) -> Self {
        self.positional.push(Arc::new(value));
        self
    }

    /// Store a value under `key`, replacing any earlier value for that key.
    pub fn with_key<V: Any + Send + Sync>(mut self, key: impl Into<String>, value: V) -> Self {
        self.keyed.insert(key.into(), Arc::new(value));
        self
    }

    /// First positional value of type `V`.
    pub fn get<V: Any>(&self) -> Option<&V> {
        self.positional.iter().find_map(|value| value.downcast_ref::<V>())
    }

    /// Positional value at `index`, if it has type `V`.
    pub fn at<V: Any>(&self, index: usize) -> Option<&V> {
        self.positional.get(index)?.downcast_ref::<V>()
    }

    /// Value stored under `key`, if it has type `V`.
    pub fn named<V: Any>(&self, key: &str) -> Option<&V> {
        self.keyed.get(key)?.downcast_ref::<V>()
    }

    /// Check whether a value is stored under `key`.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyed.contains_key(key)
    }

    /// Total number of positional and keyed values.
    #[inline]
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyed.is_empty()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keyed.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Args")
            .field("positional", &self.positional.len())
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_reads() {
        let args = Args::new().with(7u32).with("seven").with(8u32);

        assert_eq!(args.get::<u32>(), Some(&7));
        assert_eq!(args.at::<u32>(2), Some(&8));
        assert_eq!(args.at::<&str>(1), Some(&"seven"));
        assert!(args.at::<u32>(1).is_none());
        assert!(args.at::<u32>(9).is_none());
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_keyed_reads() {
        let args = Args::new().with_key("retries", 3usize).with_key("retries", 5usize);

        assert_eq!(args.named::<usize>("retries"), Some(&5));
        assert!(args.named::<u8>("retries").is_none());
        assert!(args.named::<usize>("timeout").is_none());
        assert!(args.contains_key("retries"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_empty() {
        let args = Args::default();
        assert!(args.is_empty());
        assert!(args.get::<String>().is_none());
    }
}
