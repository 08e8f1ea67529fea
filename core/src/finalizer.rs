//! Finalizers receive the outcome of an asynchronous job.
//!
//! # Design
//! Jobs carry the *name* of a finalizer, not an instance. The name is looked
//! up in a `FinalizerRegistry` when the job reaches `Finalizing`, and the
//! registered factory builds a fresh finalizer for that one call. Factories
//! get a handle to the queue so a finalizer can chain further jobs.

use std::collections::HashMap;
use std::fmt;

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::queue::JobQueue;

/// What a job produced: the response, or why there is none.
pub type Outcome = Result<HttpResponse, TransportError>;

/// Callback invoked once per job with its terminal outcome.
pub trait Finalizer: Send {
    fn execute(&mut self, outcome: Outcome);
}

type Factory = Box<dyn Fn(&JobQueue) -> Box<dyn Finalizer> + Send + Sync>;

#[derive(Default)]
pub struct FinalizerRegistry {
    factories: HashMap<String, Factory>,
}

impl FinalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&JobQueue) -> Box<dyn Finalizer> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Register a finalizer type that needs no setup.
    pub fn register_default<F>(&mut self, name: &str) -> &mut Self
    where
        F: Finalizer + Default + 'static,
    {
        self.register(name, |_| Box::new(F::default()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub(crate) fn instantiate(&self, name: &str, queue: &JobQueue) -> Option<Box<dyn Finalizer>> {
        self.factories.get(name).map(|factory| factory(queue))
    }
}

impl fmt::Debug for FinalizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("FinalizerRegistry")
            .field("finalizers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Noop;

    impl Finalizer for Noop {
        fn execute(&mut self, _outcome: Outcome) {}
    }

    #[test]
    fn registered_names_are_known() {
        let mut registry = FinalizerRegistry::new();
        registry
            .register_default::<Noop>("noop")
            .register("other", |_| Box::new(Noop));
        assert!(registry.contains("noop"));
        assert!(registry.contains("other"));
        assert!(!registry.contains("missing"));
        assert_eq!(
            format!("{registry:?}"),
            r#"FinalizerRegistry { finalizers: ["noop", "other"] }"#
        );
    }
}
