//! Evaluator context bindings.
//!
//! An [`Environment`] is handed to an evaluator when it is constructed and
//! mutated by the controller through [`Environment::set`]. Handles are cheap to
//! clone and share the same bindings, so a value set by the controller is
//! visible to the very next evaluation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Bindings {
    values: RwLock<HashMap<String, Value>>,
    generation: AtomicU64,
}

/// Shared name-to-value bindings visible to the evaluator.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    inner: Arc<Bindings>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Get a clone of the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Remove a binding, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let removed = self
            .inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// Check if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Copy of every binding.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counter bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
