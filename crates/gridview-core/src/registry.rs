//! Registry of caller-supplied comparators and filter predicates

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SortDirection;

/// Custom sort comparator.
///
/// Receives the raw text of two cells and the requested direction, and returns
/// the final ordering (the direction is already applied by the comparator).
pub type Comparator = Arc<dyn Fn(&str, &str, SortDirection) -> Ordering + Send + Sync>;

/// Custom filter predicate, invoked with the text of a cell or a whole row
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Named comparators and predicates available to a view
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    comparators: HashMap<String, Comparator>,
    predicates: HashMap<String, Predicate>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a comparator under `name`, replacing any previous one
    pub fn register_comparator<F>(&mut self, name: impl Into<String>, comparator: F)
    where
        F: Fn(&str, &str, SortDirection) -> Ordering + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(comparator = %name, "registering comparator");
        self.comparators.insert(name, Arc::new(comparator));
    }

    /// Register a predicate under `name`, replacing any previous one
    pub fn register_predicate<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(predicate = %name, "registering predicate");
        self.predicates.insert(name, Arc::new(predicate));
    }

    /// Get a comparator by name
    pub fn comparator(&self, name: &str) -> Option<Comparator> {
        let comparator = self.comparators.get(name).cloned();
        if comparator.is_none() {
            tracing::warn!(comparator = %name, "comparator not found in registry, using default ordering");
        }
        comparator
    }

    /// Get a predicate by name
    pub fn predicate(&self, name: &str) -> Option<Predicate> {
        let predicate = self.predicates.get(name).cloned();
        if predicate.is_none() {
            tracing::warn!(predicate = %name, "predicate not found in registry, treating as no match");
        }
        predicate
    }

    pub fn has_comparator(&self, name: &str) -> bool {
        self.comparators.contains_key(name)
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut comparators: Vec<&str> = self.comparators.keys().map(|s| s.as_str()).collect();
        let mut predicates: Vec<&str> = self.predicates.keys().map(|s| s.as_str()).collect();
        comparators.sort_unstable();
        predicates.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("comparators", &comparators)
            .field("predicates", &predicates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_functions_resolve_by_name() {
        let mut registry = FunctionRegistry::new();
        registry.register_comparator("by_len", |a: &str, b: &str, dir: SortDirection| {
            let ord = a.len().cmp(&b.len());
            if dir == SortDirection::Descending { ord.reverse() } else { ord }
        });
        registry.register_predicate("is_even", |s: &str| {
            s.trim().parse::<i64>().map(|n| n % 2 == 0).unwrap_or(false)
        });

        let cmp = registry.comparator("by_len").expect("comparator registered");
        assert_eq!(cmp("aa", "b", SortDirection::Ascending), Ordering::Greater);
        assert_eq!(cmp("aa", "b", SortDirection::Descending), Ordering::Less);

        let even = registry.predicate("is_even").expect("predicate registered");
        assert!(even("4"));
        assert!(!even("x"));

        assert!(registry.comparator("missing").is_none());
        assert!(!registry.has_predicate("missing"));
    }
}
