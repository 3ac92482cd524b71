//! Named predicates deciding whether an entry matches a pattern.

use std::collections::HashMap;
use std::sync::Arc;

use crate::pattern::Pattern;
use crate::types::ScriptEntry;

/// Matches external entries whose locator matches the pattern.
pub const BY_REFERENCE: &str = "by-reference";

/// Matches inline entries whose source text matches the pattern.
pub const BY_CONTENT: &str = "by-content";

/// A stored `(entry, pattern) -> bool` test.
pub type Predicate = Arc<dyn Fn(&ScriptEntry, &Pattern) -> bool + Send + Sync>;

/// Name-to-predicate mapping, pre-populated with the built-ins.
#[derive(Clone)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Predicate>,
}

impl PredicateRegistry {
    /// Create a registry holding the built-in predicates.
    pub fn new() -> Self {
        let mut registry = Self {
            predicates: HashMap::new(),
        };
        registry.register(BY_REFERENCE, by_reference);
        registry.register(BY_CONTENT, by_content);
        registry
    }

    /// Add a predicate, replacing any existing one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&ScriptEntry, &Pattern) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.predicates.insert(name.clone(), Arc::new(predicate)).is_some() {
            tracing::debug!(target: "descript", predicate = %name, "replaced predicate");
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Predicate> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn by_reference(entry: &ScriptEntry, pattern: &Pattern) -> bool {
    entry.src().is_some_and(|src| pattern.matches(src))
}

fn by_content(entry: &ScriptEntry, pattern: &Pattern) -> bool {
    entry.source().is_some_and(|source| pattern.matches(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryId, RawScript, DEFAULT_CONTAINER};

    fn entry(raw: RawScript) -> ScriptEntry {
        ScriptEntry::new(EntryId(0), DEFAULT_CONTAINER, raw)
    }

    #[test]
    fn test_builtins_present() {
        let registry = PredicateRegistry::new();
        assert_eq!(registry.names(), vec![BY_CONTENT, BY_REFERENCE]);
    }

    #[test]
    fn test_by_reference_ignores_inline() {
        let registry = PredicateRegistry::new();
        let by_ref = registry.resolve(BY_REFERENCE).unwrap();

        let external = entry(RawScript::external("/js/script4.js"));
        let inline = entry(RawScript::inline("var src = '/js/script4.js';"));

        assert!(by_ref(&external, &Pattern::text("script4")));
        assert!(!by_ref(&inline, &Pattern::text("script4")));
        assert!(by_ref(&external, &Pattern::regex(r"script\d\.js$").unwrap()));
    }

    #[test]
    fn test_by_content_ignores_external() {
        let registry = PredicateRegistry::new();
        let by_content = registry.resolve(BY_CONTENT).unwrap();

        let inline = entry(RawScript::inline("alert('hi');"));
        let external = entry(RawScript::external("/alert.js"));

        assert!(by_content(&inline, &Pattern::text("alert")));
        assert!(!by_content(&external, &Pattern::text("alert")));
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = PredicateRegistry::new();
        registry.register(BY_CONTENT, |_, _| true);

        let always = registry.resolve(BY_CONTENT).unwrap();
        let external = entry(RawScript::external("/a.js"));
        assert!(always(&external, &Pattern::text("zzz")));
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_resolve_missing() {
        let registry = PredicateRegistry::new();
        assert!(registry.resolve("data-script").is_none());
        assert!(!registry.contains("data-script"));
    }
}
