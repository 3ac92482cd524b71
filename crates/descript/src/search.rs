//! Search specifications: predicate names paired with normalized patterns.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::pattern::{normalize, Pattern, PatternValue};
use crate::predicate::{BY_CONTENT, BY_REFERENCE};
use crate::types::{RegistryError, RegistryResult};

/// A mapping from predicate name to the patterns it should test.
///
/// Used as-is by multi-target operations; single-target operations first
/// narrow it with [`SearchSpec::single_target`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, PatternValue>")]
pub struct SearchSpec {
    criteria: Vec<(String, Vec<Pattern>)>,
}

impl SearchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns for a predicate. A repeated name replaces its earlier patterns.
    pub fn with(mut self, predicate: impl Into<String>, value: impl Into<PatternValue>) -> Self {
        let predicate = predicate.into();
        let patterns = normalize(value.into());
        match self.criteria.iter_mut().find(|(name, _)| *name == predicate) {
            Some((_, existing)) => *existing = patterns,
            None => self.criteria.push((predicate, patterns)),
        }
        self
    }

    pub fn by_reference(self, value: impl Into<PatternValue>) -> Self {
        self.with(BY_REFERENCE, value)
    }

    pub fn by_content(self, value: impl Into<PatternValue>) -> Self {
        self.with(BY_CONTENT, value)
    }

    pub fn criteria(&self) -> impl Iterator<Item = (&str, &[Pattern])> {
        self.criteria
            .iter()
            .map(|(name, patterns)| (name.as_str(), patterns.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Validate this spec as a search type: exactly one predicate, at most
    /// one pattern.
    pub fn single_target(&self) -> RegistryResult<(&str, Option<&Pattern>)> {
        let (name, patterns) = match self.criteria.as_slice() {
            [] => return Err(RegistryError::EmptySearchType),
            [single] => single,
            _ => return Err(RegistryError::AmbiguousSearchType),
        };
        if patterns.len() > 1 {
            return Err(RegistryError::AmbiguousSearchPattern);
        }
        Ok((name.as_str(), patterns.first()))
    }
}

impl From<BTreeMap<String, PatternValue>> for SearchSpec {
    fn from(map: BTreeMap<String, PatternValue>) -> Self {
        map.into_iter()
            .fold(SearchSpec::new(), |spec, (name, value)| spec.with(name, value))
    }
}
