//! Core data types for managed script entries.

use serde::{Deserialize, Serialize};

/// Name of the container every entry starts in.
pub const DEFAULT_CONTAINER: &str = "default";

/// Stable identity of an entry, assigned when it enters the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a script carries: a locator for an external file, or inline source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptContent {
    External { src: String },
    Inline { source: String },
}

impl ScriptContent {
    pub fn external(src: impl Into<String>) -> Self {
        ScriptContent::External { src: src.into() }
    }

    pub fn inline(source: impl Into<String>) -> Self {
        ScriptContent::Inline {
            source: source.into(),
        }
    }
}

/// A script record as handed over by the host page scan, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScript {
    pub content: ScriptContent,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl RawScript {
    pub fn external(src: impl Into<String>) -> Self {
        Self {
            content: ScriptContent::external(src),
            attributes: Vec::new(),
        }
    }

    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            content: ScriptContent::inline(source),
            attributes: Vec::new(),
        }
    }

    /// Attach an extra element attribute (e.g. `data-script`).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

/// One managed script reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub id: EntryId,
    pub container: String,
    pub content: ScriptContent,
    pub attributes: Vec<(String, String)>,
}

impl ScriptEntry {
    pub(crate) fn new(id: EntryId, container: impl Into<String>, raw: RawScript) -> Self {
        Self {
            id,
            container: container.into(),
            content: raw.content,
            attributes: raw.attributes,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.content, ScriptContent::Inline { .. })
    }

    /// Locator of an external entry.
    pub fn src(&self) -> Option<&str> {
        match &self.content {
            ScriptContent::External { src } => Some(src),
            ScriptContent::Inline { .. } => None,
        }
    }

    /// Source text of an inline entry.
    pub fn source(&self) -> Option<&str> {
        match &self.content {
            ScriptContent::Inline { source } => Some(source),
            ScriptContent::External { .. } => None,
        }
    }

    /// Look up an element attribute carried over from extraction.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors raised by registry operations.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("A container name is required")]
    ContainerNameRequired,

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("The search type should contain only one predicate, i.e. {{ by-reference: 'script1' }}")]
    AmbiguousSearchType,

    #[error(
        "The search type value should be a single pattern or a list with only a single item, \
         i.e. {{ by-reference: 'script1' }} or {{ by-content: ['script1'] }}"
    )]
    AmbiguousSearchPattern,

    #[error("The search type should name a predicate, i.e. {{ by-reference: 'script1' }}")]
    EmptySearchType,

    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Convenience result type.
pub type RegistryResult<T> = Result<T, RegistryError>;
