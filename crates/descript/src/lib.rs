//! Descript: a script registry for deferring, regrouping and rewriting page scripts
//! without losing document order.

pub mod index;
pub mod pattern;
pub mod predicate;
pub mod registry;
pub mod search;
pub mod slot;
pub mod types;

pub use index::ContainerIndex;
pub use pattern::{normalize, Pattern, PatternValue};
pub use predicate::{Predicate, PredicateRegistry, BY_CONTENT, BY_REFERENCE};
pub use registry::{invoke_once, RegistryOptions, Rewrite, ScriptPayload, ScriptRegistry};
pub use search::SearchSpec;
pub use slot::RegistrySlot;
pub use types::*;

pub use regex::Regex;
