//! The script registry: the single ordered store of entries and every
//! operation that classifies, removes, inserts or rewrites them.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::index::ContainerIndex;
use crate::pattern::Pattern;
use crate::predicate::PredicateRegistry;
use crate::search::SearchSpec;
use crate::types::{
    EntryId, RawScript, RegistryError, RegistryResult, ScriptContent, ScriptEntry,
    DEFAULT_CONTAINER,
};

/// Construction options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryOptions {
    /// Entries matching this spec are dropped before anything can see them,
    /// leaving them untouched in the page.
    #[serde(default)]
    pub preserve: Option<SearchSpec>,
}

impl RegistryOptions {
    pub fn preserve(spec: SearchSpec) -> Self {
        Self {
            preserve: Some(spec),
        }
    }
}

/// What [`ScriptRegistry::insert_after`] adds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptPayload {
    /// Source text of a zero-argument function; wrapped so it runs once on
    /// materialization.
    Function(String),
    /// Locator of an external script.
    External(String),
}

impl ScriptPayload {
    pub fn function(source: impl Into<String>) -> Self {
        ScriptPayload::Function(source.into())
    }

    fn into_raw(self) -> RawScript {
        match self {
            ScriptPayload::Function(source) => RawScript::inline(invoke_once(&source)),
            ScriptPayload::External(src) => RawScript::external(src),
        }
    }
}

impl From<&str> for ScriptPayload {
    fn from(src: &str) -> Self {
        ScriptPayload::External(src.to_string())
    }
}

impl From<String> for ScriptPayload {
    fn from(src: String) -> Self {
        ScriptPayload::External(src)
    }
}

/// Wrap function source as an immediately invoked expression.
pub fn invoke_once(function_source: &str) -> String {
    format!("({})();", function_source.trim())
}

/// One textual substitution applied to inline source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rewrite {
    pub pattern: Pattern,
    pub replacement: String,
    /// Replace every match instead of only the first.
    #[serde(default)]
    pub all: bool,
}

impl Rewrite {
    pub fn new(pattern: impl Into<Pattern>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            all: false,
        }
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    /// Apply to `text`. Regex replacements expand `$n` capture references.
    pub fn apply(&self, text: &str) -> String {
        match (&self.pattern, self.all) {
            (Pattern::Text(needle), false) => text.replacen(needle.as_str(), &self.replacement, 1),
            (Pattern::Text(needle), true) => text.replace(needle.as_str(), &self.replacement),
            (Pattern::Regex(re), false) => re.replace(text, self.replacement.as_str()).into_owned(),
            (Pattern::Regex(re), true) => {
                re.replace_all(text, self.replacement.as_str()).into_owned()
            }
        }
    }
}

impl<P: Into<Pattern>, R: Into<String>> From<(P, R)> for Rewrite {
    fn from((pattern, replacement): (P, R)) -> Self {
        Rewrite::new(pattern, replacement)
    }
}

/// Ordered store of every managed script entry.
///
/// `entries` is kept in document order at all times; containers are views
/// derived from it and cached until the next structural mutation.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    entries: Vec<ScriptEntry>,
    predicates: PredicateRegistry,
    index: OnceCell<ContainerIndex>,
    next_id: u64,
}

impl ScriptRegistry {
    /// Populate from an extraction list, then apply the `preserve` spec.
    pub fn new(
        scripts: impl IntoIterator<Item = RawScript>,
        options: RegistryOptions,
    ) -> RegistryResult<Self> {
        let mut registry = Self::with_scripts(scripts);
        let extracted = registry.len();

        if let Some(preserve) = options.preserve.as_ref() {
            registry.delete(preserve)?;
        }

        tracing::debug!(
            target: "descript",
            extracted,
            preserved = extracted - registry.len(),
            "script registry initialized"
        );
        Ok(registry)
    }

    /// Populate from an extraction list with default options.
    pub fn with_scripts(scripts: impl IntoIterator<Item = RawScript>) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            predicates: PredicateRegistry::new(),
            index: OnceCell::new(),
            next_id: 0,
        };
        for raw in scripts {
            let id = registry.allocate_id();
            registry
                .entries
                .push(ScriptEntry::new(id, DEFAULT_CONTAINER, raw));
        }
        registry
    }

    /// Move every entry matching `search` into `container`, wherever it
    /// currently lives.
    pub fn assign(&mut self, container: &str, search: &SearchSpec) -> RegistryResult<&mut Self> {
        if container.is_empty() {
            return Err(RegistryError::ContainerNameRequired);
        }
        let matched = self.matching_ids(search)?;

        for entry in self.entries.iter_mut().filter(|e| matched.contains(&e.id)) {
            entry.container = container.to_string();
        }
        self.invalidate();

        tracing::debug!(target: "descript", container, matched = matched.len(), "assigned entries");
        Ok(self)
    }

    /// Remove every entry matching `search` from the registry for good.
    pub fn delete(&mut self, search: &SearchSpec) -> RegistryResult<&mut Self> {
        let matched = self.matching_ids(search)?;

        self.entries.retain(|e| !matched.contains(&e.id));
        self.invalidate();

        tracing::debug!(target: "descript", removed = matched.len(), "deleted entries");
        Ok(self)
    }

    /// Whether any entry matches a single-target search type.
    pub fn exists(&self, search_type: &SearchSpec) -> RegistryResult<bool> {
        Ok(self.find_position(search_type)?.is_some())
    }

    /// Resolve a search type to one entry; the latest match in registry
    /// order wins.
    pub fn find(&self, search_type: &SearchSpec) -> RegistryResult<Option<&ScriptEntry>> {
        Ok(self
            .find_position(search_type)?
            .map(|position| &self.entries[position]))
    }

    /// The ordered members of `container`.
    pub fn get(&self, container: &str) -> RegistryResult<Vec<&ScriptEntry>> {
        if container.is_empty() {
            return Err(RegistryError::ContainerNameRequired);
        }
        self.index()
            .get(container)
            .map(|positions| self.view(positions))
            .ok_or_else(|| RegistryError::ContainerNotFound(container.to_string()))
    }

    /// Every non-empty container with its ordered members.
    pub fn get_all(&self) -> BTreeMap<&str, Vec<&ScriptEntry>> {
        self.index()
            .iter()
            .map(|(name, positions)| (name, self.view(positions)))
            .collect()
    }

    /// Insert a new entry directly after the entry `search_type` resolves to,
    /// in the anchor's container. Returns `None` when there is no anchor.
    pub fn insert_after(
        &mut self,
        search_type: &SearchSpec,
        payload: impl Into<ScriptPayload>,
    ) -> RegistryResult<Option<EntryId>> {
        let Some(anchor) = self.find_position(search_type)? else {
            tracing::debug!(target: "descript", "insert skipped, no anchor matched");
            return Ok(None);
        };

        let id = self.allocate_id();
        let container = self.entries[anchor].container.clone();
        let anchor_id = self.entries[anchor].id;
        self.entries.insert(
            anchor + 1,
            ScriptEntry::new(id, container, payload.into().into_raw()),
        );
        self.invalidate();

        tracing::debug!(target: "descript", %id, anchor = %anchor_id, "inserted entry");
        Ok(Some(id))
    }

    /// Apply `rewrites` in order to the inline entry `search_type` resolves
    /// to. Returns whether an entry was rewritten.
    pub fn rewrite_content<I>(&mut self, search_type: &SearchSpec, rewrites: I) -> RegistryResult<bool>
    where
        I: IntoIterator,
        I::Item: Into<Rewrite>,
    {
        let Some(position) = self.find_position(search_type)? else {
            return Ok(false);
        };

        let entry = &mut self.entries[position];
        let ScriptContent::Inline { source } = &mut entry.content else {
            tracing::debug!(target: "descript", id = %entry.id, "rewrite skipped, entry is external");
            return Ok(false);
        };

        for rewrite in rewrites {
            let rewrite: Rewrite = rewrite.into();
            *source = rewrite.apply(source);
        }

        tracing::debug!(target: "descript", id = %entry.id, "rewrote inline content");
        Ok(true)
    }

    /// Register a predicate under `name`, replacing any existing one.
    pub fn add_predicate<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&ScriptEntry, &Pattern) -> bool + Send + Sync + 'static,
    {
        self.predicates.register(name, predicate);
        self
    }

    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    /// All entries in registry order.
    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&ScriptEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn container_names(&self) -> Vec<&str> {
        self.index().names().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index(&self) -> &ContainerIndex {
        self.index
            .get_or_init(|| ContainerIndex::build(&self.entries))
    }

    fn invalidate(&mut self) {
        self.index.take();
    }

    fn view(&self, positions: &[usize]) -> Vec<&ScriptEntry> {
        positions.iter().map(|&p| &self.entries[p]).collect()
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Ids of all entries matched by any predicate/pattern pair.
    fn matching_ids(&self, search: &SearchSpec) -> RegistryResult<HashSet<EntryId>> {
        let mut matched = HashSet::new();
        for (name, patterns) in search.criteria() {
            let predicate = self
                .predicates
                .resolve(name)
                .ok_or_else(|| RegistryError::UnknownPredicate(name.to_string()))?;

            for pattern in patterns {
                matched.extend(
                    self.entries
                        .iter()
                        .filter(|e| predicate(*e, pattern))
                        .map(|e| e.id),
                );
            }
        }
        Ok(matched)
    }

    /// Reverse scan so the latest matching entry wins.
    fn find_position(&self, search_type: &SearchSpec) -> RegistryResult<Option<usize>> {
        let (name, pattern) = search_type.single_target()?;
        let predicate = self
            .predicates
            .resolve(name)
            .ok_or_else(|| RegistryError::UnknownPredicate(name.to_string()))?;

        Ok(pattern.and_then(|pattern| self.entries.iter().rposition(|e| predicate(e, pattern))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts() -> Vec<RawScript> {
        vec![
            RawScript::external("/js/a.js"),
            RawScript::inline("alert('hi');"),
            RawScript::external("/js/b.js"),
            RawScript::inline("console.log('b');"),
            RawScript::external("/js/c.js"),
        ]
    }

    fn srcs(view: &[&ScriptEntry]) -> Vec<String> {
        view.iter()
            .map(|e| e.src().or(e.source()).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_new_puts_everything_in_default() {
        let registry = ScriptRegistry::with_scripts(scripts());
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.get(DEFAULT_CONTAINER).unwrap().len(), 5);
        assert_eq!(registry.container_names(), vec![DEFAULT_CONTAINER]);
    }

    #[test]
    fn test_preserve_removes_before_exposure() {
        let options = RegistryOptions::preserve(SearchSpec::new().by_content("alert"));
        let registry = ScriptRegistry::new(scripts(), options).unwrap();

        assert_eq!(registry.len(), 4);
        assert!(!registry.exists(&SearchSpec::new().by_content("alert")).unwrap());
    }

    #[test]
    fn test_preserve_unknown_predicate_fails() {
        let options = RegistryOptions::preserve(SearchSpec::new().with("nope", "x"));
        assert!(matches!(
            ScriptRegistry::new(scripts(), options),
            Err(RegistryError::UnknownPredicate(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_assign_keeps_registry_order() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("late", &SearchSpec::new().by_reference(["c.js", "a.js"]))
            .unwrap();

        let late = registry.get("late").unwrap();
        assert_eq!(srcs(&late), vec!["/js/a.js", "/js/c.js"]);
        assert_eq!(registry.get(DEFAULT_CONTAINER).unwrap().len(), 3);
    }

    #[test]
    fn test_assign_reassigns_from_any_container() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("first", &SearchSpec::new().by_reference("a.js"))
            .unwrap()
            .assign("second", &SearchSpec::new().by_reference("a.js"))
            .unwrap();

        assert!(matches!(
            registry.get("first"),
            Err(RegistryError::ContainerNotFound(_))
        ));
        assert_eq!(registry.get("second").unwrap().len(), 1);
    }

    #[test]
    fn test_assign_overlapping_patterns_once() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("js", &SearchSpec::new().by_reference(["/js/", "a.js"]))
            .unwrap();
        assert_eq!(registry.get("js").unwrap().len(), 3);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_assign_nothing_matches() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("empty", &SearchSpec::new().by_reference("zzz"))
            .unwrap();
        assert!(registry.get("empty").is_err());
        assert_eq!(registry.get_all().len(), 1);
    }

    #[test]
    fn test_assign_requires_name() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        assert!(matches!(
            registry.assign("", &SearchSpec::new().by_reference("a")),
            Err(RegistryError::ContainerNameRequired)
        ));
    }

    #[test]
    fn test_delete_is_permanent() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .delete(&SearchSpec::new().by_reference("b.js").by_content("console"))
            .unwrap();

        assert_eq!(registry.len(), 3);
        registry
            .assign("all", &SearchSpec::new().by_reference("/js/"))
            .unwrap();
        assert_eq!(srcs(&registry.get("all").unwrap()), vec!["/js/a.js", "/js/c.js"]);
    }

    #[test]
    fn test_get_errors() {
        let registry = ScriptRegistry::with_scripts(scripts());
        assert!(matches!(registry.get(""), Err(RegistryError::ContainerNameRequired)));
        assert!(matches!(
            registry.get("nonexistent"),
            Err(RegistryError::ContainerNotFound(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn test_find_prefers_latest() {
        let registry = ScriptRegistry::with_scripts(scripts());
        let found = registry
            .find(&SearchSpec::new().by_reference("/js/"))
            .unwrap()
            .unwrap();
        assert_eq!(found.src(), Some("/js/c.js"));
    }

    #[test]
    fn test_insert_after_function() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        let id = registry
            .insert_after(
                &SearchSpec::new().by_reference("a.js"),
                ScriptPayload::function("function() { go(); }"),
            )
            .unwrap()
            .unwrap();

        let entries = registry.entries();
        assert_eq!(entries[1].id, id);
        assert_eq!(entries[1].source(), Some("(function() { go(); })();"));
        assert_eq!(entries[1].container, DEFAULT_CONTAINER);
    }

    #[test]
    fn test_insert_after_inherits_container() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("late", &SearchSpec::new().by_reference("c.js"))
            .unwrap();
        registry
            .insert_after(&SearchSpec::new().by_reference("c.js"), "/js/d.js")
            .unwrap();

        let late = registry.get("late").unwrap();
        assert_eq!(srcs(&late), vec!["/js/c.js", "/js/d.js"]);
    }

    #[test]
    fn test_insert_after_no_anchor() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        let inserted = registry
            .insert_after(&SearchSpec::new().by_reference("zzz"), "/js/d.js")
            .unwrap();
        assert!(inserted.is_none());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_rewrite_first_match_only() {
        let mut registry = ScriptRegistry::with_scripts(vec![RawScript::inline("a a a")]);
        registry
            .rewrite_content(&SearchSpec::new().by_content("a"), [("a", "b")])
            .unwrap();
        assert_eq!(registry.entries()[0].source(), Some("b a a"));

        registry
            .rewrite_content(&SearchSpec::new().by_content("a"), [Rewrite::new("a", "c").all()])
            .unwrap();
        assert_eq!(registry.entries()[0].source(), Some("b c c"));
    }

    #[test]
    fn test_rewrite_regex_captures() {
        let mut registry = ScriptRegistry::with_scripts(vec![RawScript::inline("alert('hi')")]);
        let rewrite = Rewrite::new(Pattern::regex(r"alert\((.*)\)").unwrap(), "console.log($1)");
        assert!(registry
            .rewrite_content(&SearchSpec::new().by_content("alert"), [rewrite])
            .unwrap());
        assert_eq!(registry.entries()[0].source(), Some("console.log('hi')"));
    }

    #[test]
    fn test_rewrite_skips_external() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        let rewritten = registry
            .rewrite_content(&SearchSpec::new().by_reference("a.js"), [("a", "b")])
            .unwrap();
        assert!(!rewritten);
        assert_eq!(registry.entries()[0].src(), Some("/js/a.js"));
    }

    #[test]
    fn test_rewrite_keeps_index() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        let before = registry.get_all().len();
        registry
            .rewrite_content(&SearchSpec::new().by_content("alert"), [("hi", "bye")])
            .unwrap();
        assert!(registry.index.get().is_some());
        assert_eq!(registry.get_all().len(), before);
        assert_eq!(
            registry.get(DEFAULT_CONTAINER).unwrap()[1].source(),
            Some("alert('bye');")
        );
    }

    #[test]
    fn test_structural_mutation_invalidates_index() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry.get_all();
        assert!(registry.index.get().is_some());

        registry
            .delete(&SearchSpec::new().by_reference("a.js"))
            .unwrap();
        assert!(registry.index.get().is_none());
        assert_eq!(registry.get(DEFAULT_CONTAINER).unwrap().len(), 4);
    }

    #[test]
    fn test_insert_after_refreshes_cached_view() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        registry
            .assign("head", &SearchSpec::new().by_reference(["a.js", "b.js"]))
            .unwrap();
        assert_eq!(registry.get_all()["head"].len(), 2);

        let id = registry
            .insert_after(&SearchSpec::new().by_reference("a.js"), "/js/boot.js")
            .unwrap()
            .unwrap();
        assert!(registry.index.get().is_none());

        let head = registry.get("head").unwrap();
        assert_eq!(srcs(&head), vec!["/js/a.js", "/js/boot.js", "/js/b.js"]);
        assert_eq!(head[1].id, id);
        assert_eq!(registry.get(DEFAULT_CONTAINER).unwrap().len(), 3);
    }

    #[test]
    fn test_assign_refreshes_cached_view() {
        let mut registry = ScriptRegistry::with_scripts(scripts());
        assert_eq!(registry.get_all().len(), 1);

        registry
            .assign("late", &SearchSpec::new().by_content("console"))
            .unwrap();
        assert!(registry.index.get().is_none());

        let all = registry.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(srcs(&all["late"]), vec!["console.log('b');"]);
        assert_eq!(all[DEFAULT_CONTAINER].len(), 4);
    }

    #[test]
    fn test_add_predicate_on_attributes() {
        let mut registry = ScriptRegistry::with_scripts(vec![
            RawScript::external("/a.js").with_attribute("data-script", "custom"),
            RawScript::external("/b.js"),
        ]);
        registry.add_predicate("data-script", |entry, pattern| {
            entry
                .attribute("data-script")
                .is_some_and(|value| value == pattern.as_str())
        });

        registry
            .assign("patterns", &SearchSpec::new().with("data-script", ["custom"]))
            .unwrap();
        assert_eq!(registry.get("patterns").unwrap().len(), 1);
    }

    #[test]
    fn test_invoke_once_trims() {
        assert_eq!(invoke_once("  function() {}\n"), "(function() {})();");
    }
}
