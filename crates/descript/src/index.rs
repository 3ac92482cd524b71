//! Derived container index: container name to the registry positions of its
//! members, in registry order.

use std::collections::BTreeMap;

use crate::types::ScriptEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerIndex {
    groups: BTreeMap<String, Vec<usize>>,
}

impl ContainerIndex {
    /// Group entries by container. Positions within a group stay ascending.
    pub fn build(entries: &[ScriptEntry]) -> Self {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, entry) in entries.iter().enumerate() {
            groups
                .entry(entry.container.clone())
                .or_default()
                .push(position);
        }
        tracing::trace!(target: "descript", containers = groups.len(), "rebuilt container index");
        Self { groups }
    }

    pub fn get(&self, container: &str) -> Option<&[usize]> {
        self.groups.get(container).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.groups
            .iter()
            .map(|(name, positions)| (name.as_str(), positions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
