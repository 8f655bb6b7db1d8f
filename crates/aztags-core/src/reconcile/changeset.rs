//! Change-set: per subscription, per resource, per tag change records.

use indexmap::IndexMap;

use crate::change::{ChangeKind, ChangeRecord};
use crate::identity::ResourceId;

/// All planned changes for one resource, keyed by tag name in the order the
/// tags were first classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChanges {
    pub id: ResourceId,
    pub tags: IndexMap<String, ChangeRecord>,
}

impl ResourceChanges {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            tags: IndexMap::new(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&ChangeRecord> {
        self.tags.get(tag)
    }

    pub fn has_kind(&self, kind: ChangeKind) -> bool {
        self.tags.values().any(|r| r.kind == kind)
    }

    pub fn is_actionable(&self) -> bool {
        self.tags.values().any(|r| r.kind.is_actionable())
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.tags.values().filter(|r| r.kind == kind).count()
    }
}

/// Change records grouped by subscription then by normalized resource ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    subscriptions: IndexMap<String, IndexMap<String, ResourceChanges>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the change for `tag` on `id`. Overwriting keeps
    /// the tag's original position.
    pub fn insert(&mut self, id: &ResourceId, tag: &str, record: ChangeRecord) {
        self.resource_entry(id)
            .tags
            .insert(tag.to_string(), record);
    }

    pub fn insert_resource(&mut self, changes: ResourceChanges) {
        self.subscriptions
            .entry(changes.id.subscription().to_string())
            .or_default()
            .insert(changes.id.normalized().to_string(), changes);
    }

    fn resource_entry(&mut self, id: &ResourceId) -> &mut ResourceChanges {
        self.subscriptions
            .entry(id.subscription().to_string())
            .or_default()
            .entry(id.normalized().to_string())
            .or_insert_with(|| ResourceChanges::new(id.clone()))
    }

    pub fn get(&self, normalized: &str) -> Option<&ResourceChanges> {
        self.subscriptions
            .values()
            .find_map(|resources| resources.get(normalized))
    }

    pub fn record(&self, normalized: &str, tag: &str) -> Option<&ChangeRecord> {
        self.get(normalized).and_then(|r| r.get(tag))
    }

    /// Subscriptions in first-seen order with their resources.
    pub fn subscriptions(
        &self,
    ) -> impl Iterator<Item = (&str, indexmap::map::Values<'_, String, ResourceChanges>)> {
        self.subscriptions
            .iter()
            .map(|(sub, resources)| (sub.as_str(), resources.values()))
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceChanges> {
        self.subscriptions.values().flat_map(|r| r.values())
    }

    pub(crate) fn resources_mut(&mut self) -> impl Iterator<Item = &mut ResourceChanges> {
        self.subscriptions.values_mut().flat_map(|r| r.values_mut())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn resource_count(&self) -> usize {
        self.subscriptions.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }

    /// Number of tag records of each kind, indexed like [`ChangeKind::ALL`].
    pub fn kind_totals(&self) -> [usize; 6] {
        let mut totals = [0; 6];
        for record in self.resources().flat_map(|r| r.tags.values()) {
            totals[record.kind.index()] += 1;
        }
        totals
    }
}
