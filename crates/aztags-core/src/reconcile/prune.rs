use super::{Actionable, ChangeSet, Reconciled};

impl Reconciled {
    /// Keep only resources with at least one `ADD`, `UPDATE`, `DEL` or
    /// `SWAP`, together with all of their records.
    pub fn prune(&self) -> Actionable {
        let mut changes = ChangeSet::new();
        for resource in self.changes.resources().filter(|r| r.is_actionable()) {
            changes.insert_resource(resource.clone());
        }
        tracing::info!(
            before = self.changes.resource_count(),
            after = changes.resource_count(),
            "Pruned change-set"
        );
        Actionable {
            changes,
            change_types: self.change_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeKind, ChangeRecord, ChangeTypes, TagValue};
    use crate::identity::ResourceId;
    use crate::scope::ScopeTable;
    use indexmap::IndexMap;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";

    #[test]
    fn test_prune_drops_idle_resources() {
        let busy = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/busy")).unwrap();
        let idle = ResourceId::parse(&format!("/subscriptions/{SUB}/resourceGroups/idle")).unwrap();
        let keep = ChangeRecord::new(ChangeKind::NoUpdate, TagValue::Text("a".into()), Some("a".into()));

        let mut changes = ChangeSet::new();
        changes.insert(&busy, "Env", keep.clone());
        changes.insert(
            &busy,
            "Owner",
            ChangeRecord::new(ChangeKind::Add, TagValue::Text("me".into()), None),
        );
        changes.insert(&idle, "Env", keep.clone());
        changes.insert(
            &idle,
            "Old",
            ChangeRecord::new(ChangeKind::Leave, TagValue::Text("x".into()), Some("x".into())),
        );

        let reconciled = Reconciled {
            changes,
            scopes: ScopeTable::new(),
            skipped: IndexMap::new(),
            change_types: ChangeTypes::incremental(),
        };
        let actionable = reconciled.prune();

        assert_eq!(actionable.resource_count(), 1);
        let kept = actionable.changes.get(busy.normalized()).unwrap();
        assert_eq!(kept.tags.len(), 2, "non-actionable records of a kept resource stay");
        assert_eq!(reconciled.changes.resource_count(), 2, "pre-prune view is untouched");
    }
}
