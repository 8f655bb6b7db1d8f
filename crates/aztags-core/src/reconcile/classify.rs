use std::collections::BTreeMap;

use crate::change::{ChangeKind, ChangeRecord, ChangeTypes, TagValue};
use crate::desired::{Declaration, DesiredSource, DesiredState};
use crate::error::Result;
use crate::filter::{SkipReason, Taggability, TaggabilityFilter};
use crate::identity::{ResourceId, Scope};
use crate::scope::ScopeTable;
use crate::store::ActualState;

use super::{ChangeSet, Classified, SkipList, SkippedResource};

/// Classifies desired declarations against actual state.
pub struct Reconciler<'a> {
    store: &'a ActualState,
    filter: &'a TaggabilityFilter,
    change_types: ChangeTypes,
}

struct Pass<'a> {
    store: &'a ActualState,
    filter: &'a TaggabilityFilter,
    change_types: ChangeTypes,
    changes: ChangeSet,
    scopes: ScopeTable,
    skipped: SkipList,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a ActualState, filter: &'a TaggabilityFilter, change_types: ChangeTypes) -> Self {
        Self {
            store,
            filter,
            change_types,
        }
    }

    /// Classify every declaration in `desired`.
    ///
    /// Sources are processed in order. Within a source, subscriptions are
    /// visited in sorted order, tags in column order, and declarations of one
    /// tag sorted by value then normalized ID; repeated identical
    /// declarations collapse to one. The result is deterministic for a given
    /// input.
    pub fn classify(&self, desired: &DesiredState) -> Result<Classified> {
        let mut pass = Pass {
            store: self.store,
            filter: self.filter,
            change_types: self.change_types,
            changes: ChangeSet::new(),
            scopes: ScopeTable::new(),
            skipped: SkipList::new(),
        };
        for source in &desired.sources {
            pass.source(source)?;
        }

        tracing::info!(
            resources = pass.changes.resource_count(),
            skipped = pass.skipped.len(),
            "Classified tag declarations"
        );
        Ok(Classified {
            changes: pass.changes,
            scopes: pass.scopes,
            skipped: pass.skipped,
            change_types: self.change_types,
        })
    }
}

impl Pass<'_> {
    fn source(&mut self, source: &DesiredSource) -> Result<()> {
        let mut by_subscription: BTreeMap<&str, Vec<&Declaration>> = BTreeMap::new();
        for declaration in &source.declarations {
            by_subscription
                .entry(declaration.id.subscription())
                .or_default()
                .push(declaration);
        }

        for (sub, declarations) in by_subscription {
            tracing::debug!(source = %source.name, subscription = sub, "Classifying subscription");
            for tag in &source.tags {
                let mut for_tag: Vec<&Declaration> =
                    declarations.iter().copied().filter(|d| &d.tag == tag).collect();
                for_tag.sort_by(|a, b| {
                    (a.value.to_cell(), a.id.normalized()).cmp(&(b.value.to_cell(), b.id.normalized()))
                });
                for_tag.dedup_by(|a, b| a.value == b.value && a.id == b.id);

                for declaration in for_tag {
                    self.declaration(declaration, source.inherit)?;
                }
            }
        }
        Ok(())
    }

    fn declaration(&mut self, declaration: &Declaration, inherit: bool) -> Result<()> {
        let scope = declaration.id.scope();
        self.pair(&declaration.id, scope, &declaration.tag, &declaration.value)?;

        if inherit {
            let children: Vec<ResourceId> = self
                .store
                .descendants_of(&declaration.id)
                .map(|r| r.id.clone())
                .collect();
            for child in &children {
                self.pair(child, scope, &declaration.tag, &declaration.value)?;
            }
        }
        Ok(())
    }

    /// Classify one (resource, tag) pair at the declaring scope.
    fn pair(&mut self, target: &ResourceId, scope: Scope, tag: &str, value: &TagValue) -> Result<()> {
        let store = self.store;
        let Some(resource) = store.get(target.normalized()) else {
            self.skip(store.resolve_id(target), SkipReason::DoesNotExist);
            return Ok(());
        };
        if let Taggability::Skip(reason) = self.filter.check(resource) {
            self.skip(resource.id.clone(), reason);
            return Ok(());
        }
        if !self.scopes.resolve(&resource.id, tag, scope)? {
            return Ok(());
        }

        let current = resource.tag(tag);
        let kind = match current {
            None => ChangeKind::Add,
            Some(actual) if actual == value.resolved() => ChangeKind::NoUpdate,
            Some(_) => ChangeKind::Update,
        };
        let kind = if self.change_types.contains(kind) {
            kind
        } else {
            ChangeKind::Leave
        };

        let record = ChangeRecord::new(kind, value.clone(), current.map(str::to_string));
        self.changes.insert(&resource.id, tag, record);
        Ok(())
    }

    fn skip(&mut self, id: ResourceId, reason: SkipReason) {
        self.skipped
            .insert(id.normalized().to_string(), SkippedResource { id, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityTable;
    use crate::desired::Delimiter;
    use crate::filter::{ExclusionSet, FilterPolicy};
    use crate::store::DocumentKind;
    use serde_json::json;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";

    fn store() -> ActualState {
        let mut state = ActualState::new();
        state
            .add_documents(
                json!([
                    {"id": format!("/subscriptions/{SUB}/resourceGroups/Web"),
                     "type": "Microsoft.Resources/resourceGroups",
                     "tags": {"Env": "prod"}},
                    {"id": format!("/subscriptions/{SUB}/resourceGroups/Web/providers/Microsoft.Web/sites/app"),
                     "type": "Microsoft.Web/sites",
                     "tags": {"Env": "dev"}}
                ]),
                DocumentKind::Resources,
            )
            .unwrap();
        state
    }

    fn filter() -> TaggabilityFilter {
        let capabilities: CapabilityTable = [
            ("microsoft.resources/resourcegroups".to_string(), true),
            ("microsoft.web/sites".to_string(), true),
        ]
        .into_iter()
        .collect();
        TaggabilityFilter::new(FilterPolicy::default(), ExclusionSet::new(), capabilities)
    }

    fn source(text: &str, inherit: bool) -> DesiredSource {
        DesiredSource::from_reader("test", text.as_bytes(), Delimiter::Pipe, inherit).unwrap()
    }

    #[test]
    fn test_classification_kinds() {
        let store = store();
        let filter = filter();
        let desired = DesiredState::new(vec![source(
            &format!(
                "id|tags.Env|tags.Owner\n/subscriptions/{SUB}/resourceGroups/web|prod|ops\n"
            ),
            false,
        )]);
        let classified = Reconciler::new(&store, &filter, ChangeTypes::incremental())
            .classify(&desired)
            .unwrap();

        let rg = classified
            .changes
            .get(&format!("/subscriptions/{SUB}/resourceGroups/web"))
            .unwrap();
        assert_eq!(rg.id.display(), format!("/subscriptions/{SUB}/resourceGroups/Web"));
        assert_eq!(rg.get("Env").unwrap().kind, ChangeKind::NoUpdate);
        assert_eq!(rg.get("Owner").unwrap().kind, ChangeKind::Add);
    }

    #[test]
    fn test_disabled_kind_becomes_leave() {
        let store = store();
        let filter = filter();
        let desired = DesiredState::new(vec![source(
            &format!("id|tags.Env\n/subscriptions/{SUB}/resourceGroups/Web|test\n"),
            false,
        )]);
        let classified = Reconciler::new(&store, &filter, ChangeTypes::parse("ADD").unwrap())
            .classify(&desired)
            .unwrap();
        let record = classified
            .changes
            .record(&format!("/subscriptions/{SUB}/resourceGroups/web"), "Env")
            .unwrap();
        assert_eq!(record.kind, ChangeKind::Leave);
        assert_eq!(record.value, TagValue::Text("test".into()));
        assert_eq!(record.submitted_value(), Some("prod"));
    }

    #[test]
    fn test_inherit_fans_out_to_children() {
        let store = store();
        let filter = filter();
        let desired = DesiredState::new(vec![source(
            &format!("id|tags.Env\n/subscriptions/{SUB}/resourceGroups/Web|prod\n"),
            true,
        )]);
        let classified = Reconciler::new(&store, &filter, ChangeTypes::incremental())
            .classify(&desired)
            .unwrap();
        let site = format!("/subscriptions/{SUB}/resourceGroups/web/providers/Microsoft.Web/sites/app");
        let record = classified.changes.record(&site, "Env").unwrap();
        assert_eq!(record.kind, ChangeKind::Update);
        assert_eq!(record.previous(), Some("dev"));
        assert_eq!(classified.scopes.get(&site, "Env"), Some(Scope::RESOURCE_GROUP));
    }

    #[test]
    fn test_missing_resource_is_skipped() {
        let store = store();
        let filter = filter();
        let desired = DesiredState::new(vec![source(
            &format!("id|tags.Env\n/subscriptions/{SUB}/resourceGroups/Gone|prod\n"),
            false,
        )]);
        let classified = Reconciler::new(&store, &filter, ChangeTypes::incremental())
            .classify(&desired)
            .unwrap();
        assert!(classified.changes.is_empty());
        let skipped = classified
            .skipped
            .get(&format!("/subscriptions/{SUB}/resourceGroups/gone"))
            .unwrap();
        assert_eq!(skipped.reason, SkipReason::DoesNotExist);
    }

    #[test]
    fn test_identical_declarations_collapse() {
        let store = store();
        let filter = filter();
        let desired = DesiredState::new(vec![source(
            &format!(
                "id|tags.Env\n/subscriptions/{SUB}/resourceGroups/Web|prod\n/subscriptions/{SUB}/resourceGroups/web|prod\n"
            ),
            false,
        )]);
        assert!(
            Reconciler::new(&store, &filter, ChangeTypes::incremental())
                .classify(&desired)
                .is_ok()
        );
    }
}
