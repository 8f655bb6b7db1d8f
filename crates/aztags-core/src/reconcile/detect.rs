use std::collections::HashMap;

use crate::change::{ChangeKind, ChangeRecord, TagValue};
use crate::error::{CoreError, Result};
use crate::store::ActualState;

use super::{Classified, Reconciled, ResourceChanges};

impl Classified {
    /// Decide what happens to actual tags that no declaration mentions.
    ///
    /// An undeclared tag whose name matches a declared one ignoring case is a
    /// `SWAP`; any other undeclared tag is `DEL` when deletes are enabled and
    /// `LEAVE` otherwise. Two declared names on one resource that differ only
    /// by case are fatal.
    pub fn detect(self, store: &ActualState) -> Result<Reconciled> {
        let Classified {
            mut changes,
            scopes,
            skipped,
            change_types,
        } = self;

        let undeclared = if change_types.deletes_enabled() {
            ChangeKind::Del
        } else {
            ChangeKind::Leave
        };
        for resource in changes.resources_mut() {
            detect_resource(resource, store, undeclared)?;
        }

        Ok(Reconciled {
            changes,
            scopes,
            skipped,
            change_types,
        })
    }
}

fn detect_resource(
    resource: &mut ResourceChanges,
    store: &ActualState,
    undeclared: ChangeKind,
) -> Result<()> {
    let mut lowercase: HashMap<String, &str> = HashMap::new();
    for tag in resource.tags.keys() {
        if let Some(first) = lowercase.insert(tag.to_lowercase(), tag) {
            return Err(CoreError::duplicate_tag(resource.id.display(), first, tag));
        }
    }
    let declared: HashMap<String, String> = lowercase
        .into_iter()
        .map(|(lower, tag)| (lower, tag.to_string()))
        .collect();

    let Some(actual) = store.get(resource.id.normalized()) else {
        return Ok(());
    };
    for (tag, value) in &actual.tags {
        if resource.tags.contains_key(tag) {
            continue;
        }
        let kind = if declared.contains_key(&tag.to_lowercase()) {
            ChangeKind::Swap
        } else {
            undeclared
        };
        tracing::trace!(id = %resource.id, tag = %tag, %kind, "Undeclared tag");
        resource.tags.insert(
            tag.clone(),
            ChangeRecord::new(kind, TagValue::from_actual(value), Some(value.clone())),
        );
    }
    Ok(())
}
