//! Desired/actual reconciliation pipeline.
//!
//! Each stage is its own type so a later stage can only be produced from the
//! one before it:
//!
//! 1. [`Reconciler::classify`] merges the desired declarations with actual
//!    state into a [`Classified`] change-set.
//! 2. [`Classified::detect`] marks actual tags nobody declared (delete, leave
//!    or case swap), producing [`Reconciled`].
//! 3. [`Reconciled::prune`] drops resources with nothing to do, producing
//!    [`Actionable`]. The [`Reconciled`] view stays available for auditing
//!    and export.

mod changeset;
mod classify;
mod detect;
mod prune;

use indexmap::IndexMap;

pub use changeset::{ChangeSet, ResourceChanges};
pub use classify::Reconciler;

use crate::change::ChangeTypes;
use crate::filter::SkipReason;
use crate::identity::ResourceId;
use crate::scope::ScopeTable;

/// A declared resource that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedResource {
    pub id: ResourceId,
    pub reason: SkipReason,
}

/// Skipped resources keyed by normalized ID. A resource reached by several
/// declarations keeps the last reason recorded for it.
pub type SkipList = IndexMap<String, SkippedResource>;

/// Every declared (resource, tag) pair classified against actual state.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub changes: ChangeSet,
    pub scopes: ScopeTable,
    pub skipped: SkipList,
    pub change_types: ChangeTypes,
}

/// Classified changes plus the disposition of undeclared actual tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub changes: ChangeSet,
    pub scopes: ScopeTable,
    pub skipped: SkipList,
    pub change_types: ChangeTypes,
}

/// Only the resources with at least one actionable change.
#[derive(Debug, Clone, PartialEq)]
pub struct Actionable {
    pub changes: ChangeSet,
    pub change_types: ChangeTypes,
}

impl Actionable {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.changes.resource_count()
    }
}
