//! Precedence table for tag declarations.
//!
//! Every declaration that reaches a (resource, tag) pair, directly or through
//! inheritance, goes through [`ScopeTable::resolve`] before anything is
//! recorded for that pair. The table keeps the specificity of the winning
//! declaration so far.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::identity::{ResourceId, Scope};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeTable {
    winners: HashMap<(String, String), Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a declaration at `candidate` specificity takes effect
    /// for (`id`, `tag`).
    ///
    /// Returns `Ok(false)` when a more specific declaration already won and
    /// `Ok(true)` when the candidate is recorded as the new winner. Two
    /// declarations at the same specificity have no tie-break and fail with
    /// [`CoreError::AmbiguousDeclaration`].
    pub fn resolve(&mut self, id: &ResourceId, tag: &str, candidate: Scope) -> Result<bool> {
        let key = (id.normalized().to_string(), tag.to_string());
        match self.winners.get(&key) {
            Some(recorded) if *recorded > candidate => Ok(false),
            Some(recorded) if *recorded == candidate => Err(CoreError::ambiguous_declaration(
                id.display(),
                candidate,
                tag,
            )),
            _ => {
                self.winners.insert(key, candidate);
                Ok(true)
            }
        }
    }

    /// Winning specificity for (`normalized`, `tag`), if any declaration won.
    pub fn get(&self, normalized: &str, tag: &str) -> Option<Scope> {
        self.winners
            .get(&(normalized.to_string(), tag.to_string()))
            .copied()
    }

    /// Whether any declaration reached (`normalized`, `tag`).
    pub fn is_declared(&self, normalized: &str, tag: &str) -> bool {
        self.get(normalized, tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}
