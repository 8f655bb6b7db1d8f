//! Actual-state store: what the control plane currently reports.
//!
//! Built once from resource, resource group and subscription listings (JSON
//! documents in the shape produced by `az resource list`, `az group list` and
//! `az account show`) and read-only afterwards.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::identity::{ResourceId, normalize_id};

/// Platform-internal tag prefixes that are never managed.
pub const RESERVED_TAG_PREFIXES: [&str; 2] = ["hidden-", "link:"];

pub fn is_reserved_tag(tag: &str) -> bool {
    RESERVED_TAG_PREFIXES.iter().any(|p| tag.starts_with(p))
}

/// Which listing a JSON document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resources,
    ResourceGroups,
    /// Subscription elements carry a bare subscription GUID as `id` and no
    /// `type`.
    Subscriptions,
}

impl DocumentKind {
    fn is_subscription(self) -> bool {
        matches!(self, Self::Subscriptions)
    }
}

#[derive(Debug, Deserialize)]
struct ResourceDocument {
    id: Option<String>,
    #[serde(rename = "type")]
    resource_type: Option<String>,
    #[serde(default)]
    tags: Option<IndexMap<String, Value>>,
}

/// A resource as it exists in the control plane.
#[derive(Debug, Clone)]
pub struct ActualResource {
    pub id: ResourceId,
    /// Lower-cased `provider/resourceType`; `None` when never observed.
    pub resource_type: Option<String>,
    pub tags: IndexMap<String, String>,
    pub is_subscription: bool,
}

impl ActualResource {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Actual state keyed by normalized resource ID, in load order.
#[derive(Debug, Clone, Default)]
pub struct ActualState {
    resources: IndexMap<String, ActualResource>,
}

impl ActualState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON listing. Accepts an array of elements or a single object
    /// (as printed by `az account show`). Returns the number of elements read.
    pub fn load_json(&mut self, text: &str, kind: DocumentKind) -> Result<usize> {
        let value: Value = serde_json::from_str(text)?;
        self.add_documents(value, kind)
    }

    pub fn add_documents(&mut self, value: Value, kind: DocumentKind) -> Result<usize> {
        let elements = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let count = elements.len();
        for element in elements {
            self.add_document(element, kind)?;
        }
        tracing::debug!(?kind, count, "Loaded actual-state documents");
        Ok(count)
    }

    fn add_document(&mut self, element: Value, kind: DocumentKind) -> Result<()> {
        let rendered = element.to_string();
        let doc: ResourceDocument = serde_json::from_value(element)?;

        let Some(raw_id) = doc.id else {
            return Err(CoreError::missing_field("id", rendered));
        };
        let id = if kind.is_subscription() {
            ResourceId::for_subscription(&raw_id)?
        } else {
            ResourceId::parse(&raw_id)?
        };
        let resource_type = if kind.is_subscription() {
            None
        } else {
            match doc.resource_type {
                Some(t) => Some(t.to_lowercase()),
                None => return Err(CoreError::missing_field("type", rendered)),
            }
        };

        let entry = self
            .resources
            .entry(id.normalized().to_string())
            .or_insert_with(|| ActualResource {
                id,
                resource_type: None,
                tags: IndexMap::new(),
                is_subscription: kind.is_subscription(),
            });
        if resource_type.is_some() {
            entry.resource_type = resource_type;
        }
        for (name, value) in doc.tags.unwrap_or_default() {
            if is_reserved_tag(&name) {
                continue;
            }
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            entry.tags.insert(name, value);
        }
        Ok(())
    }

    pub fn get(&self, normalized: &str) -> Option<&ActualResource> {
        self.resources.get(normalized)
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.resources.contains_key(normalized)
    }

    /// Canonical identity for a normalized ID, falling back to the ID itself
    /// when the resource was never observed.
    pub fn resolve_id(&self, id: &ResourceId) -> ResourceId {
        match self.resources.get(id.normalized()) {
            Some(resource) => resource.id.clone(),
            None => id.clone().with_display(id.normalized()),
        }
    }

    /// Display form of a raw or normalized ID.
    pub fn display<'a>(&'a self, id: &'a str) -> &'a str {
        self.resources
            .get(&normalize_id(id))
            .map(|r| r.id.display())
            .unwrap_or(id)
    }

    /// All resources strictly below `ancestor`.
    pub fn descendants_of<'a>(
        &'a self,
        ancestor: &'a ResourceId,
    ) -> impl Iterator<Item = &'a ActualResource> + 'a {
        self.resources
            .values()
            .filter(move |r| r.id.is_descendant_of(ancestor))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActualResource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
