//! Resource identity parsing and normalization.
//!
//! Resource IDs are hierarchical paths:
//!
//! ```text
//! /subscriptions/{sub}                                   scope 2
//! /subscriptions/{sub}/resourceGroups/{rg}               scope 4
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/... scope >= 6
//! ```
//!
//! Resource group names are not case-sensitive in the control plane, so the
//! lookup key ("normalized" form) lower-cases that one path segment. The
//! original form is kept for display and for submitting updates.
//!
//! # Example
//!
//! ```
//! use aztags_core::identity::{ResourceId, Scope};
//!
//! let id = ResourceId::parse(
//!     "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/Web-RG",
//! )
//! .unwrap();
//! assert_eq!(
//!     id.normalized(),
//!     "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/web-rg"
//! );
//! assert_eq!(id.scope(), Scope::RESOURCE_GROUP);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, Result};

const SUBSCRIPTION_PREFIX: &str = "/subscriptions/";

/// Canonical length of a subscription identifier (a GUID).
pub const SUBSCRIPTION_ID_LEN: usize = 36;

/// Index of the resource group name within a `/`-split resource ID.
const RESOURCE_GROUP_SEGMENT: usize = 4;

/// How specific an identity is: the number of `/` in the ID.
///
/// Higher is more specific. A declaration at a resource wins over one
/// inherited from its resource group, which wins over one inherited from the
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope(u32);

impl Scope {
    pub const SUBSCRIPTION: Scope = Scope(2);
    pub const RESOURCE_GROUP: Scope = Scope(4);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Scope of a raw resource ID.
    pub fn of(id: &str) -> Self {
        Self(id.bytes().filter(|b| *b == b'/').count() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SUBSCRIPTION => write!(f, "sub"),
            Self::RESOURCE_GROUP => write!(f, "rg"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

/// Lower-case the resource group segment of a resource ID.
pub fn normalize_id(raw: &str) -> String {
    let mut segments: Vec<String> = raw.split('/').map(str::to_string).collect();
    if let Some(rg) = segments.get_mut(RESOURCE_GROUP_SEGMENT) {
        *rg = rg.to_lowercase();
    }
    segments.join("/")
}

/// Extract the subscription ID from a resource ID.
pub fn subscription_id(raw: &str) -> Result<&str> {
    let Some(rest) = raw.strip_prefix(SUBSCRIPTION_PREFIX) else {
        return Err(CoreError::malformed_identity(
            raw,
            "should start with /subscriptions/",
        ));
    };
    let sub = rest.split('/').next().unwrap_or_default();
    if sub.len() != SUBSCRIPTION_ID_LEN {
        return Err(CoreError::malformed_identity(
            raw,
            "invalid subscription id",
        ));
    }
    Ok(sub)
}

/// A resource identity tracked in both its original and normalized forms.
///
/// Equality, ordering and hashing use the normalized form only, so two IDs
/// that differ only in resource group casing are the same resource.
#[derive(Debug, Clone)]
pub struct ResourceId {
    normalized: String,
    original: String,
}

impl ResourceId {
    /// Parse a raw ID, validating that it names a subscription.
    pub fn parse(raw: &str) -> Result<Self> {
        subscription_id(raw)?;
        Ok(Self {
            normalized: normalize_id(raw),
            original: raw.to_string(),
        })
    }

    /// The pseudo-identity of a subscription.
    pub fn for_subscription(sub_id: &str) -> Result<Self> {
        Self::parse(&format!("{SUBSCRIPTION_PREFIX}{sub_id}"))
    }

    /// Replace the display form, keeping the normalized key.
    pub(crate) fn with_display(mut self, original: &str) -> Self {
        self.original = original.to_string();
        self
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// The ID as first observed in the control plane.
    pub fn display(&self) -> &str {
        &self.original
    }

    pub fn scope(&self) -> Scope {
        Scope::of(&self.normalized)
    }

    pub fn subscription(&self) -> &str {
        // Validated in parse().
        let start = SUBSCRIPTION_PREFIX.len();
        &self.normalized[start..start + SUBSCRIPTION_ID_LEN]
    }

    /// Display form relative to the subscription, e.g. `/resourceGroups/rg`.
    pub fn relative_display(&self) -> &str {
        let start = SUBSCRIPTION_PREFIX.len() + SUBSCRIPTION_ID_LEN;
        self.original.get(start..).unwrap_or_default()
    }

    /// True when `self` sits strictly below `ancestor` in the hierarchy.
    pub fn is_descendant_of(&self, ancestor: &ResourceId) -> bool {
        self.normalized
            .strip_prefix(ancestor.normalized.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
