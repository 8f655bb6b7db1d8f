//! Change classifications, the operator's enabled change types, and the
//! per-tag change record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Literal used in tag files for "set this tag to an empty value".
pub const NO_VALUE: &str = ":novalue:";

/// Classification of one (resource, tag) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Tag absent on the resource and now desired.
    Add,
    /// Tag present with a different value.
    Update,
    /// Tag present with the desired value.
    NoUpdate,
    /// Tag left untouched.
    Leave,
    /// Tag not mentioned in desired state and will be removed.
    Del,
    /// Existing tag whose name differs from a desired one only by case.
    Swap,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 6] = [
        Self::Add,
        Self::Update,
        Self::NoUpdate,
        Self::Leave,
        Self::Del,
        Self::Swap,
    ];

    /// Kinds that make a resource worth submitting.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Add | Self::Update | Self::Del | Self::Swap)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::NoUpdate => "KEEP",
            Self::Leave => "LEAVE",
            Self::Del => "DEL",
            Self::Swap => "SWAP",
        }
    }

    /// Position in [`ChangeKind::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChangeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        // Entries are matched exactly apart from case: "ADD, UPDATE" is rejected.
        match s.to_ascii_uppercase().as_str() {
            "ADD" => Ok(Self::Add),
            "UPDATE" => Ok(Self::Update),
            "KEEP" | "NO_UPDATE" => Ok(Self::NoUpdate),
            "LEAVE" => Ok(Self::Leave),
            "DEL" => Ok(Self::Del),
            "SWAP" => Ok(Self::Swap),
            _ => Err(CoreError::invalid_change_types(format!("unknown type {s}"))),
        }
    }
}

/// The set of change kinds the operator wants applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeTypes {
    enabled: [bool; 6],
}

impl ChangeTypes {
    /// Add and update only; unmentioned tags are left alone.
    pub fn incremental() -> Self {
        Self::from_kinds(&[
            ChangeKind::Add,
            ChangeKind::Update,
            ChangeKind::NoUpdate,
            ChangeKind::Leave,
            ChangeKind::Swap,
        ])
    }

    /// Every change, including deleting unmentioned tags.
    pub fn all() -> Self {
        Self::from_kinds(&[
            ChangeKind::Add,
            ChangeKind::Update,
            ChangeKind::NoUpdate,
            ChangeKind::Del,
            ChangeKind::Swap,
        ])
    }

    pub fn from_kinds(kinds: &[ChangeKind]) -> Self {
        let mut enabled = [false; 6];
        for kind in kinds {
            enabled[kind.index()] = true;
        }
        Self { enabled }
    }

    /// Parse `inc`, `all`, or a comma separated list such as `ADD,UPDATE`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::invalid_change_types(
                "at least one change type must be specified",
            ));
        }
        match s.to_ascii_lowercase().as_str() {
            "all" => return Ok(Self::all()),
            "inc" => return Ok(Self::incremental()),
            _ => {}
        }

        let mut kinds = Vec::new();
        for part in s.split(',') {
            let kind: ChangeKind = part.parse()?;
            if kinds.contains(&kind) {
                return Err(CoreError::invalid_change_types(format!(
                    "duplicate type {part}"
                )));
            }
            kinds.push(kind);
        }
        Ok(Self::from_kinds(&kinds))
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        self.enabled[kind.index()]
    }

    /// Whether unmentioned tags get removed, which also switches submissions
    /// to replace semantics.
    pub fn deletes_enabled(&self) -> bool {
        self.contains(ChangeKind::Del)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ChangeKind> + '_ {
        ChangeKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl Default for ChangeTypes {
    fn default() -> Self {
        Self::incremental()
    }
}

impl FromStr for ChangeTypes {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ChangeTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.kinds().map(ChangeKind::label).collect();
        f.write_str(&labels.join(","))
    }
}

/// A tag value as declared in a tag file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagValue {
    /// Explicitly empty (`:novalue:`).
    Empty,
    Text(String),
}

impl TagValue {
    /// Parse a tag file cell. Empty cells make no statement and yield `None`;
    /// whitespace is a value like any other.
    pub fn from_cell(cell: &str) -> Option<Self> {
        if cell.is_empty() {
            None
        } else if cell == NO_VALUE {
            Some(Self::Empty)
        } else {
            Some(Self::Text(cell.to_string()))
        }
    }

    /// Wrap a value read from the control plane.
    pub fn from_actual(value: &str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }

    /// The value as submitted to the control plane.
    pub fn resolved(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Text(v) => v,
        }
    }

    /// The value as written to a tag file.
    pub fn to_cell(&self) -> &str {
        match self {
            Self::Empty => NO_VALUE,
            Self::Text(v) => v,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resolved())
    }
}

/// Planned outcome for one tag on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// Desired value, or the actual value for tags nobody declared.
    pub value: TagValue,
    /// Value currently in the control plane, if the tag exists.
    pub current: Option<String>,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, value: TagValue, current: Option<String>) -> Self {
        Self {
            kind,
            value,
            current,
        }
    }

    /// The value being replaced, shown for updates.
    pub fn previous(&self) -> Option<&str> {
        match self.kind {
            ChangeKind::Update => self.current.as_deref(),
            _ => None,
        }
    }

    /// Value to send when this record is included in a submission, or `None`
    /// when the tag must not be sent.
    ///
    /// `LEAVE` records keep whatever is currently set, even when the record
    /// carries a different intended value for audit purposes.
    pub fn submitted_value(&self) -> Option<&str> {
        match self.kind {
            ChangeKind::Add | ChangeKind::Update | ChangeKind::NoUpdate => {
                Some(self.value.resolved())
            }
            ChangeKind::Leave | ChangeKind::Del | ChangeKind::Swap => self.current.as_deref(),
        }
    }
}
