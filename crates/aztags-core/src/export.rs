//! Export of existing tags back into the tag file format.
//!
//! Exported files can be edited and fed back in as desired state; exporting
//! and re-importing against unchanged actual state yields no actionable
//! change.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;

use crate::change::{ChangeKind, TagValue};
use crate::desired::{Delimiter, ID_COLUMN, TAG_COLUMN_PREFIX};
use crate::error::{CoreError, Result};
use crate::filter::TaggabilityFilter;
use crate::reconcile::Reconciled;
use crate::store::{ActualResource, ActualState};

/// How many taggable resources carry each tag name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInventory {
    counts: IndexMap<String, usize>,
}

impl TagInventory {
    pub fn collect(store: &ActualState, filter: &TaggabilityFilter) -> Self {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for resource in store.iter().filter(|r| filter.check(r).is_taggable()) {
            for tag in resource.tags.keys() {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        for (tag, count) in &counts {
            tracing::debug!(tag = %tag, ids = count, "Existing tag");
        }
        tracing::info!(tags = counts.len(), "Collected existing tag inventory");
        Self { counts }
    }

    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(tag).copied().unwrap_or_default()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Which existing tags go into an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Every existing tag the run would manage or leave alone.
    #[default]
    All,
    /// Only tags nothing declared, i.e. those the run would delete or leave
    /// unmanaged.
    Del,
}

impl FromStr for ExportMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "del" => Ok(Self::Del),
            _ => Err(CoreError::invalid_export_mode(s)),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Del => write!(f, "del"),
        }
    }
}

/// Per-tag export file names: `BASE.<tag>.txt`. Tag names that differ only
/// by case get `.1`, `.2`, ... so they don't collide on case-insensitive
/// file systems.
pub fn per_tag_paths<'a>(
    base: &Path,
    tags: impl IntoIterator<Item = &'a str>,
) -> Vec<(String, PathBuf)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let base = base.display().to_string();
    tags.into_iter()
        .map(|tag| {
            let name = match seen.get_mut(&tag.to_lowercase()) {
                Some(n) => {
                    *n += 1;
                    format!("{base}.{tag}.{n}.txt")
                }
                None => {
                    seen.insert(tag.to_lowercase(), 0);
                    format!("{base}.{tag}.txt")
                }
            };
            (tag.to_string(), PathBuf::from(name))
        })
        .collect()
}

/// Writes existing tag values as tag files.
pub struct TagExporter<'a> {
    store: &'a ActualState,
    reconciled: &'a Reconciled,
    mode: ExportMode,
}

impl<'a> TagExporter<'a> {
    pub fn new(store: &'a ActualState, reconciled: &'a Reconciled, mode: ExportMode) -> Self {
        Self {
            store,
            reconciled,
            mode,
        }
    }

    /// Cell value for `tag` on `resource`, or `None` when it is left out.
    fn cell(&self, resource: &ActualResource, tag: &str) -> Option<String> {
        let value = resource.tag(tag)?;
        let normalized = resource.id.normalized();
        let record = self.reconciled.changes.record(normalized, tag);
        let include = match self.mode {
            ExportMode::All => {
                record.is_none_or(|r| self.reconciled.change_types.contains(r.kind))
            }
            ExportMode::Del => {
                record.is_some_and(|r| matches!(r.kind, ChangeKind::Del | ChangeKind::Leave))
                    && !self.reconciled.scopes.is_declared(normalized, tag)
            }
        };
        include.then(|| TagValue::from_actual(value).to_cell().to_string())
    }

    /// Rows for `tags`: resources with at least one exported value, ID in
    /// display form first.
    pub fn rows(&self, tags: &[String]) -> Vec<Vec<String>> {
        self.store
            .iter()
            .filter_map(|resource| {
                let cells: Vec<Option<String>> =
                    tags.iter().map(|tag| self.cell(resource, tag)).collect();
                if cells.iter().all(Option::is_none) {
                    return None;
                }
                let mut row = vec![resource.id.display().to_string()];
                row.extend(cells.into_iter().map(Option::unwrap_or_default));
                Some(row)
            })
            .collect()
    }

    /// Write `tags` to `writer`. Returns the number of rows written.
    pub fn write<W: Write>(&self, writer: W, tags: &[String], delimiter: Delimiter) -> Result<usize> {
        let rows = self.rows(tags);
        write_rows(writer, tags, &rows, delimiter)?;
        Ok(rows.len())
    }

    /// Write `tags` to `path`, creating the file only when there is at least
    /// one row. Returns the number of rows written.
    pub fn write_file(&self, path: &Path, tags: &[String]) -> Result<usize> {
        let rows = self.rows(tags);
        if rows.is_empty() {
            tracing::debug!(path = %path.display(), "No rows to export");
            return Ok(0);
        }
        tracing::info!(path = %path.display(), rows = rows.len(), "Creating tag file");
        let file = File::create(path)?;
        write_rows(file, tags, &rows, Delimiter::from_path(path))?;
        Ok(rows.len())
    }
}

fn write_rows<W: Write>(
    writer: W,
    tags: &[String],
    rows: &[Vec<String>],
    delimiter: Delimiter,
) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(delimiter.as_byte())
        .from_writer(writer);

    let mut header = vec![ID_COLUMN.to_string()];
    header.extend(tags.iter().map(|t| format!("{TAG_COLUMN_PREFIX}{t}")));
    csv.write_record(&header)?;
    for row in rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}
