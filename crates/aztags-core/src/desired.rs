//! Desired-state tag files.
//!
//! A tag file is delimited text with an `id` column and any number of
//! `tags.<name>` columns. Other columns are ignored. A blank cell makes no
//! statement about that tag; `:novalue:` sets it to an empty value. Files
//! whose name starts with `inherit` apply their declarations to every resource
//! below the declared ID as well.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::change::TagValue;
use crate::error::{CoreError, Result};
use crate::identity::ResourceId;

pub const ID_COLUMN: &str = "id";
pub const TAG_COLUMN_PREFIX: &str = "tags.";
pub const RESERVED_COLUMNS: [&str; 2] = ["x_sub_id", "x_case_sensitive_id"];
const INHERIT_PREFIX: &str = "inherit";

/// Field delimiter of a tag file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Pipe,
    Tab,
    Comma,
}

impl Delimiter {
    /// Detect from the file extension: `.txt` pipe, `.tsv` tab, `.csv` comma,
    /// pipe otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") => Self::Tab,
            Some("csv") => Self::Comma,
            _ => Self::Pipe,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Pipe => b'|',
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }
}

/// Whether declarations from this file are inherited by child resources.
pub fn is_inherit_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().starts_with(INHERIT_PREFIX))
}

/// One tag value declared for one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: ResourceId,
    pub tag: String,
    pub value: TagValue,
}

/// All declarations read from one tag file.
#[derive(Debug, Clone)]
pub struct DesiredSource {
    pub name: String,
    pub inherit: bool,
    /// Tag names in column order.
    pub tags: Vec<String>,
    pub declarations: Vec<Declaration>,
    pub id_count: usize,
}

impl DesiredSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(
            &path.display().to_string(),
            file,
            Delimiter::from_path(path),
            is_inherit_source(path),
        )
    }

    pub fn from_reader<R: Read>(
        name: &str,
        reader: R,
        delimiter: Delimiter,
        inherit: bool,
    ) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        let Some(id_index) = headers.iter().position(|h| h == ID_COLUMN) else {
            return Err(CoreError::unrecognized_header(
                name,
                format!("could not find id in header {headers:?}"),
            ));
        };
        if let Some(reserved) = headers.iter().find(|h| RESERVED_COLUMNS.contains(h)) {
            return Err(CoreError::reserved_column(name, reserved));
        }

        let tag_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.strip_prefix(TAG_COLUMN_PREFIX).map(|t| (i, t.to_string())))
            .collect();

        let mut declarations = Vec::new();
        let mut id_count = 0;
        for record in csv.records() {
            let record = record?;
            let raw_id = record.get(id_index).unwrap_or_default();
            let id = ResourceId::parse(raw_id)?;
            id_count += 1;
            for (index, tag) in &tag_columns {
                if let Some(value) = TagValue::from_cell(record.get(*index).unwrap_or_default()) {
                    declarations.push(Declaration {
                        id: id.clone(),
                        tag: tag.clone(),
                        value,
                    });
                }
            }
        }

        tracing::info!(
            source = name,
            inherit,
            ids = id_count,
            tag_types = tag_columns.len(),
            "Parsed tag file"
        );

        Ok(Self {
            name: name.to_string(),
            inherit,
            tags: tag_columns.into_iter().map(|(_, t)| t).collect(),
            declarations,
            id_count,
        })
    }

    /// Subscription IDs referenced by this file.
    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.declarations
            .iter()
            .map(|d| d.id.subscription().to_string())
            .collect()
    }
}

/// Desired state assembled from one or more tag files, in input order.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub sources: Vec<DesiredSource>,
}

impl DesiredState {
    pub fn new(sources: Vec<DesiredSource>) -> Self {
        Self { sources }
    }

    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        tracing::info!(count = paths.len(), "Parsing tag file(s)");
        let sources = paths
            .iter()
            .map(|p| DesiredSource::from_path(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources })
    }

    pub fn push(&mut self, source: DesiredSource) {
        self.sources.push(source);
    }

    /// Every subscription referenced by any file.
    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.sources.iter().flat_map(|s| s.subscriptions()).collect()
    }
}
