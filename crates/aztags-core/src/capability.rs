//! Table of resource types that support tags.
//!
//! The table is a CSV with the header `providerName,resourceType,supportsTags`,
//! one row per resource type, as published in the resource-capabilities
//! repository.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{CoreError, Result};

/// Location of the published capability table.
pub const DEFAULT_CAPABILITY_URL: &str =
    "https://raw.githubusercontent.com/tfitzmac/resource-capabilities/master/tag-support.csv";

const EXPECTED_HEADER: [&str; 3] = ["providerName", "resourceType", "supportsTags"];

/// Whether each `provider/resourceType` (lower-cased) supports tags.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    supported: HashMap<String, bool>,
}

impl CapabilityTable {
    pub fn from_reader<R: Read>(source_name: &str, reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers()?;
        let matches = EXPECTED_HEADER
            .iter()
            .enumerate()
            .all(|(i, expected)| headers.get(i) == Some(*expected));
        if !matches {
            return Err(CoreError::unrecognized_header(
                source_name,
                format!("expected {}, found {:?}", EXPECTED_HEADER.join(","), headers),
            ));
        }

        let mut supported = HashMap::new();
        for record in csv.records() {
            let record = record?;
            let (Some(provider), Some(resource_type), Some(flag)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                continue;
            };
            let key = format!("{provider}/{resource_type}").to_lowercase();
            supported.insert(key, flag.eq_ignore_ascii_case("true"));
        }

        tracing::debug!(source = source_name, types = supported.len(), "Loaded tag capability table");
        Ok(Self { supported })
    }

    pub fn from_csv_str(source_name: &str, text: &str) -> Result<Self> {
        Self::from_reader(source_name, text.as_bytes())
    }

    /// `None` when the type is not in the table at all.
    pub fn supports_tags(&self, resource_type: &str) -> Option<bool> {
        self.supported.get(&resource_type.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.supported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}

impl FromIterator<(String, bool)> for CapabilityTable {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self {
            supported: iter
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }
}
