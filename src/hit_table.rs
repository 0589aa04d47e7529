//! Hit table (`uniref_tax.m8`) reader
//!
//! Tab-separated, no header row: query, hit identifier, taxonomy identifier,
//! then any number of further columns that are ignored.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::MsaError;

/// File name the search tool uses for its taxonomy hit table
pub const HIT_TABLE_NAME: &str = "uniref_tax.m8";

/// Immutable lookup from hit identifier to taxonomy identifier
#[derive(Debug, Clone, Default)]
pub struct TaxonomyMap {
    taxids: HashMap<String, String>,
}

impl TaxonomyMap {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open hit table: {}", path.display()))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parse a hit table; duplicated hit identifiers keep the last row
    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut taxids = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("Failed to read line {line_no} of {}", path.display()))?;
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(_query), Some(hit), Some(taxid)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(MsaError::Format {
                    path: path.to_path_buf(),
                    message: format!("hit table line {} has fewer than 3 fields", line_no + 1),
                }
                .into());
            };
            taxids.insert(hit.to_string(), taxid.to_string());
        }

        Ok(TaxonomyMap { taxids })
    }

    pub fn get(&self, hit: &str) -> Option<&str> {
        self.taxids.get(hit).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.taxids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxids.is_empty()
    }
}

impl FromIterator<(String, String)> for TaxonomyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        TaxonomyMap {
            taxids: iter.into_iter().collect(),
        }
    }
}
