//! Split one alignment into pairable and non-pairable hit subsets
//!
//! Primary-database hits (identifier tagged `UniRef100_`) can be paired across
//! chains by taxonomy, so they go to the pairable subset with their headers
//! normalised to `>cb|<id>|<id>_<taxid>/` (or `>cb|<id>|<id>/` when no taxonomy
//! was injected). Every other hit goes to the non-pairable subset unchanged.
//! Both subsets start with a synthetic `>query` record.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::a3m::{read_lines, write_a3m, AlignmentRecord};
use crate::error::MsaError;
use crate::taxonomy::PRIMARY_DB_PREFIX;

/// Subset holding primary-database hits
pub const PAIRABLE_SUBSET: &str = "uniref100";
/// Subset holding every other hit
pub const NON_PAIRABLE_SUBSET: &str = "mmseqs_other";

const QUERY_HEADER: &str = ">query";

/// File name a subset is stored under inside a per-query directory
pub fn subset_file_name(subset: &str) -> String {
    format!("{subset}_hits.a3m")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedAlignment {
    pub query_sequence: String,
    pub pairable: Vec<AlignmentRecord>,
    pub non_pairable: Vec<AlignmentRecord>,
}

impl PartitionedAlignment {
    /// More than the synthetic query record
    pub fn has_pairable_hits(&self) -> bool {
        self.pairable.len() > 1
    }

    pub fn has_non_pairable_hits(&self) -> bool {
        self.non_pairable.len() > 1
    }

    /// Write each non-empty subset into a freshly created `dir`. Anything
    /// left there by an earlier partition is removed first.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        clear_query_dir(dir)?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create partition directory: {}", dir.display()))?;
        if self.has_pairable_hits() {
            write_a3m(dir.join(subset_file_name(PAIRABLE_SUBSET)), &self.pairable)?;
        }
        if self.has_non_pairable_hits() {
            write_a3m(dir.join(subset_file_name(NON_PAIRABLE_SUBSET)), &self.non_pairable)?;
        }
        Ok(())
    }
}

/// Remove a per-query directory left over from an earlier run
fn clear_query_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        log::debug!("Removing stale partition directory {}", dir.display());
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove partition directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Result of partitioning one file
#[derive(Debug)]
pub enum PartitionOutcome {
    Partitioned(PartitionedAlignment),
    /// The file was unusable; the error names the marker to record
    Skipped(MsaError),
}

/// `>UniRef100_<id>[_<taxid>/][\t...]` to `>cb|<id>|<id>_<taxid>/` or `>cb|<id>|<id>/`
fn normalize_primary_header(header: &str) -> String {
    let name = header.split('\t').next().unwrap_or(header);
    let parts: Vec<&str> = name.split('_').collect();
    let id = parts.get(1).copied().unwrap_or("");
    if parts.len() == 3 {
        format!(">cb|{id}|{id}_{}", parts[2])
    } else {
        format!(">cb|{id}|{id}/")
    }
}

fn is_primary_hit(header: &str) -> bool {
    header
        .strip_prefix('>')
        .is_some_and(|name| name.starts_with(&format!("{PRIMARY_DB_PREFIX}_")))
}

/// Pair up the lines after the query. Positions in errors are line offsets
/// counted from line 2.
pub fn split_hits(lines: &[String], path: &Path) -> Result<Vec<AlignmentRecord>, MsaError> {
    let body = lines.get(2..).unwrap_or(&[]);
    let mut hits = Vec::with_capacity(body.len() / 2);

    for (pair_idx, pair) in body.chunks(2).enumerate() {
        let position = pair_idx * 2;
        let header = &pair[0];
        if !header.starts_with('>') {
            return Err(MsaError::BadHeader {
                path: path.to_path_buf(),
                position,
            });
        }
        let Some(sequence) = pair.get(1) else {
            return Err(MsaError::TruncatedRecord {
                path: path.to_path_buf(),
                position,
            });
        };
        hits.push(AlignmentRecord::new(header.as_str(), sequence.as_str()));
    }

    Ok(hits)
}

/// Classify hits and validate the result.
///
/// `query_header` is the file's own line-0 header. The first non-pairable hit
/// carrying that header is the repeated query that opens the secondary
/// database block; it duplicates the synthetic query record and is dropped.
pub fn partition_records(
    query_header: &str,
    query_sequence: &str,
    hits: &[AlignmentRecord],
    path: &Path,
) -> Result<PartitionedAlignment, MsaError> {
    let query = AlignmentRecord::new(QUERY_HEADER, query_sequence);
    let mut pairable = vec![query.clone()];
    let mut non_pairable = vec![query];

    for hit in hits {
        if is_primary_hit(&hit.header) {
            pairable.push(AlignmentRecord::new(
                normalize_primary_header(&hit.header),
                hit.sequence.as_str(),
            ));
        } else {
            non_pairable.push(hit.clone());
        }
    }

    if let Some(offset) = non_pairable[1..]
        .iter()
        .position(|record| record.header == query_header)
    {
        let duplicate = non_pairable.remove(offset + 1);
        if duplicate.sequence.trim() != query_sequence {
            return Err(MsaError::PartitionInvariant {
                path: path.to_path_buf(),
                message: format!(
                    "record {} repeats the query header with a different sequence",
                    offset + 1
                ),
            });
        }
    }

    if let Some(record) = non_pairable[1..].iter().find(|r| !r.has_description()) {
        return Err(MsaError::PartitionInvariant {
            path: path.to_path_buf(),
            message: format!("header without tab separator: {}", record.header),
        });
    }

    let partitioned = PartitionedAlignment {
        query_sequence: query_sequence.to_string(),
        pairable,
        non_pairable,
    };
    if !partitioned.has_pairable_hits() && !partitioned.has_non_pairable_hits() {
        return Err(MsaError::PartitionInvariant {
            path: path.to_path_buf(),
            message: "no pairable or non-pairable hits".to_string(),
        });
    }

    Ok(partitioned)
}

fn partition_lines(lines: &[String], path: &Path) -> Result<PartitionedAlignment, MsaError> {
    let query_header = lines.first().map(|s| s.as_str()).unwrap_or("");
    let query_sequence = lines.get(1).map(|s| s.trim()).unwrap_or("");
    if query_sequence.is_empty() {
        return Err(MsaError::EmptyQuery {
            path: path.to_path_buf(),
        });
    }

    let hits = split_hits(lines, path)?;
    partition_records(query_header, query_sequence, &hits, path)
}

/// Partition `path` and store its subsets under `out_root/<query_id>/`.
///
/// Unusable files come back as `Skipped`; invariant violations are errors.
pub fn partition_file(path: &Path, out_root: &Path, query_id: &str) -> Result<PartitionOutcome> {
    let lines = read_lines(path)?;

    let dir: PathBuf = out_root.join(query_id);
    let partitioned = match partition_lines(&lines, path) {
        Ok(partitioned) => partitioned,
        Err(err) if err.marker().is_some() => {
            log::warn!("Skipping {}: {err}", path.display());
            clear_query_dir(&dir)?;
            return Ok(PartitionOutcome::Skipped(err));
        }
        Err(err) => return Err(err.into()),
    };

    partitioned.write_to(&dir)?;

    log::debug!(
        "Partitioned {} into {}: {} pairable, {} non-pairable hits",
        path.display(),
        dir.display(),
        partitioned.pairable.len() - 1,
        partitioned.non_pairable.len() - 1
    );
    Ok(PartitionOutcome::Partitioned(partitioned))
}
