//! Taxonomy identifier injection for primary-database hits
//!
//! Pairing across chains needs to know which organism a hit came from. The
//! search tool reports that in a separate hit table, so the identifiers of
//! primary-block records are rewritten to carry a `_<taxid>/` suffix.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::a3m::{write_a3m, AlignmentRecord, ParsedAlignment};
use crate::hit_table::TaxonomyMap;

/// Identifier prefix of the primary (pairable) database
pub const PRIMARY_DB_PREFIX: &str = "UniRef100";

/// Rewrite one header if its identifier has a taxonomy entry
pub fn annotate_record(record: &AlignmentRecord, taxa: &TaxonomyMap) -> AlignmentRecord {
    if !record.header.starts_with('>') {
        return record.clone();
    }
    let identifier = record.identifier();
    let Some(taxid) = taxa.get(identifier) else {
        return record.clone();
    };

    let tagged = if identifier.starts_with(&format!("{PRIMARY_DB_PREFIX}_")) {
        format!("{identifier}_{taxid}/")
    } else {
        format!("{PRIMARY_DB_PREFIX}_{identifier}_{taxid}/")
    };
    let rest = &record.header[1 + identifier.len()..];

    AlignmentRecord {
        header: format!(">{tagged}{rest}"),
        sequence: record.sequence.clone(),
    }
}

/// Annotate the primary block of an alignment; everything after the
/// boundary passes through unchanged
pub fn annotate(parsed: &ParsedAlignment, taxa: &TaxonomyMap) -> Vec<AlignmentRecord> {
    let primary = parsed.primary_record_count();
    parsed
        .records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            if idx < primary {
                annotate_record(record, taxa)
            } else {
                record.clone()
            }
        })
        .collect()
}

/// Annotate `path` and write the result under the same file name in
/// `out_dir`. The input file is never touched.
pub fn annotate_file(path: &Path, taxa: &TaxonomyMap, out_dir: &Path) -> Result<PathBuf> {
    let parsed = ParsedAlignment::read(path)?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Alignment path has no file name: {}", path.display()))?;
    let out_path = out_dir.join(file_name);

    let annotated = annotate(&parsed, taxa);
    write_a3m(&out_path, &annotated)?;

    log::debug!(
        "Annotated {} ({} of {} records in primary block)",
        path.display(),
        parsed.primary_record_count().min(parsed.records.len()),
        parsed.records.len()
    );
    Ok(out_path)
}
