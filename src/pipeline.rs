//! One run over a fold-input document
//!
//! search -> (taxonomy annotation) -> partitioning -> registry side file ->
//! assembly. Partitioning and assembly are also exposed separately so they
//! can run as independent invocations over an existing search output.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::chain_registry::{ChainRegistry, CHAIN_SEQ_FILE};
use crate::error::MsaError;
use crate::fold_input::{assemble, AssemblerConfig, FoldInput};
use crate::hit_table::{TaxonomyMap, HIT_TABLE_NAME};
use crate::partition::{partition_file, PartitionOutcome};
use crate::search::SearchTool;
use crate::taxonomy::annotate_file;

/// Inputs and outputs of a full run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_json: PathBuf,
    pub output_json_dir: PathBuf,
    pub output_msa_dir: PathBuf,
    pub add_toxid: bool,
    pub assembler: AssemblerConfig,
}

/// What the partitioning phase produced
#[derive(Debug, Default)]
pub struct PartitionSummary {
    pub registry: ChainRegistry,
    /// Marker files written for skipped inputs
    pub markers: Vec<PathBuf>,
}

/// `*.a3m` files directly inside `dir`, sorted by file name so that
/// per-query IDs do not depend on directory listing order
pub fn list_alignment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list alignment directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_a3m = path.extension().and_then(|ext| ext.to_str()) == Some("a3m");
        if is_a3m && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Marker name prefix: the file name up to its first '.'
pub fn marker_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Record a per-file failure as an empty `<stem>-<marker>` file
pub fn write_marker(log_dir: &Path, source: &Path, marker: &str) -> Result<PathBuf> {
    let path = log_dir.join(format!("{}-{marker}", marker_stem(source)));
    File::create(&path).with_context(|| format!("Failed to write marker: {}", path.display()))?;
    Ok(path)
}

fn is_marker_reason(reason: &str) -> bool {
    let numbered = |prefix: &str| {
        reason
            .strip_prefix(prefix)
            .is_some_and(|pos| !pos.is_empty() && pos.bytes().all(|b| b.is_ascii_digit()))
    };
    reason == "empty_query_seq" || numbered("bad_header_") || numbered("truncated_record_")
}

/// Remove marker files an earlier run left in `log_dir` for any of `files`
pub fn clear_stale_markers(log_dir: &Path, files: &[PathBuf]) -> Result<()> {
    let stems: HashSet<String> = files.iter().map(|f| marker_stem(f)).collect();
    let entries = std::fs::read_dir(log_dir)
        .with_context(|| format!("Failed to list marker directory: {}", log_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let stale = name
            .rsplit_once('-')
            .is_some_and(|(stem, reason)| stems.contains(stem) && is_marker_reason(reason));
        if stale && path.is_file() {
            log::debug!("Removing stale marker {}", path.display());
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove marker: {}", path.display()))?;
        }
    }
    Ok(())
}

/// Decide whether taxonomy enrichment is used for this document
pub fn check_chain_count(input: &FoldInput, add_toxid: bool) -> Result<bool> {
    let num_chains = input.protein_chains().count();
    match num_chains {
        0 => Err(MsaError::Format {
            path: PathBuf::from(&input.name),
            message: "no protein chains in fold input".to_string(),
        }
        .into()),
        1 if add_toxid => {
            log::warn!(
                "Monomer found in {}, taxonomy enrichment is not needed for monomers",
                input.name
            );
            Ok(true)
        }
        n if n > 1 && !add_toxid => {
            log::warn!(
                "Multimer found in {} ({n} protein chains), enabling taxonomy enrichment",
                input.name
            );
            Ok(true)
        }
        _ => Ok(add_toxid),
    }
}

/// Annotate every file into `out_dir`, preserving order
pub fn annotate_all(files: &[PathBuf], taxa: &TaxonomyMap, out_dir: &Path) -> Result<Vec<PathBuf>> {
    files
        .par_iter()
        .map(|path| annotate_file(path, taxa, out_dir))
        .collect()
}

/// Partition every file, writing subsets and markers under `msa_root`.
///
/// The per-query ID of a file is its position in `files`. Files are
/// processed in parallel; the registry is filled afterwards in order.
pub fn partition_all(files: &[PathBuf], msa_root: &Path) -> Result<PartitionSummary> {
    clear_stale_markers(msa_root, files)?;

    let outcomes: Vec<PartitionOutcome> = files
        .par_iter()
        .enumerate()
        .map(|(idx, path)| partition_file(path, msa_root, &idx.to_string()))
        .collect::<Result<_>>()?;

    let mut summary = PartitionSummary::default();
    for (idx, (path, outcome)) in files.iter().zip(outcomes).enumerate() {
        match outcome {
            PartitionOutcome::Partitioned(partitioned) => {
                summary
                    .registry
                    .register(idx.to_string(), partitioned.query_sequence);
            }
            PartitionOutcome::Skipped(reason) => {
                if let Some(marker) = reason.marker() {
                    summary.markers.push(write_marker(msa_root, path, &marker)?);
                }
            }
        }
    }

    log::info!(
        "Partitioned {} of {} alignment files ({} skipped)",
        summary.registry.len(),
        files.len(),
        summary.markers.len()
    );
    Ok(summary)
}

/// Partition the search output in `msa_dir` and save the registry side file.
///
/// With `add_toxid`, alignments are first annotated from the hit table into
/// a scratch directory that is removed afterwards.
pub fn partition_search_output(msa_dir: &Path, add_toxid: bool) -> Result<PartitionSummary> {
    let files = list_alignment_files(msa_dir)?;
    if files.is_empty() {
        bail!("No .a3m files found in {}", msa_dir.display());
    }
    log::info!("Found {} alignment files in {}", files.len(), msa_dir.display());

    let summary = if add_toxid {
        let taxa = TaxonomyMap::read(msa_dir.join(HIT_TABLE_NAME))?;
        log::info!("Loaded {} taxonomy assignments", taxa.len());

        let scratch = TempDir::new().context("Failed to create scratch directory")?;
        let annotated = annotate_all(&files, &taxa, scratch.path())?;
        partition_all(&annotated, msa_dir)?
    } else {
        partition_all(&files, msa_dir)?
    };

    let side_file = msa_dir.join(CHAIN_SEQ_FILE);
    summary.registry.save(&side_file)?;
    log::info!("Wrote chain registry to {}", side_file.display());
    Ok(summary)
}

/// Assemble the final document from a partitioned alignment directory
pub fn assemble_document(
    input_json: &Path,
    msa_dir: &Path,
    output_json_dir: &Path,
    config: &AssemblerConfig,
) -> Result<PathBuf> {
    let registry = ChainRegistry::load(msa_dir.join(CHAIN_SEQ_FILE))?;
    let input = FoldInput::read(input_json)?;
    let output = assemble(&input, &registry, msa_dir, config)?;

    std::fs::create_dir_all(output_json_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_json_dir.display())
    })?;
    let path = output.write_to_dir(output_json_dir)?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}

/// Full run: query FASTA, search, partition, assemble
pub fn run(options: &RunOptions, search: &dyn SearchTool) -> Result<PathBuf> {
    let input = FoldInput::read(&options.input_json)?;
    let add_toxid = check_chain_count(&input, options.add_toxid)?;

    std::fs::create_dir_all(&options.output_msa_dir).with_context(|| {
        format!("Failed to create MSA directory: {}", options.output_msa_dir.display())
    })?;
    let query_fasta = options.output_msa_dir.join(format!("{}.fasta", input.name));
    let num_queries = input.write_query_fasta(&query_fasta)?;
    log::info!(
        "Searching {num_queries} distinct protein sequences for {}",
        input.name
    );

    search.search(&query_fasta, &options.output_msa_dir, add_toxid)?;
    partition_search_output(&options.output_msa_dir, add_toxid)?;

    assemble_document(
        &options.input_json,
        &options.output_msa_dir,
        &options.output_json_dir,
        &options.assembler,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["2.a3m", "10.a3m", "0.a3m", "q.fasta", "uniref_tax.m8"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("1.a3m")).unwrap();

        let names: Vec<String> = list_alignment_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0.a3m", "10.a3m", "2.a3m"]);
    }

    #[test]
    fn test_marker_stem() {
        assert_eq!(marker_stem(Path::new("/out/101.a3m")), "101");
        assert_eq!(marker_stem(Path::new("a.b.a3m")), "a");
        assert_eq!(marker_stem(Path::new("plain")), "plain");
    }

    fn doc(chains: usize) -> FoldInput {
        let sequences: Vec<_> = (0..chains)
            .map(|i| json!({"protein": {"id": format!("{i}"), "sequence": "MKT"}}))
            .collect();
        serde_json::from_value(json!({"name": "x", "sequences": sequences})).unwrap()
    }

    #[test]
    fn test_chain_count_policy() {
        assert!(check_chain_count(&doc(0), false).is_err());
        assert!(!check_chain_count(&doc(1), false).unwrap());
        assert!(check_chain_count(&doc(1), true).unwrap());
        assert!(check_chain_count(&doc(2), false).unwrap());
    }

    #[test]
    fn test_partition_all_assigns_ids_by_position() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("0.a3m");
        let b = dir.path().join("1.a3m");
        let c = dir.path().join("2.a3m");
        std::fs::write(&a, ">101\nMKT\n>UniRef100_X\t1\nMKS\n").unwrap();
        std::fs::write(&b, ">102\n\n").unwrap();
        std::fs::write(&c, ">103\nGSH\n>env\t1\nGSA\n").unwrap();

        let summary = partition_all(&[a, b, c], dir.path()).unwrap();
        assert_eq!(summary.registry.len(), 2);
        assert_eq!(summary.registry.resolve_by_sequence("MKT"), Some("0"));
        assert_eq!(summary.registry.resolve_by_sequence("GSH"), Some("2"));
        assert_eq!(summary.markers, vec![dir.path().join("1-empty_query_seq")]);
        assert!(dir.path().join("1-empty_query_seq").exists());
        assert!(!dir.path().join("1").exists());
    }

    #[test]
    fn test_rerun_clears_markers_of_enumerated_files_only() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("0.a3m");
        std::fs::write(&a, ">101\nMKT\n>env\t1\nMKS\n").unwrap();
        for name in ["0-empty_query_seq", "0-bad_header_4", "7-empty_query_seq", "0-notes"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let summary = partition_all(&[a], dir.path()).unwrap();
        assert!(summary.markers.is_empty());
        assert!(!dir.path().join("0-empty_query_seq").exists());
        assert!(!dir.path().join("0-bad_header_4").exists());
        assert!(dir.path().join("7-empty_query_seq").exists());
        assert!(dir.path().join("0-notes").exists());
    }
}
