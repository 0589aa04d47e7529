//! Fold-input documents and MSA assembly
//!
//! The document is the structure-prediction model's JSON input. Only the
//! `unpairedMsa`, `pairedMsa` and `templates` fields of protein entries are
//! owned here; every other field is carried through the flattened maps.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::chain_registry::ChainRegistry;
use crate::partition::{subset_file_name, NON_PAIRABLE_SUBSET, PAIRABLE_SUBSET};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldInput {
    pub name: String,
    pub sequences: Vec<SequenceEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `sequences`; non-protein entities live in `other`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<ProteinChain>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinChain {
    /// A single chain ID or a list of IDs sharing this sequence
    pub id: Value,
    pub sequence: String,
    #[serde(rename = "unpairedMsa", default, skip_serializing_if = "Option::is_none")]
    pub unpaired_msa: Option<String>,
    #[serde(rename = "pairedMsa", default, skip_serializing_if = "Option::is_none")]
    pub paired_msa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProteinChain {
    /// Chain ID as text; lists are joined with '_'
    pub fn label(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            Value::Array(ids) => ids
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("_"),
            other => other.to_string(),
        }
    }
}

impl FoldInput {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open fold input: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse fold input: {}", path.display()))
    }

    pub fn protein_chains(&self) -> impl Iterator<Item = &ProteinChain> {
        self.sequences.iter().filter_map(|entry| entry.protein.as_ref())
    }

    /// File name the assembled document is written under
    pub fn output_file_name(&self) -> String {
        format!("{}_data.json", self.name)
    }

    /// Write the search query FASTA: one record per distinct protein
    /// sequence, in document order. Returns the number of records written.
    pub fn write_query_fasta<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create query FASTA: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut seen = HashSet::new();
        for chain in self.protein_chains() {
            if !seen.insert(chain.sequence.as_str()) {
                continue;
            }
            writeln!(writer, ">{}_{}", self.name, chain.label())?;
            writeln!(writer, "{}", chain.sequence)?;
        }
        writer.flush()?;
        Ok(seen.len())
    }

    /// Write pretty JSON to `<dir>/<name>_data.json`
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.output_file_name());
        let file = File::create(&path)
            .with_context(|| format!("Failed to create fold input: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(path)
    }
}

/// Which subsets feed the paired and unpaired fields
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub unpaired_subsets: Vec<String>,
    pub paired_subsets: Vec<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            unpaired_subsets: vec![PAIRABLE_SUBSET.to_string(), NON_PAIRABLE_SUBSET.to_string()],
            paired_subsets: vec![PAIRABLE_SUBSET.to_string()],
        }
    }
}

/// Concatenate the subset files that exist in `dir`, with tabs flattened
/// to spaces
pub fn concat_subsets(dir: &Path, subsets: &[String]) -> Result<String> {
    let mut msa = String::new();
    for subset in subsets {
        let path = dir.join(subset_file_name(subset));
        if !path.exists() {
            log::debug!("No {subset} subset at {}", path.display());
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read subset: {}", path.display()))?;
        msa.push_str(&text);
    }
    Ok(msa.replace('\t', " "))
}

/// Fill the MSA fields of every protein chain from its partition
/// directory under `msa_dir`. The input document is left untouched.
pub fn assemble(
    input: &FoldInput,
    registry: &ChainRegistry,
    msa_dir: &Path,
    config: &AssemblerConfig,
) -> Result<FoldInput> {
    let mut output = input.clone();

    for protein in output
        .sequences
        .iter_mut()
        .filter_map(|entry| entry.protein.as_mut())
    {
        let query_id = registry.resolve_chain(&protein.label(), &protein.sequence)?;
        let chain_dir = msa_dir.join(query_id);

        protein.unpaired_msa = Some(concat_subsets(&chain_dir, &config.unpaired_subsets)?);
        protein.paired_msa = Some(concat_subsets(&chain_dir, &config.paired_subsets)?);
        protein.templates = Some(Vec::new());

        log::debug!(
            "Chain {} -> query {query_id}: {} unpaired bytes, {} paired bytes",
            protein.label(),
            protein.unpaired_msa.as_ref().map_or(0, String::len),
            protein.paired_msa.as_ref().map_or(0, String::len)
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MsaError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc() -> FoldInput {
        serde_json::from_value(json!({
            "name": "complex",
            "modelSeeds": [1],
            "sequences": [
                {"protein": {"id": "A", "sequence": "MKTAYIAK", "modifications": []}},
                {"ligand": {"id": "L", "ccdCodes": ["ATP"]}},
                {"protein": {"id": ["B", "C"], "sequence": "GSHMLE"}}
            ],
            "dialect": "alphafold3",
            "version": 1
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let input = doc();
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["modelSeeds"], json!([1]));
        assert_eq!(value["sequences"][0]["protein"]["modifications"], json!([]));
        assert_eq!(value["sequences"][1], json!({"ligand": {"id": "L", "ccdCodes": ["ATP"]}}));
        assert!(value["sequences"][0]["protein"].get("pairedMsa").is_none());
    }

    #[test]
    fn test_chain_labels() {
        let input = doc();
        let labels: Vec<String> = input.protein_chains().map(ProteinChain::label).collect();
        assert_eq!(labels, vec!["A".to_string(), "B_C".to_string()]);
    }

    #[test]
    fn test_query_fasta_deduplicates_sequences() {
        let dir = TempDir::new().unwrap();
        let mut input = doc();
        input.sequences.push(SequenceEntry {
            protein: Some(ProteinChain {
                id: json!("D"),
                sequence: "MKTAYIAK".to_string(),
                unpaired_msa: None,
                paired_msa: None,
                templates: None,
                extra: Map::new(),
            }),
            other: Map::new(),
        });

        let path = dir.path().join("complex.fasta");
        assert_eq!(input.write_query_fasta(&path).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            ">complex_A\nMKTAYIAK\n>complex_B_C\nGSHMLE\n"
        );
    }

    #[test]
    fn test_assemble_fills_fields_and_strips_tabs() {
        let dir = TempDir::new().unwrap();
        let chain0 = dir.path().join("0");
        std::fs::create_dir_all(&chain0).unwrap();
        std::fs::write(chain0.join("uniref100_hits.a3m"), ">query\nMKTAYIAK\n>cb|X|X/\nMKTAYLAK\n")
            .unwrap();
        std::fs::write(
            chain0.join("mmseqs_other_hits.a3m"),
            ">query\nMKTAYIAK\n>env\t60\t0.5\nMRTAYIAK\n",
        )
        .unwrap();
        let chain1 = dir.path().join("1");
        std::fs::create_dir_all(&chain1).unwrap();
        std::fs::write(chain1.join("mmseqs_other_hits.a3m"), ">query\nGSHMLE\n>e2\t1\nGSHMLD\n")
            .unwrap();

        let mut registry = ChainRegistry::new();
        registry.register("0", "MKTAYIAK");
        registry.register("1", "GSHMLE");

        let out = assemble(&doc(), &registry, dir.path(), &AssemblerConfig::default()).unwrap();
        let a = out.sequences[0].protein.as_ref().unwrap();
        assert_eq!(
            a.unpaired_msa.as_deref(),
            Some(">query\nMKTAYIAK\n>cb|X|X/\nMKTAYLAK\n>query\nMKTAYIAK\n>env 60 0.5\nMRTAYIAK\n")
        );
        assert_eq!(a.paired_msa.as_deref(), Some(">query\nMKTAYIAK\n>cb|X|X/\nMKTAYLAK\n"));
        assert_eq!(a.templates, Some(vec![]));
        assert_eq!(a.extra.get("modifications"), Some(&json!([])));

        // no pairable subset for chain 1
        let bc = out.sequences[2].protein.as_ref().unwrap();
        assert_eq!(bc.paired_msa.as_deref(), Some(""));
        assert!(!bc.unpaired_msa.as_deref().unwrap().contains('\t'));

        assert_eq!(out.sequences[1], doc().sequences[1]);
    }

    #[test]
    fn test_unregistered_chain_fails() {
        let dir = TempDir::new().unwrap();
        let mut registry = ChainRegistry::new();
        registry.register("0", "MKTAYIAK");

        let err = assemble(&doc(), &registry, dir.path(), &AssemblerConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MsaError>(),
            Some(MsaError::ChainResolution { chain_id, .. }) if chain_id == "B_C"
        ));
    }

    #[test]
    fn test_output_file_name() {
        let dir = TempDir::new().unwrap();
        let path = doc().write_to_dir(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("complex_data.json"));
        let back = FoldInput::read(&path).unwrap();
        assert_eq!(back, doc());
    }
}
