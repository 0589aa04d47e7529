/// Chain registry mapping per-query identifiers to query sequences
///
/// Filled while partitioning (one entry per successfully partitioned file)
/// and persisted as `msa_chain_seq.json`, which is the only thing the
/// assembly phase needs from the partitioning phase.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::MsaError;

/// Side file name inside the alignment output directory
pub const CHAIN_SEQ_FILE: &str = "msa_chain_seq.json";

#[derive(Debug, Default, Clone)]
pub struct ChainRegistry {
    /// Map from per-query ID to sequence, in registration order
    id_to_sequence: IndexMap<String, String>,

    /// Map from sequence to per-query ID
    sequence_to_id: HashMap<String, String>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a partitioned query. A repeated ID overwrites the earlier
    /// entry; a repeated sequence resolves to the most recent ID.
    pub fn register(&mut self, id: impl Into<String>, sequence: impl Into<String>) {
        let id = id.into();
        let sequence = sequence.into();
        if let Some(old) = self.id_to_sequence.insert(id.clone(), sequence.clone()) {
            if self.sequence_to_id.get(&old) == Some(&id) {
                self.sequence_to_id.remove(&old);
            }
        }
        self.sequence_to_id.insert(sequence, id);
    }

    /// Per-query ID whose query sequence is exactly `sequence`
    pub fn resolve_by_sequence(&self, sequence: &str) -> Option<&str> {
        self.sequence_to_id.get(sequence).map(|s| s.as_str())
    }

    /// Like `resolve_by_sequence`, but a miss is a `ChainResolution` error
    pub fn resolve_chain(&self, chain_id: &str, sequence: &str) -> Result<&str> {
        self.resolve_by_sequence(sequence).ok_or_else(|| {
            MsaError::ChainResolution {
                chain_id: chain_id.to_string(),
                sequence: sequence.to_string(),
            }
            .into()
        })
    }

    pub fn get_sequence(&self, id: &str) -> Option<&str> {
        self.id_to_sequence.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.id_to_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_sequence.is_empty()
    }

    /// Load the side file written by `save`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open chain registry: {}", path.display()))?;
        let entries: IndexMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse chain registry: {}", path.display()))?;

        let mut registry = ChainRegistry::new();
        for (id, sequence) in entries {
            registry.register(id, sequence);
        }
        Ok(registry)
    }

    /// Write the registry as a JSON object in registration order
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create chain registry: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.id_to_sequence)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
