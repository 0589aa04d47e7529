//! Error taxonomy for the partitioning engine
//!
//! Everything propagates as `anyhow::Error`; these variants are wrapped inside
//! so callers can `downcast_ref::<MsaError>()` when the category matters
//! (the pipeline does this to tell per-file skips from run-fatal failures).

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum MsaError {
    /// Malformed input file
    Format { path: PathBuf, message: String },
    /// Query sequence line is missing or blank
    EmptyQuery { path: PathBuf },
    /// A line at a header position does not start with '>'
    BadHeader { path: PathBuf, position: usize },
    /// File ends after a header with no sequence line
    TruncatedRecord { path: PathBuf, position: usize },
    /// Record-count mismatch, missing tab separator, or no hits at all
    PartitionInvariant { path: PathBuf, message: String },
    /// A document chain has no registered partition
    ChainResolution { chain_id: String, sequence: String },
    /// The external search executable failed or timed out
    SearchTool { status: String, stderr_tail: String },
}

impl Error for MsaError {}

impl fmt::Display for MsaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MsaError::Format { path, message } => {
                write!(f, "format error in {}: {message}", path.display())
            }
            MsaError::EmptyQuery { path } => {
                write!(f, "empty query sequence in {}", path.display())
            }
            MsaError::BadHeader { path, position } => {
                write!(f, "bad header at position {position} in {}", path.display())
            }
            MsaError::TruncatedRecord { path, position } => write!(
                f,
                "header at position {position} has no sequence line in {}",
                path.display()
            ),
            MsaError::PartitionInvariant { path, message } => {
                write!(f, "partition invariant violated for {}: {message}", path.display())
            }
            MsaError::ChainResolution { chain_id, sequence } => write!(
                f,
                "chain {chain_id} (sequence length {}) was never partitioned; \
                 run the partition phase on the matching search output first",
                sequence.len()
            ),
            MsaError::SearchTool { status, stderr_tail } => {
                if stderr_tail.is_empty() {
                    write!(f, "search tool failed: {status}")
                } else {
                    write!(f, "search tool failed: {status}\n{stderr_tail}")
                }
            }
        }
    }
}

impl MsaError {
    /// Marker suffix for per-file failures that skip the file without
    /// aborting the run. `None` means the error is fatal.
    pub fn marker(&self) -> Option<String> {
        match self {
            MsaError::EmptyQuery { .. } => Some("empty_query_seq".to_string()),
            MsaError::BadHeader { position, .. } => Some(format!("bad_header_{position}")),
            MsaError::TruncatedRecord { position, .. } => {
                Some(format!("truncated_record_{position}"))
            }
            _ => None,
        }
    }
}
