//! A3M alignment records as produced by ColabFold-style MSA searches
//!
//! Line 0 is the query header, line 1 the query sequence, then header and
//! sequence lines alternate. When a second database was searched, its block
//! starts by repeating the query header; the line index of that repeat is
//! the boundary between primary and secondary database hits.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::MsaError;

/// One header/sequence pair. The header keeps its leading '>' and any
/// tab-separated description; neither field carries a line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub header: String,
    pub sequence: String,
}

impl AlignmentRecord {
    pub fn new(header: impl Into<String>, sequence: impl Into<String>) -> Self {
        AlignmentRecord {
            header: header.into(),
            sequence: sequence.into(),
        }
    }

    /// Header text between '>' and the first tab (or end of line)
    pub fn identifier(&self) -> &str {
        let name = self.header.split('\t').next().unwrap_or("");
        name.strip_prefix('>').unwrap_or(name)
    }

    /// Whether the header carries a tab-separated description
    pub fn has_description(&self) -> bool {
        self.header.contains('\t')
    }
}

/// All records of one alignment file plus the primary/secondary boundary
#[derive(Debug, Clone, Default)]
pub struct ParsedAlignment {
    pub records: Vec<AlignmentRecord>,
    /// Line index of the first repeat of the query header after line 0,
    /// or 0 when the query header never repeats
    pub boundary_index: usize,
}

impl ParsedAlignment {
    /// Read an alignment file from disk
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open alignment file: {}", path.display()))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parse alignment text. `path` is only used in error messages.
    ///
    /// Header and sequence lines are collected separately and then paired
    /// positionally, so a stray extra line never shifts the headers.
    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut headers = Vec::new();
        let mut sequences = Vec::new();
        let mut query_header: Option<String> = None;
        let mut boundary_index = 0;
        let mut line_count = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("Failed to read line {idx} of {}", path.display()))?;
            line_count += 1;

            if line.starts_with('>') {
                if idx == 0 {
                    query_header = Some(line.clone());
                } else if boundary_index == 0 && query_header.as_deref() == Some(line.as_str()) {
                    boundary_index = idx;
                }
                headers.push(line);
            } else {
                sequences.push(line);
            }
        }

        if line_count == 0 {
            return Err(MsaError::Format {
                path: path.to_path_buf(),
                message: "alignment file is empty".to_string(),
            }
            .into());
        }

        let records = headers
            .into_iter()
            .zip(sequences)
            .map(|(header, sequence)| AlignmentRecord { header, sequence })
            .collect();

        Ok(ParsedAlignment {
            records,
            boundary_index,
        })
    }

    /// Number of records that belong to the primary database block.
    /// Every record spans two lines, so this is half the boundary line.
    pub fn primary_record_count(&self) -> usize {
        self.boundary_index / 2
    }

    pub fn query(&self) -> Option<&AlignmentRecord> {
        self.records.first()
    }
}

/// Read every line of a file with terminators stripped
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open alignment file: {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Write records as alternating header/sequence lines
pub fn write_records<W: Write>(writer: &mut W, records: &[AlignmentRecord]) -> Result<()> {
    for record in records {
        writeln!(writer, "{}", record.header)?;
        writeln!(writer, "{}", record.sequence)?;
    }
    Ok(())
}

/// Write records to a new A3M file, replacing any existing one
pub fn write_a3m<P: AsRef<Path>>(path: P, records: &[AlignmentRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create alignment file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, records)?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
