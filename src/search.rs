//! External MSA search invocation
//!
//! The search itself is a black box: it is handed a query FASTA and fills an
//! output directory with one A3M per query (plus `uniref_tax.m8` when
//! taxonomy enrichment is on). A nonzero exit or a timeout is an error.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::binary_paths::resolve_binary;
use crate::config::SearchConfig;
use crate::error::MsaError;
use crate::hit_table::HIT_TABLE_NAME;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const STDERR_TAIL_LINES: usize = 20;

/// Anything that can turn a query FASTA into a directory of A3M files
pub trait SearchTool: Send + Sync {
    fn search(&self, query_fasta: &Path, out_dir: &Path, add_toxid: bool) -> Result<()>;
}

/// `colabfold_search` driven by a `SearchConfig`
#[derive(Debug, Clone)]
pub struct ColabFoldSearch {
    config: SearchConfig,
}

impl ColabFoldSearch {
    pub fn new(config: SearchConfig) -> Self {
        ColabFoldSearch { config }
    }

    /// Arguments after the executable. Numeric toggles are only passed
    /// when nonzero and databases only when set.
    pub fn build_args(
        &self,
        mmseqs: &Path,
        query_fasta: &Path,
        out_dir: &Path,
        add_toxid: bool,
    ) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = vec![
            query_fasta.into(),
            c.colabfold_db_dir.clone().into(),
            out_dir.into(),
        ];

        for (flag, db) in [("--db1", &c.db1), ("--db2", &c.db2), ("--db3", &c.db3)] {
            if let Some(db) = db.as_deref().filter(|db| !db.is_empty()) {
                args.push(flag.into());
                args.push(db.into());
            }
        }
        args.push("--mmseqs".into());
        args.push(mmseqs.into());

        let toggles = [
            ("--use-env", c.use_env),
            ("--filter", c.filter),
            ("--db-load-mode", c.db_load_mode),
            ("--add-toxid", u32::from(add_toxid)),
            ("--threads", c.threads),
        ];
        for (flag, value) in toggles {
            if value != 0 {
                args.push(flag.into());
                args.push(value.to_string().into());
            }
        }
        args
    }

    fn mmseqs_path(&self) -> Result<PathBuf> {
        match &self.config.mmseqs_bin_path {
            Some(path) => resolve_binary(path),
            None => resolve_binary(Path::new("mmseqs")),
        }
    }
}

/// A finished enrichment search must have left its hit table behind
fn check_hit_table(out_dir: &Path) -> Result<()> {
    let hit_table = out_dir.join(HIT_TABLE_NAME);
    if hit_table.is_file() {
        return Ok(());
    }
    Err(MsaError::SearchTool {
        status: "exit status: 0".to_string(),
        stderr_tail: format!("taxonomy enrichment produced no {}", hit_table.display()),
    }
    .into())
}

impl SearchTool for ColabFoldSearch {
    fn search(&self, query_fasta: &Path, out_dir: &Path, add_toxid: bool) -> Result<()> {
        let program = resolve_binary(&self.config.colabsearch_bin_path)?;
        let mmseqs = self.mmseqs_path()?;
        let args = self.build_args(&mmseqs, query_fasta, out_dir, add_toxid);

        log::info!(
            "Running {} {}",
            program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        run_with_timeout(cmd, self.config.timeout())?;

        if add_toxid {
            check_hit_table(out_dir)?;
        }
        Ok(())
    }
}

fn stderr_tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run a command to completion, capturing stderr. Exceeding `timeout`
/// kills the child.
pub fn run_with_timeout(mut cmd: Command, timeout: Option<Duration>) -> Result<()> {
    let mut stderr_file = tempfile::tempfile().context("Failed to create stderr capture file")?;
    cmd.stdin(Stdio::null())
        .stderr(Stdio::from(stderr_file.try_clone()?));

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to start {:?}", cmd.get_program()))?;

    let started = Instant::now();
    let status = match timeout {
        None => Some(child.wait()?),
        Some(limit) => loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if started.elapsed() >= limit {
                log::warn!("Search exceeded {}s, killing it", limit.as_secs());
                child.kill()?;
                child.wait()?;
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        },
    };

    let mut captured = Vec::new();
    stderr_file.seek(SeekFrom::Start(0))?;
    stderr_file.read_to_end(&mut captured)?;
    let stderr_text = String::from_utf8_lossy(&captured);
    if !stderr_text.is_empty() {
        log::debug!("Search stderr:\n{}", stderr_tail(&stderr_text));
    }

    match status {
        Some(status) if status.success() => {
            log::info!("Search finished in {:.1}s", started.elapsed().as_secs_f64());
            Ok(())
        }
        Some(status) => Err(MsaError::SearchTool {
            status: status.to_string(),
            stderr_tail: stderr_tail(&stderr_text),
        }
        .into()),
        None => Err(MsaError::SearchTool {
            status: format!(
                "timed out after {}s",
                timeout.map_or(0, |limit| limit.as_secs())
            ),
            stderr_tail: stderr_tail(&stderr_text),
        }
        .into()),
    }
}
