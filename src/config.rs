//! Search configuration loaded from the YAML config file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_db1() -> Option<String> {
    Some("uniref30_2302_db".to_string())
}

fn default_db3() -> Option<String> {
    Some("colabfold_envdb_202108_db".to_string())
}

fn default_one() -> u32 {
    1
}

fn default_threads() -> u32 {
    32
}

/// Executable paths and search parameters for the MSA search tool
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// The `colabfold_search` executable
    pub colabsearch_bin_path: PathBuf,
    /// Directory holding the search databases
    pub colabfold_db_dir: PathBuf,
    /// The `mmseqs` executable; looked up on PATH when absent
    #[serde(default)]
    pub mmseqs_bin_path: Option<PathBuf>,
    #[serde(default = "default_db1")]
    pub db1: Option<String>,
    #[serde(default)]
    pub db2: Option<String>,
    #[serde(default = "default_db3")]
    pub db3: Option<String>,
    #[serde(default = "default_one")]
    pub use_env: u32,
    #[serde(default = "default_one")]
    pub filter: u32,
    #[serde(default)]
    pub db_load_mode: u32,
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Give up on the search after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl SearchConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: SearchConfig =
            serde_yaml::from_str(text).context("Failed to parse search configuration")?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search configuration: {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = SearchConfig::from_yaml_str(
            "colabsearch_bin_path: /opt/cf/colabfold_search\ncolabfold_db_dir: /data/db\n",
        )
        .unwrap();
        assert_eq!(config.colabsearch_bin_path, PathBuf::from("/opt/cf/colabfold_search"));
        assert_eq!(config.db1.as_deref(), Some("uniref30_2302_db"));
        assert_eq!(config.db2, None);
        assert_eq!(config.db3.as_deref(), Some("colabfold_envdb_202108_db"));
        assert_eq!((config.use_env, config.filter, config.db_load_mode), (1, 1, 0));
        assert_eq!(config.threads, 32);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_overrides_and_null_databases() {
        let config = SearchConfig::from_yaml_str(
            "colabsearch_bin_path: cs\n\
             colabfold_db_dir: db\n\
             mmseqs_bin_path: /usr/bin/mmseqs\n\
             db3: null\n\
             use_env: 0\n\
             threads: 8\n\
             timeout_secs: 3600\n",
        )
        .unwrap();
        assert_eq!(config.db3, None);
        assert_eq!(config.use_env, 0);
        assert_eq!(config.threads, 8);
        assert_eq!(config.mmseqs_bin_path, Some(PathBuf::from("/usr/bin/mmseqs")));
        assert_eq!(config.timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_missing_required_key_and_typos_fail() {
        assert!(SearchConfig::from_yaml_str("colabfold_db_dir: db\n").is_err());
        assert!(SearchConfig::from_yaml_str(
            "colabsearch_bin_path: cs\ncolabfold_db_dir: db\nthread: 4\n"
        )
        .is_err());
    }
}
