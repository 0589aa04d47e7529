//! Executable path resolution for the external search tools
//!
//! A configured value containing a path separator must point at an existing
//! file. A bare name is searched for on PATH.

use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Resolve `program` to an executable file path
pub fn resolve_binary(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        return Err(anyhow!(
            "Configured executable not found: {}",
            program.display()
        ));
    }

    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(program);
            if candidate.is_file() {
                log::debug!("Resolved {} to {}", program.display(), candidate.display());
                return Ok(candidate);
            }
        }
    }

    Err(anyhow!(
        "Executable '{}' not found on PATH.\n\
         Set its full path in the search configuration file.",
        program.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let tool = dir.path().join("colabfold_search");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        assert_eq!(resolve_binary(&tool).unwrap(), tool);
        assert!(resolve_binary(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_bare_name_not_on_path() {
        let err = resolve_binary(Path::new("definitely_not_a_real_tool_12345")).unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }
}
