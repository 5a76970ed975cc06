// src/source/git.rs

//! Git-backed source provider
//!
//! Clones `git_url` into a per-spec checkout under the cache directory,
//! checks out `git_tag` or `git_rev`, and reads the describe facts.
//! Non-git sources are not downloaded here; they carry no template facts.

use super::{source_fingerprint, SourceFacts, SourceProvider};
use crate::error::{Error, Result};
use crate::recipe::SourceSpec;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Source provider that shells out to `git`
#[derive(Debug, Clone)]
pub struct GitSourceProvider {
    cache_dir: PathBuf,
}

impl GitSourceProvider {
    /// Create a provider that keeps checkouts under `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn git(&self, git: &Path, spec: &SourceSpec, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let mut cmd = Command::new(git);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| Error::FetchError {
            source_id: spec.display_id(),
            message: format!("git {} failed: {}", args.join(" "), e),
        })?;

        if !output.status.success() {
            return Err(Error::FetchError {
                source_id: spec.display_id(),
                message: format!(
                    "git {} failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl SourceProvider for GitSourceProvider {
    fn fetch(&self, spec: &SourceSpec) -> Result<SourceFacts> {
        let Some(url) = spec.git_url.as_deref() else {
            debug!("Source {} is not a git source, no facts to read", spec.display_id());
            return Ok(SourceFacts::default());
        };

        let git = which::which("git").map_err(|_| Error::ToolNotFound("git".to_string()))?;

        let checkout = self.cache_dir.join(source_fingerprint(spec)?);
        if checkout.join(".git").exists() {
            debug!("Updating existing checkout {}", checkout.display());
            self.git(&git, spec, &["fetch", "--quiet", "--tags"], Some(&checkout))?;
        } else {
            std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
                Error::IoError(format!(
                    "Failed to create source cache {}: {}",
                    self.cache_dir.display(),
                    e
                ))
            })?;
            let dest = checkout.to_string_lossy().to_string();
            self.git(&git, spec, &["clone", "--quiet", url, &dest], None)?;
        }

        if let Some(rev) = spec.git_tag.as_deref().or(spec.git_rev.as_deref()) {
            self.git(&git, spec, &["checkout", "--quiet", rev], Some(&checkout))?;
        }

        let full_hash = self.git(&git, spec, &["rev-parse", "HEAD"], Some(&checkout))?;
        let describe = match self.git(&git, spec, &["describe", "--tags", "--long"], Some(&checkout)) {
            Ok(describe) => describe,
            Err(e) => {
                warn!("No tag reachable in {}: {}", spec.display_id(), e);
                String::new()
            }
        };

        Ok(SourceFacts::from_git_describe(&describe, &full_hash).with_work_dir(checkout))
    }
}
