// src/source/mod.rs

//! Source fetching and the facts derived from fetched sources
//!
//! Some recipe fields can only be evaluated after the source is on disk
//! (the version taken from a git tag, the build number taken from the
//! commit distance). Those values are called source facts. A
//! [`SourceProvider`] fetches one source spec and reports its facts; the
//! renderer never fetches the same spec twice within one render.

mod git;

pub use git::GitSourceProvider;

use crate::error::Result;
use crate::hash::{hash_canonical, HashAlgorithm};
use crate::recipe::SourceSpec;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Template variables that only a fetched source can provide
pub const SOURCE_VARIABLES: &[&str] = &[
    "GIT_DESCRIBE_TAG",
    "GIT_DESCRIBE_NUMBER",
    "GIT_DESCRIBE_HASH",
    "GIT_FULL_HASH",
    "GIT_BUILD_STR",
];

/// Whether a template identifier is a source fact
pub fn is_source_variable(name: &str) -> bool {
    SOURCE_VARIABLES.contains(&name)
}

/// Facts learned from a fetched source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFacts {
    variables: BTreeMap<String, String>,
    work_dir: Option<PathBuf>,
}

impl SourceFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Record where the source was checked out
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = Some(work_dir);
        self
    }

    /// Build facts from `git describe --tags --long` output and the full
    /// commit hash
    ///
    /// `v1.20.2-0-g262d444` yields tag `v1.20.2`, number `0`, hash
    /// `g262d444` and build string `0_g262d444`.
    pub fn from_git_describe(describe: &str, full_hash: &str) -> Self {
        let mut facts = Self::new().with_variable("GIT_FULL_HASH", full_hash.trim());

        let mut parts = describe.trim().rsplitn(3, '-');
        if let (Some(hash), Some(number), Some(tag)) = (parts.next(), parts.next(), parts.next()) {
            if number.chars().all(|c| c.is_ascii_digit()) && hash.starts_with('g') {
                facts = facts
                    .with_variable("GIT_DESCRIBE_TAG", tag)
                    .with_variable("GIT_DESCRIBE_NUMBER", number)
                    .with_variable("GIT_DESCRIBE_HASH", hash)
                    .with_variable("GIT_BUILD_STR", format!("{}_{}", number, hash));
            }
        }

        facts
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn work_dir(&self) -> Option<&PathBuf> {
        self.work_dir.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Merge another set of facts; values already present win
    pub fn merge(&mut self, other: &SourceFacts) {
        for (name, value) in &other.variables {
            self.variables
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if self.work_dir.is_none() {
            self.work_dir = other.work_dir.clone();
        }
    }
}

/// Trait for fetching recipe sources
///
/// Implementations perform the actual network or VCS access. They are
/// called at most once per distinct spec within a render.
pub trait SourceProvider: Send + Sync {
    /// Fetch one source and report the facts derived from it
    fn fetch(&self, spec: &SourceSpec) -> Result<SourceFacts>;
}

/// Provider that fetches nothing and reports no facts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSourceProvider;

impl SourceProvider for NoopSourceProvider {
    fn fetch(&self, spec: &SourceSpec) -> Result<SourceFacts> {
        debug!("Noop source provider: skipping fetch of {}", spec.display_id());
        Ok(SourceFacts::default())
    }
}

/// Stable in-process identity of a source spec
pub fn source_fingerprint(spec: &SourceSpec) -> Result<String> {
    Ok(hash_canonical(HashAlgorithm::Xxh128, spec)?.value)
}

/// Per-render memo of fetched sources
pub struct FetchCache<'a> {
    provider: &'a dyn SourceProvider,
    fetched: BTreeMap<String, SourceFacts>,
}

impl<'a> FetchCache<'a> {
    pub fn new(provider: &'a dyn SourceProvider) -> Self {
        Self {
            provider,
            fetched: BTreeMap::new(),
        }
    }

    /// Fetch every spec not yet fetched and return the merged facts
    ///
    /// The first source listed takes precedence when two sources report
    /// the same fact.
    pub fn facts_for(&mut self, specs: &[SourceSpec]) -> Result<SourceFacts> {
        let mut merged = SourceFacts::default();

        for spec in specs {
            let key = source_fingerprint(spec)?;
            if !self.fetched.contains_key(&key) {
                info!("Fetching source {}", spec.display_id());
                let facts = self.provider.fetch(spec)?;
                self.fetched.insert(key.clone(), facts);
            }
            if let Some(facts) = self.fetched.get(&key) {
                merged.merge(facts);
            }
        }

        Ok(merged)
    }

    /// Number of distinct specs fetched so far
    pub fn len(&self) -> usize {
        self.fetched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty()
    }
}
