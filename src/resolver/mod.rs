// src/resolver/mod.rs

//! Requirement resolution against a package index
//!
//! The renderer never solves environments itself. It hands the build and
//! host specs of each variant to a [`PackageResolver`] and receives the
//! concrete records that would be installed. The default implementation,
//! [`IndexResolver`], selects from a flat list of records loaded from the
//! render config or a JSON index file.

mod index;

pub use index::IndexResolver;

use crate::error::Result;
use crate::version::MatchSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete package available for installation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    #[serde(default = "default_build")]
    pub build: String,

    /// Platform subdir; `None` or `noarch` matches every platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,

    /// Runtime dependencies of this record, resolved transitively
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,

    /// Requirements added to the run requirements of anything built
    /// against this record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_exports: Vec<String>,
}

fn default_build() -> String {
    "0".to_string()
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build: build.into(),
            subdir: None,
            depends: Vec::new(),
            run_exports: Vec::new(),
        }
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self
    }

    pub fn with_run_exports(mut self, run_exports: Vec<String>) -> Self {
        self.run_exports = run_exports;
        self
    }

    /// Exact pin form: `name version build`
    pub fn dist_string(&self) -> String {
        format!("{} {} {}", self.name, self.version, self.build)
    }

    /// Whether the record can be installed on `subdir`
    pub fn available_on(&self, subdir: &str) -> bool {
        match self.subdir.as_deref() {
            None | Some("noarch") => true,
            Some(own) => own == subdir,
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.build)
    }
}

/// Outcome of resolving one environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Selected records, sorted by name
    pub packages: Vec<PackageRecord>,
    /// Specs no record could satisfy
    pub unsatisfied: Vec<MatchSpec>,
}

impl Resolution {
    pub fn is_satisfied(&self) -> bool {
        self.unsatisfied.is_empty()
    }

    /// Look up the selected record for a package name
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Trait for resolving abstract requirement specs into concrete records
///
/// Implementations must be deterministic: identical specs and subdir must
/// always yield the same resolution.
pub trait PackageResolver: Send + Sync {
    /// Resolve the specs of one environment for the given platform subdir
    fn resolve(&self, specs: &[MatchSpec], subdir: &str) -> Result<Resolution>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_forms() {
        let rec = PackageRecord::new("zlib", "1.2.8", "h1234_0");
        assert_eq!(rec.dist_string(), "zlib 1.2.8 h1234_0");
        assert_eq!(rec.to_string(), "zlib-1.2.8-h1234_0");
    }

    #[test]
    fn test_record_subdir_matching() {
        let any = PackageRecord::new("a", "1", "0");
        assert!(any.available_on("linux-64"));

        let noarch = PackageRecord::new("a", "1", "0").with_subdir("noarch");
        assert!(noarch.available_on("osx-arm64"));

        let linux = PackageRecord::new("a", "1", "0").with_subdir("linux-64");
        assert!(linux.available_on("linux-64"));
        assert!(!linux.available_on("win-64"));
    }

    #[test]
    fn test_record_deserialize_defaults() {
        let rec: PackageRecord =
            serde_json::from_str(r#"{"name": "python", "version": "3.6.5"}"#).unwrap();
        assert_eq!(rec.build, "0");
        assert!(rec.subdir.is_none());
        assert!(rec.depends.is_empty());
    }
}
