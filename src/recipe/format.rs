// src/recipe/format.rs

//! Recipe document format definitions
//!
//! A recipe is a templated YAML file (`meta.yaml`). After template
//! evaluation the text is parsed into a [`RecipeDocument`]. Documents are
//! immutable once parsed and are re-parsed on every render attempt.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A complete recipe after template evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDocument {
    /// Package identity
    pub package: PackageSection,

    /// Source fetch instructions (a single mapping or a list)
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub source: Vec<SourceSpec>,

    /// Build settings
    #[serde(default)]
    pub build: BuildSection,

    /// Requirements by phase
    #[serde(default)]
    pub requirements: RequirementsSection,

    /// Test requirements and commands (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestSection>,

    /// Descriptive metadata (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<AboutSection>,

    /// Free-form extra data, carried through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RecipeDocument {
    /// Requirements declared for a phase
    pub fn requirements(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::Build => &self.requirements.build,
            Phase::Host => self.requirements.host.as_deref().unwrap_or(&[]),
            Phase::Run => &self.requirements.run,
            Phase::Test => self.test.as_ref().map(|t| t.requires.as_slice()).unwrap_or(&[]),
        }
    }

    /// Whether the recipe declares a `host:` section (even an empty one)
    pub fn has_host_section(&self) -> bool {
        self.requirements.host.is_some()
    }

    /// Names of every build, host and run requirement
    pub fn requirement_names(&self) -> impl Iterator<Item = &str> {
        [Phase::Build, Phase::Host, Phase::Run]
            .into_iter()
            .flat_map(move |phase| self.requirements(phase).iter())
            .filter_map(|req| req.split_whitespace().next())
    }

    /// Names of requirements written without any version or build constraint
    pub fn bare_requirement_names(&self) -> impl Iterator<Item = &str> {
        [Phase::Build, Phase::Host, Phase::Run]
            .into_iter()
            .flat_map(move |phase| self.requirements(phase).iter())
            .map(|req| req.trim())
            .filter(|req| !req.is_empty() && !req.contains(char::is_whitespace))
    }

    /// Drop empty entries left behind by templates that rendered to nothing
    pub(crate) fn normalize(&mut self) {
        let clean = |list: &mut Vec<String>| {
            list.retain(|r| !r.trim().is_empty());
            for req in list.iter_mut() {
                *req = req.split_whitespace().collect::<Vec<_>>().join(" ");
            }
        };
        clean(&mut self.requirements.build);
        if let Some(host) = self.requirements.host.as_mut() {
            clean(host);
        }
        clean(&mut self.requirements.run);
        clean(&mut self.requirements.run_constrained);
        if let Some(test) = self.test.as_mut() {
            clean(&mut test.requires);
        }
    }
}

/// Requirement phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Tools that run on the build machine (compilers, make)
    Build,
    /// Libraries linked against, installed for the target platform
    Host,
    /// Runtime dependencies of the produced package
    Run,
    /// Extra packages needed to run the package tests
    Test,
}

impl Phase {
    /// Get the phase name as used in recipes
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Host => "host",
            Phase::Run => "run",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package identity section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,

    /// Package version
    ///
    /// Quote versions in recipes: an unquoted `1.20` is a YAML float.
    #[serde(deserialize_with = "scalar_string")]
    pub version: String,
}

/// One source fetch instruction
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Git repository to clone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,

    /// Git revision (branch or commit) to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_rev: Option<String>,

    /// Git tag to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_tag: Option<String>,

    /// Archive URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Archive checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Local directory source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Subdirectory of the work dir to place this source in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl SourceSpec {
    /// Short human readable identifier for logs and errors
    pub fn display_id(&self) -> String {
        if let Some(ref url) = self.git_url {
            let rev = self.git_tag.as_deref().or(self.git_rev.as_deref());
            match rev {
                Some(rev) => format!("{}@{}", url, rev),
                None => url.clone(),
            }
        } else if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref path) = self.path {
            path.clone()
        } else {
            "<empty source>".to_string()
        }
    }

    /// Whether this is a version-control source
    pub fn is_git(&self) -> bool {
        self.git_url.is_some()
    }

    /// Resolve relative local paths and git URLs against the recipe directory
    pub fn resolved_against(&self, recipe_dir: &Path) -> Self {
        let resolve = |value: &Option<String>| {
            value.as_ref().map(|v| {
                if is_relative_location(v) {
                    recipe_dir.join(v).to_string_lossy().to_string()
                } else {
                    v.clone()
                }
            })
        };

        Self {
            git_url: resolve(&self.git_url),
            path: resolve(&self.path),
            ..self.clone()
        }
    }
}

fn is_relative_location(value: &str) -> bool {
    !value.contains("://") && !value.starts_with("git@") && Path::new(value).is_relative()
}

/// Build settings section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Build number (for rebuilds of the same version)
    #[serde(default, deserialize_with = "build_number")]
    pub number: u64,

    /// Explicit build string, replacing the computed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    /// How run requirements are pinned against the host environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_depends: Option<PinDepends>,

    /// Skip this variant entirely
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

/// Pinning strictness for run requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDepends {
    /// Record exact pins alongside the package, leave run requirements alone
    Record,
    /// Replace run requirements with exact pins from the host environment
    Strict,
}

impl PinDepends {
    /// Get the strictness name as used in recipes
    pub fn as_str(&self) -> &'static str {
        match self {
            PinDepends::Record => "record",
            PinDepends::Strict => "strict",
        }
    }
}

/// Requirements section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementsSection {
    /// Build machine tools
    #[serde(default, deserialize_with = "null_as_empty")]
    pub build: Vec<String>,

    /// Target platform libraries; `None` when the section is absent
    #[serde(
        default,
        deserialize_with = "present_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub host: Option<Vec<String>>,

    /// Runtime dependencies
    #[serde(default, deserialize_with = "null_as_empty")]
    pub run: Vec<String>,

    /// Constraints applied when the package is installed, without
    /// pulling the named packages in
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub run_constrained: Vec<String>,
}

/// Test section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSection {
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

/// Descriptive metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AboutSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// License identifier (SPDX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        other => scalar_to_string(other)
            .ok_or_else(|| serde::de::Error::custom("expected a string, number or boolean")),
    }
}

fn build_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(0),
        serde_yaml::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid build number {}", n))),
        serde_yaml::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_yaml::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid build number '{}'", s))),
        _ => Err(serde::de::Error::custom("build number must be an integer")),
    }
}

fn string_list(value: serde_yaml::Value) -> Result<Vec<String>, String> {
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(items) => Ok(items
            .into_iter()
            .filter_map(scalar_to_string)
            .collect()),
        other => scalar_to_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| "expected a list of strings".to_string()),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    string_list(value).map_err(serde::de::Error::custom)
}

fn present_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    null_as_empty(deserializer).map(Some)
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<SourceSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(SourceSpec),
        Many(Vec<SourceSpec>),
    }

    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::One(spec)) => vec![spec],
        Some(OneOrMany::Many(specs)) => specs,
    })
}
