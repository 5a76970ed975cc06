// src/config.rs

//! Render configuration
//!
//! A [`RenderConfig`] is an immutable value handed to each render. Every
//! metadata object keeps its own copy, adjusted for the cross-compilation
//! decision made for that recipe. It can be loaded from TOML:
//!
//! ```toml
//! croot = "/var/cache/conary-render/bld"
//! host_subdir = "linux-aarch64"
//! hash_build_dependencies = false
//! index_file = "index.json"
//!
//! [variant]
//! python = ["2.7", "3.6"]
//!
//! [[index]]
//! name = "python"
//! version = "3.6.5"
//! build = "h0_0"
//! ```

use crate::error::{Error, Result};
use crate::resolver::{IndexResolver, PackageRecord};
use crate::variant::VariantConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the build environment prefix under the croot
pub const BUILD_PREFIX_NAME: &str = "_build_env";
/// Name of the host environment prefix under the croot
pub const HOST_PREFIX_NAME: &str = "_h_env";

/// Platform subdir of the machine running the render (`linux-64`,
/// `osx-arm64`, `win-64`, ...)
pub fn native_subdir() -> String {
    let os = match std::env::consts::OS {
        "linux" => "linux",
        "macos" => "osx",
        "windows" => "win",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "64",
        "x86" => "32",
        "aarch64" if os == "osx" => "arm64",
        "aarch64" => "aarch64",
        "powerpc64" => "ppc64le",
        other => other,
    };
    format!("{}-{}", os, arch)
}

fn default_croot() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("conary-render")
        .join("bld")
}

/// Configuration for one render invocation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Root directory for build artifacts
    pub croot: PathBuf,

    /// Platform the produced package runs on
    pub host_subdir: String,

    /// Platform the build tools run on
    pub build_subdir: String,

    /// Build environment prefix
    pub build_prefix: PathBuf,

    /// Host environment prefix
    pub host_prefix: PathBuf,

    /// Set by the cross-prefix decision for each rendered metadata
    pub build_prefix_override: bool,

    /// Variant matrix
    pub variant: VariantConfig,

    /// Include build-phase requirements in the dependency hash
    pub hash_build_dependencies: bool,

    /// Package records available to the resolver
    pub index: Vec<PackageRecord>,

    /// JSON file with more package records
    pub index_file: Option<PathBuf>,

    /// Directory for source checkouts (defaults to `<croot>/git_cache`)
    pub source_cache: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let croot = default_croot();
        let subdir = native_subdir();
        Self {
            build_prefix: croot.join(BUILD_PREFIX_NAME),
            host_prefix: croot.join(HOST_PREFIX_NAME),
            croot,
            host_subdir: subdir.clone(),
            build_subdir: subdir,
            build_prefix_override: false,
            variant: VariantConfig::default(),
            hash_build_dependencies: false,
            index: Vec::new(),
            index_file: None,
            source_cache: None,
        }
    }
}

impl RenderConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file
    ///
    /// Relative `croot`, `index_file` and `source_cache` paths are resolved
    /// against the file's directory. Prefixes left unset follow the croot.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;
        let has_build_prefix = table.contains_key("build_prefix");
        let has_host_prefix = table.contains_key("host_prefix");

        let mut config: RenderConfig = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

        if config.croot.is_relative() {
            config.croot = base_dir.join(&config.croot);
        }
        if let Some(ref index_file) = config.index_file {
            if index_file.is_relative() {
                config.index_file = Some(base_dir.join(index_file));
            }
        }
        if let Some(ref cache) = config.source_cache {
            if cache.is_relative() {
                config.source_cache = Some(base_dir.join(cache));
            }
        }
        if !has_build_prefix {
            config.build_prefix = config.croot.join(BUILD_PREFIX_NAME);
        }
        if !has_host_prefix {
            config.host_prefix = config.croot.join(HOST_PREFIX_NAME);
        }

        Ok(config)
    }

    /// Set the build root; prefixes move with it
    pub fn with_croot(mut self, croot: impl Into<PathBuf>) -> Self {
        self.croot = croot.into();
        self.build_prefix = self.croot.join(BUILD_PREFIX_NAME);
        self.host_prefix = self.croot.join(HOST_PREFIX_NAME);
        self
    }

    /// Set the target platform
    pub fn with_host_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.host_subdir = subdir.into();
        self
    }

    /// Set the variant matrix
    pub fn with_variant(mut self, variant: VariantConfig) -> Self {
        self.variant = variant;
        self
    }

    /// Add package records to the index
    pub fn with_index(mut self, records: Vec<PackageRecord>) -> Self {
        self.index.extend(records);
        self
    }

    /// Include build requirements in the dependency hash
    pub fn with_hash_build_dependencies(mut self, enabled: bool) -> Self {
        self.hash_build_dependencies = enabled;
        self
    }

    /// Whether the target platform differs from the build platform
    pub fn is_cross(&self) -> bool {
        self.host_subdir != self.build_subdir
    }

    /// Directory where source checkouts are kept
    pub fn source_cache_dir(&self) -> PathBuf {
        self.source_cache
            .clone()
            .unwrap_or_else(|| self.croot.join("git_cache"))
    }

    /// Build the default resolver from the inline index and the index file
    pub fn package_resolver(&self) -> Result<IndexResolver> {
        let mut resolver = match self.index_file {
            Some(ref path) => IndexResolver::from_json_file(path)?,
            None => IndexResolver::default(),
        };
        resolver.extend(self.index.iter().cloned());
        Ok(resolver)
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> Result<()> {
        if self.host_subdir.is_empty() || self.build_subdir.is_empty() {
            return Err(Error::ConfigError("platform subdirs must not be empty".to_string()));
        }
        if self.croot.as_os_str().is_empty() {
            return Err(Error::ConfigError("croot must not be empty".to_string()));
        }
        Ok(())
    }
}
