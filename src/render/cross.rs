// src/render/cross.rs

//! Build/host prefix decision
//!
//! Whether the host environment gets its own prefix depends on two facts
//! about the recipe: does it declare a `host:` requirements section, and
//! does it call `compiler(...)`.
//!
//! | host section | compiler | host prefix         | override |
//! |--------------|----------|---------------------|----------|
//! | no           | no       | same as build prefix | no      |
//! | yes          | no       | separate             | yes     |
//! | yes          | yes      | separate             | no      |
//! | no           | yes      | separate             | no      |
//!
//! Platform subdirs always come from the configuration.

use crate::config::RenderConfig;
use std::path::PathBuf;

/// Outcome of the prefix decision for one recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossConfig {
    pub host_subdir: String,
    pub build_subdir: String,
    pub build_prefix: PathBuf,
    pub host_prefix: PathBuf,
    pub build_prefix_override: bool,
}

impl CrossConfig {
    /// Whether build and host share one prefix
    pub fn is_elided(&self) -> bool {
        self.build_prefix == self.host_prefix
    }

    /// Apply the decision to a configuration snapshot
    pub fn apply(&self, config: &RenderConfig) -> RenderConfig {
        RenderConfig {
            host_subdir: self.host_subdir.clone(),
            build_subdir: self.build_subdir.clone(),
            build_prefix: self.build_prefix.clone(),
            host_prefix: self.host_prefix.clone(),
            build_prefix_override: self.build_prefix_override,
            ..config.clone()
        }
    }
}

/// Decides prefixes from the recipe's host section and compiler usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossPrefixResolver;

impl CrossPrefixResolver {
    pub fn resolve(config: &RenderConfig, has_host_section: bool, uses_compiler: bool) -> CrossConfig {
        let (elide, build_prefix_override) = match (has_host_section, uses_compiler) {
            (false, false) => (true, false),
            (true, false) => (false, true),
            (true, true) => (false, false),
            (false, true) => (false, false),
        };

        let host_prefix = if elide {
            config.build_prefix.clone()
        } else {
            config.host_prefix.clone()
        };

        CrossConfig {
            host_subdir: config.host_subdir.clone(),
            build_subdir: config.build_subdir.clone(),
            build_prefix: config.build_prefix.clone(),
            host_prefix,
            build_prefix_override,
        }
    }
}
