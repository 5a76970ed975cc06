// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use conary_render::recipe::SourceSpec;
use conary_render::{
    PackageRecord, RenderConfig, Renderer, Result, SourceFacts, SourceProvider, VariantConfig,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Target platform used by every test configuration
pub const TEST_SUBDIR: &str = "linux-64";

/// Source provider that records every fetch and returns canned facts
pub struct MockSourceProvider {
    facts: SourceFacts,
    fail: bool,
    calls: Mutex<Vec<SourceSpec>>,
}

impl MockSourceProvider {
    /// Provider answering like a checkout of tag 1.20.2 at commit 262d444
    pub fn git_describe() -> Self {
        Self::with_facts(SourceFacts::from_git_describe(
            "1.20.2-0-g262d444",
            "262d444f0a6e2b5b8a0a0f2d1c3b4a5968778899",
        ))
    }

    pub fn with_facts(facts: SourceFacts) -> Self {
        Self {
            facts,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose every fetch fails
    pub fn failing() -> Self {
        Self {
            facts: SourceFacts::default(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<SourceSpec> {
        self.calls.lock().unwrap().clone()
    }
}

impl SourceProvider for MockSourceProvider {
    fn fetch(&self, spec: &SourceSpec) -> Result<SourceFacts> {
        self.calls.lock().unwrap().push(spec.clone());
        if self.fail {
            return Err(conary_render::Error::FetchError {
                source_id: spec.display_id(),
                message: "network unreachable".to_string(),
            });
        }
        Ok(self.facts.clone())
    }
}

/// Package index shared by the tests
pub fn test_index() -> Vec<PackageRecord> {
    vec![
        PackageRecord::new("python", "2.7.15", "h1a2b3c4_0"),
        PackageRecord::new("python", "3.6.5", "h5d6e7f8_0"),
        PackageRecord::new("numpy", "1.11.3", "py_0"),
        PackageRecord::new("numpy", "1.16.0", "py_0"),
        PackageRecord::new("zlib", "1.2.8", "h0000001_0"),
        PackageRecord::new("make", "4.2.1", "0"),
        PackageRecord::new("gcc_linux-64", "7.3.0", "h553295d_3"),
    ]
}

/// Configuration rooted in `croot`, targeting [`TEST_SUBDIR`]
pub fn test_config(croot: &Path, variant: VariantConfig) -> RenderConfig {
    RenderConfig::default()
        .with_croot(croot)
        .with_host_subdir(TEST_SUBDIR)
        .with_index(test_index())
        .with_variant(variant)
}

/// Renderer with the given config and source provider
pub fn renderer(config: RenderConfig, provider: Arc<MockSourceProvider>) -> Renderer {
    Renderer::new(config).unwrap().with_source_provider(provider)
}

/// Write `meta.yaml` into a fresh recipe directory named `name`
pub fn write_recipe(root: &TempDir, name: &str, content: &str) -> PathBuf {
    let dir = root.path().join("recipes").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("meta.yaml"), content).unwrap();
    dir
}

/// Recipe whose version and build string come from `git describe`
pub const GIT_RECIPE: &str = r#"
package:
  name: git_recipe
  version: "{{ GIT_DESCRIBE_TAG }}"

source:
  git_url: https://example.com/git_recipe.git
  git_tag: "1.20.2"

build:
  number: {{ GIT_DESCRIBE_NUMBER }}
  string: py{{ CONDA_PY }}{{ PKG_HASH }}_{{ GIT_BUILD_STR }}

requirements:
  host:
    - python
  run:
    - python
"#;

/// Recipe whose host and run requirements are variant variables
pub const HOST_ENTRIES_RECIPE: &str = r#"
package:
  name: host_entries
  version: "1.0"

requirements:
  host:
    - python
    - numpy
  run:
    - python
    - numpy
"#;

/// Recipe with a git source but no source-derived expression
pub const GIT_NO_TEMPLATE_RECIPE: &str = r#"
package:
  name: plain_git
  version: "2.0"

source:
  git_url: https://example.com/plain.git
  git_tag: "2.0"

requirements:
  host:
    - zlib
  run:
    - zlib
"#;
