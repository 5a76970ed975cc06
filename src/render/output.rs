// src/render/output.rs

//! Output artifact paths and metadata serialization

use super::metadata::Metadata;
use super::{RenderOptions, Renderer};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Archive extension of built packages
pub const PACKAGE_EXTENSION: &str = "tar.bz2";

/// What to compute output paths for
#[derive(Debug, Clone, Copy)]
pub enum OutputSource<'a> {
    /// A recipe directory or file, rendered and finalized first
    Recipe(&'a Path),
    /// Already rendered metadata; never fetches anything
    Metadata(&'a Metadata),
}

impl<'a> From<&'a Path> for OutputSource<'a> {
    fn from(path: &'a Path) -> Self {
        OutputSource::Recipe(path)
    }
}

impl<'a> From<&'a PathBuf> for OutputSource<'a> {
    fn from(path: &'a PathBuf) -> Self {
        OutputSource::Recipe(path.as_path())
    }
}

impl<'a> From<&'a Metadata> for OutputSource<'a> {
    fn from(metadata: &'a Metadata) -> Self {
        OutputSource::Metadata(metadata)
    }
}

/// Canonical artifact path: `<croot>/<host_subdir>/<name>-<version>-<build>.tar.bz2`
pub fn output_file_path(metadata: &Metadata) -> Result<PathBuf> {
    if !metadata.is_final() {
        return Err(Error::HashInputIncomplete {
            package: metadata.name().to_string(),
        });
    }

    let config = metadata.config();
    Ok(config
        .croot
        .join(&config.host_subdir)
        .join(format!("{}.{}", metadata.dist_name()?, PACKAGE_EXTENSION)))
}

/// Serialize metadata as recipe YAML, optionally writing it to `path`
///
/// Final metadata is written with its pinned requirements and computed
/// build string, so rendering the output again reproduces the identity.
pub fn output_yaml(metadata: &Metadata, path: Option<&Path>) -> Result<String> {
    let yaml = serde_yaml::to_string(&metadata.output_document())?;

    if let Some(path) = path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, &yaml)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    }

    Ok(yaml)
}

impl Renderer {
    /// Artifact paths for a recipe (one per variant) or for one metadata
    pub fn get_output_file_paths(
        &self,
        source: OutputSource<'_>,
        no_download_source: bool,
    ) -> Result<Vec<PathBuf>> {
        match source {
            OutputSource::Metadata(metadata) => Ok(vec![output_file_path(metadata)?]),
            OutputSource::Recipe(path) => {
                let options = RenderOptions::new().no_download_source(no_download_source);
                self.render(path, &options)?
                    .iter()
                    .map(|rendered| output_file_path(&rendered.metadata))
                    .collect()
            }
        }
    }
}
