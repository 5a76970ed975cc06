// src/api.rs

//! Library entry points
//!
//! Thin functions over [`Renderer`] for callers that are happy with the
//! default collaborators (tera templates, git sources, index resolver).

use crate::config::RenderConfig;
use crate::error::Result;
use crate::render::{self, Metadata, OutputSource, RenderOptions, RenderResult, Renderer};
use std::path::{Path, PathBuf};

/// Render a recipe directory or file into one metadata per variant
pub fn render(recipe_path: &Path, config: &RenderConfig, options: &RenderOptions) -> Result<RenderResult> {
    Renderer::new(config.clone())?.render(recipe_path, options)
}

/// Serialize metadata to YAML, optionally writing it to `file_path`
pub fn output_yaml(metadata: &Metadata, file_path: Option<&Path>) -> Result<String> {
    render::output_yaml(metadata, file_path)
}

/// Artifact paths for a recipe or an already rendered metadata
///
/// Metadata input uses its own configuration snapshot; `config` only
/// applies when a recipe has to be rendered.
pub fn get_output_file_paths<'a>(
    source: impl Into<OutputSource<'a>>,
    config: &RenderConfig,
    no_download_source: bool,
) -> Result<Vec<PathBuf>> {
    match source.into() {
        OutputSource::Metadata(metadata) => Ok(vec![render::output_file_path(metadata)?]),
        recipe @ OutputSource::Recipe(_) => {
            Renderer::new(config.clone())?.get_output_file_paths(recipe, no_download_source)
        }
    }
}
