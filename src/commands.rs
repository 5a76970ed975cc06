// src/commands.rs
//! Command handlers for the conary-render CLI

use crate::cli::ConfigArgs;
use anyhow::{Context, Result};
use conary_render::{api, RenderConfig, RenderOptions, VariantConfig};
use std::path::Path;
use tracing::info;

/// Build the render configuration from command-line options
pub fn load_config(args: &ConfigArgs) -> Result<RenderConfig> {
    let mut config = match args.config {
        Some(ref path) => RenderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RenderConfig::default(),
    };

    for path in &args.variant_configs {
        let variant = VariantConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load variant config {}", path.display()))?;
        config.variant.merge(variant);
    }

    if let Some(ref platform) = args.target_platform {
        config = config.with_host_subdir(platform.clone());
    }
    if let Some(ref croot) = args.croot {
        config = config.with_croot(croot.clone());
    }

    Ok(config)
}

/// Render a recipe and print or write its metadata
pub fn cmd_render(
    recipe: &Path,
    args: &ConfigArgs,
    no_finalize: bool,
    bypass_env_check: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(args)?;
    let options = RenderOptions::new()
        .no_download_source(args.no_download_source)
        .finalize(!no_finalize)
        .bypass_env_check(bypass_env_check);

    let rendered = api::render(recipe, &config, &options)
        .with_context(|| format!("Failed to render {}", recipe.display()))?;

    let mut documents = Vec::with_capacity(rendered.len());
    for entry in &rendered {
        if entry.need_download {
            info!(
                "{}: some fields need the downloaded source and were left empty",
                entry.metadata.name()
            );
        }
        if entry.need_reparse_in_env {
            info!(
                "{}: recipe must be re-rendered inside its build environment",
                entry.metadata.name()
            );
        }
        documents.push(api::output_yaml(&entry.metadata, None)?);
    }

    let text = documents.join("---\n");
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} rendered variant(s) to {}", rendered.len(), path.display());
        }
        None => print!("{}", text),
    }

    Ok(())
}

/// Print artifact paths for every variant of a recipe
pub fn cmd_output_path(recipe: &Path, args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    let paths = api::get_output_file_paths(recipe, &config, args.no_download_source)
        .with_context(|| format!("Failed to compute output paths for {}", recipe.display()))?;

    for path in paths {
        println!("{}", path.display());
    }

    Ok(())
}
