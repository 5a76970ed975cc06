// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::recipe::format::RecipeDocument;
use std::path::{Path, PathBuf};

/// File names looked up when a recipe directory is given
pub const RECIPE_FILE_NAMES: &[&str] = &["meta.yaml", "meta.yml"];

/// Parse an evaluated recipe from a YAML string
pub fn parse_recipe(content: &str) -> Result<RecipeDocument> {
    let mut doc: RecipeDocument = serde_yaml::from_str(content)
        .map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))?;
    doc.normalize();
    Ok(doc)
}

/// Parse an already-evaluated recipe from a file (no templating applied)
pub fn parse_recipe_file(path: &Path) -> Result<RecipeDocument> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read recipe file: {}", e)))?;

    parse_recipe(&content)
}

/// Locate the recipe file for a path that is either a directory or a file
pub fn find_recipe_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    if path.is_dir() {
        return RECIPE_FILE_NAMES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                Error::NotFound(format!("No meta.yaml in recipe directory {}", path.display()))
            });
    }

    Err(Error::NotFound(format!("Recipe path {} does not exist", path.display())))
}

/// Validate a recipe for completeness and correctness
pub fn validate_recipe(recipe: &RecipeDocument) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.package.name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::ParseError("Recipe package version cannot be empty".to_string()));
    }
    if recipe.package.name.contains(char::is_whitespace) {
        return Err(Error::ParseError(format!(
            "Recipe package name '{}' contains whitespace",
            recipe.package.name
        )));
    }
    if recipe.package.version.contains(['-', ' ']) {
        return Err(Error::ParseError(format!(
            "Recipe package version '{}' must not contain '-' or spaces",
            recipe.package.version
        )));
    }

    let about = recipe.about.clone().unwrap_or_default();
    if about.summary.is_none() {
        warnings.push("Missing package summary".to_string());
    }
    if about.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    for source in &recipe.source {
        if source.url.is_some() && source.sha256.is_none() {
            warnings.push(format!("Remote source {} has no checksum", source.display_id()));
        }
        if source.is_git() && source.git_rev.is_none() && source.git_tag.is_none() {
            warnings.push(format!(
                "Git source {} is not pinned to a tag or revision",
                source.display_id()
            ));
        }
    }

    Ok(warnings)
}
