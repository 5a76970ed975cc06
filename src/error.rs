// src/error.rs

//! Error types for recipe rendering

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while rendering recipes
#[derive(Debug, Error)]
pub enum Error {
    /// The recipe needs facts that only exist after the source is fetched,
    /// but downloading was disallowed for this render
    #[error(
        "recipe {recipe} needs downloaded source to evaluate {}; rerun without --no-download-source",
        expressions.join(", ")
    )]
    SourceRequired {
        recipe: PathBuf,
        expressions: Vec<String>,
    },

    /// The fetched source did not provide facts the recipe uses
    #[error("recipe {recipe} uses {} but the fetched source does not provide them", facts.join(", "))]
    MissingSourceFacts { recipe: PathBuf, facts: Vec<String> },

    /// The source provider could not fetch the source
    #[error("failed to fetch source {source_id}: {message}")]
    FetchError { source_id: String, message: String },

    /// A template or requirement references a variable nobody defines
    #[error("recipe {recipe} references variable '{variable}' which is not in the variant config")]
    AmbiguousVariant { recipe: PathBuf, variable: String },

    /// The dependency hash was requested before finalization
    #[error("cannot hash dependencies of {package}: metadata is not finalized")]
    HashInputIncomplete { package: String },

    /// Template evaluation failed
    #[error("template error in {recipe}: {message}")]
    TemplateError { recipe: PathBuf, message: String },

    /// Requirements could not be satisfied by the package index
    #[error("unsatisfiable {phase} requirements for {recipe} ({variant}): {}", specs.join(", "))]
    Unsatisfiable {
        recipe: PathBuf,
        phase: String,
        variant: String,
        specs: Vec<String>,
    },

    /// Invalid variant configuration
    #[error("invalid variant config: {0}")]
    VariantConfig(String),

    /// Invalid render configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Parsing failed
    #[error("parse error: {0}")]
    ParseError(String),

    /// I/O failure with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Required external tool is missing
    #[error("required tool not found: {0}")]
    ToolNotFound(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
