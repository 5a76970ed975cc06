// src/lib.rs

//! Conary recipe renderer
//!
//! Turns templated source-package recipes into fully resolved build
//! metadata: one object per variant, with pinned requirements, a
//! dependency-derived build string and the path of the artifact it
//! would produce.
//!
//! # Architecture
//!
//! - Two-pass templates: fields that depend on the fetched source are
//!   evaluated only after the source is fetched, once per distinct source
//! - Variant matrices: only variables a recipe references are expanded
//! - Build identity: SHA-256 over the canonical finalized requirement set
//! - Collaborators behind traits: template engine, source provider,
//!   package resolver

pub mod api;
pub mod config;
mod error;
pub mod hash;
pub mod recipe;
pub mod render;
pub mod resolver;
pub mod source;
pub mod variant;
pub mod version;

pub use config::RenderConfig;
pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm};
pub use recipe::{Evaluation, Phase, RecipeDocument, TemplateEngine, TeraEngine};
pub use render::{
    BuildIdentity, CrossConfig, CrossPrefixResolver, DependencyHasher, Metadata, OutputSource,
    RenderOptions, RenderResult, RenderedMetadata, Renderer,
};
pub use resolver::{IndexResolver, PackageRecord, PackageResolver};
pub use source::{GitSourceProvider, NoopSourceProvider, SourceFacts, SourceProvider};
pub use variant::{VariantConfig, VariantSelection};
