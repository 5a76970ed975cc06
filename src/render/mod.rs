// src/render/mod.rs

//! Recipe rendering
//!
//! The [`Renderer`] turns one recipe into one metadata object per variant:
//!
//! 1. Scan the template for referenced variables and functions.
//! 2. Evaluate once with the first value of every variant variable to
//!    learn which variables the recipe uses (template identifiers and bare
//!    requirement names).
//! 3. Expand the variant matrix over the used variables.
//! 4. Evaluate each variant; when source facts are missing, fetch the
//!    sources (once per distinct spec) and evaluate again.
//! 5. Optionally finalize each variant in parallel.
//!
//! Collaborators are trait objects so tests and embedders can replace the
//! template engine, the source provider and the package resolver.

mod cross;
mod finalize;
mod hasher;
mod metadata;
mod output;

pub use cross::{CrossConfig, CrossPrefixResolver};
pub use hasher::{DependencyHasher, HASH_DIGITS};
pub use metadata::{BuildIdentity, Metadata};
pub use output::{output_file_path, output_yaml, OutputSource};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::recipe::{
    find_recipe_file, parse_recipe, validate_recipe, RecipeDocument, SourceSpec, TemplateContext,
    TemplateEngine, TemplateReferences, TeraEngine,
};
use crate::resolver::PackageResolver;
use crate::source::{FetchCache, GitSourceProvider, SourceProvider};
use crate::variant::VariantSelection;
use finalize::{Finalizer, PendingRender};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Options for a single render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Never fetch sources; recipes that need source facts fail when
    /// finalizing and come back non-final otherwise
    pub no_download_source: bool,
    /// Resolve, pin and hash requirements
    pub finalize: bool,
    /// Keep unsatisfiable build/host specs as written instead of failing
    pub bypass_env_check: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            no_download_source: false,
            finalize: true,
            bypass_env_check: false,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_download_source(mut self, value: bool) -> Self {
        self.no_download_source = value;
        self
    }

    pub fn finalize(mut self, value: bool) -> Self {
        self.finalize = value;
        self
    }

    pub fn bypass_env_check(mut self, value: bool) -> Self {
        self.bypass_env_check = value;
        self
    }
}

/// One entry of a render result
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMetadata {
    pub metadata: Metadata,
    /// Some expressions were left unevaluated because sources were not
    /// downloaded
    pub need_download: bool,
    /// The recipe calls functions that only work inside a provisioned
    /// build environment
    pub need_reparse_in_env: bool,
}

/// Ordered render output, one entry per distinct variant
pub type RenderResult = Vec<RenderedMetadata>;

/// Parse evaluated recipe text, naming the recipe in errors
pub(crate) fn parse_rendered(recipe: &Path, text: &str) -> Result<RecipeDocument> {
    parse_recipe(text).map_err(|e| match e {
        Error::ParseError(message) => {
            Error::ParseError(format!("{}: {}", recipe.display(), message))
        }
        other => other,
    })
}

/// Recipe renderer
pub struct Renderer {
    config: RenderConfig,
    engine: Arc<dyn TemplateEngine>,
    source_provider: Arc<dyn SourceProvider>,
    resolver: Arc<dyn PackageResolver>,
}

impl Renderer {
    /// Create a renderer with the default collaborators: the tera engine,
    /// the git source provider and an index resolver built from the config
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let resolver = config.package_resolver()?;
        let source_provider = GitSourceProvider::new(config.source_cache_dir());

        Ok(Self {
            config,
            engine: Arc::new(TeraEngine::new()),
            source_provider: Arc::new(source_provider),
            resolver: Arc::new(resolver),
        })
    }

    /// Replace the template engine
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the source provider
    pub fn with_source_provider(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.source_provider = provider;
        self
    }

    /// Replace the package resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn PackageResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render a recipe directory or recipe file
    pub fn render(&self, path: &Path, options: &RenderOptions) -> Result<RenderResult> {
        let recipe = find_recipe_file(path)?;
        let recipe_dir = recipe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let template = std::fs::read_to_string(&recipe).map_err(|e| {
            Error::IoError(format!("Failed to read recipe {}: {}", recipe.display(), e))
        })?;

        info!("Rendering {}", recipe.display());

        let refs = self.engine.references(&template);
        let need_reparse_in_env = refs.needs_build_env();

        let first = self.config.variant.first_selection();
        let provisional = self
            .engine
            .evaluate(&recipe, &template, &self.base_context(&first))?;
        let needs_source = !provisional.is_resolved();

        if needs_source && options.no_download_source && options.finalize {
            return Err(Error::SourceRequired {
                recipe,
                expressions: provisional.missing().to_vec(),
            });
        }
        let need_download = needs_source && options.no_download_source;

        let provisional_doc = parse_rendered(&recipe, provisional.text())?;
        let used = self.used_variables(&refs, &provisional_doc);
        let selections = self.config.variant.combinations(&used)?;
        debug!(
            "{} uses variant variables [{}]: {} combination(s)",
            recipe.display(),
            used.iter().cloned().collect::<Vec<_>>().join(", "),
            selections.len()
        );

        let mut fetches = FetchCache::new(self.source_provider.as_ref());
        let mut pending = Vec::with_capacity(selections.len());

        for selection in selections {
            let mut context = self.base_context(&selection);
            let mut evaluation = self.engine.evaluate(&recipe, &template, &context)?;

            if !evaluation.is_resolved() && !options.no_download_source {
                let doc = parse_rendered(&recipe, evaluation.text())?;
                let specs: Vec<SourceSpec> = doc
                    .source
                    .iter()
                    .map(|s| s.resolved_against(&recipe_dir))
                    .collect();

                let facts = fetches.facts_for(&specs)?;
                context = context.with_source_facts(&facts);
                evaluation = self.engine.evaluate(&recipe, &template, &context)?;
                if !evaluation.is_resolved() {
                    return Err(Error::MissingSourceFacts {
                        recipe,
                        facts: evaluation.missing().to_vec(),
                    });
                }
            }

            let doc = parse_rendered(&recipe, evaluation.text())?;
            if evaluation.is_resolved() {
                for warning in validate_recipe(&doc)? {
                    debug!("{}: {}", recipe.display(), warning);
                }
            }
            if doc.build.skip {
                debug!("Skipping {} for variant {}", doc.package.name, selection);
                continue;
            }

            let cross =
                CrossPrefixResolver::resolve(&self.config, doc.has_host_section(), refs.uses_compiler());
            let metadata = Metadata::new(
                recipe.clone(),
                doc,
                selection,
                used.clone(),
                cross.apply(&self.config),
            );
            pending.push(PendingRender { metadata, context });
        }

        if !fetches.is_empty() {
            info!("Fetched {} distinct source(s)", fetches.len());
        }

        let rendered: Vec<Metadata> = if options.finalize {
            let finalizer = Finalizer {
                engine: self.engine.as_ref(),
                resolver: self.resolver.as_ref(),
                template: &template,
                bypass_env_check: options.bypass_env_check,
            };
            pending
                .into_par_iter()
                .map(|p| finalizer.finalize(p))
                .collect::<Result<Vec<_>>>()?
        } else {
            pending.into_iter().map(|p| p.metadata).collect()
        };

        let mut seen = BTreeSet::new();
        let result: RenderResult = rendered
            .into_iter()
            .filter(|m| seen.insert(m.dedup_key()))
            .map(|metadata| RenderedMetadata {
                metadata,
                need_download,
                need_reparse_in_env,
            })
            .collect();

        info!("Rendered {} variant(s) of {}", result.len(), recipe.display());
        Ok(result)
    }

    /// Variables visible to every evaluation of a variant
    fn base_context(&self, selection: &VariantSelection) -> TemplateContext {
        let config = &self.config;
        let mut context = TemplateContext::new(config.host_subdir.clone());

        let platform = config.host_subdir.split('-').next().unwrap_or_default();
        context.insert("target_platform", config.host_subdir.clone());
        context.insert("build_platform", config.build_subdir.clone());
        context.insert("linux", platform == "linux");
        context.insert("osx", platform == "osx");
        context.insert("win", platform == "win");
        context.insert("unix", platform != "win");
        context.insert("PKG_HASH", "");

        if let Some(python) = selection.get("python") {
            let parts: Vec<&str> = python.split('.').take(2).collect();
            context.insert("PY_VER", parts.join("."));
            context.insert("CONDA_PY", parts.concat());
        }

        for (name, value) in selection.iter() {
            context.insert(name, value);
        }

        context
    }

    /// Variant variables a recipe references
    fn used_variables(&self, refs: &TemplateReferences, doc: &RecipeDocument) -> BTreeSet<String> {
        let variant = &self.config.variant;
        let mut used = BTreeSet::new();

        for name in &refs.variables {
            if variant.contains(name) {
                used.insert(name.clone());
            }
        }
        for name in doc.bare_requirement_names() {
            if variant.contains(name) {
                used.insert(name.to_string());
            }
        }
        for lang in &refs.compilers {
            for key in [format!("{}_compiler", lang), format!("{}_compiler_version", lang)] {
                if variant.contains(&key) {
                    used.insert(key);
                }
            }
        }

        used
    }
}
