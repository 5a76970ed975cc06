// src/render/finalize.rs

//! Finalization: from rendered requirements to a pinned, hashed package
//!
//! 1. Build and host specs get their variant values (`python` becomes
//!    `python 3.6.*`) and are resolved against the package index.
//! 2. The recipe is re-evaluated with the host environment visible, so
//!    `pin_compatible` can produce ranges.
//! 3. Bare run requirements found in the host environment are pinned with
//!    `pin_run_as_build`; `pin_depends: strict` pins them exactly.
//! 4. The dependency hash is computed over the finalized requirements.
//! 5. The recipe is evaluated one last time with `PKG_HASH` set, which
//!    yields the explicit build string if the recipe has one.

use super::hasher::DependencyHasher;
use super::metadata::Metadata;
use super::parse_rendered;
use crate::error::{Error, Result};
use crate::recipe::{Phase, PinDepends, RecipeDocument, TemplateContext, TemplateEngine};
use crate::resolver::{PackageRecord, PackageResolver};
use crate::variant::{VariantConfig, VariantSelection};
use crate::version::MatchSpec;
use std::path::Path;
use tracing::debug;

/// A rendered variant waiting for finalization
pub(crate) struct PendingRender {
    pub metadata: Metadata,
    pub context: TemplateContext,
}

/// One resolved environment
struct Environment {
    packages: Vec<PackageRecord>,
    /// Finalized requirement lines: resolved records, then specs kept as
    /// written when the environment check is bypassed
    requirements: Vec<String>,
}

/// Shared state for finalizing the variants of one recipe
pub(crate) struct Finalizer<'a> {
    pub engine: &'a dyn TemplateEngine,
    pub resolver: &'a dyn PackageResolver,
    pub template: &'a str,
    pub bypass_env_check: bool,
}

impl Finalizer<'_> {
    pub fn finalize(&self, pending: PendingRender) -> Result<Metadata> {
        let PendingRender { metadata, context } = pending;
        let recipe = metadata.recipe_path().to_path_buf();
        let variant = metadata.variant().clone();
        let config = metadata.config().clone();
        let has_host = metadata.document().has_host_section();

        let build_specs = apply_variant(metadata.requirements(Phase::Build), &variant)?;
        let host_specs = apply_variant(metadata.requirements(Phase::Host), &variant)?;

        let build_env =
            self.resolve_env(&recipe, Phase::Build, &build_specs, &config.build_subdir, &variant)?;
        let host_env =
            self.resolve_env(&recipe, Phase::Host, &host_specs, &config.host_subdir, &variant)?;

        // Without a host section the build environment doubles as host
        let target_env = if has_host { &host_env } else { &build_env };

        let pinned_context = context.with_host_packages(&target_env.packages);
        let mut doc = self.evaluate(&recipe, &pinned_context)?;

        let pin_depends = doc.build.pin_depends;
        let (run, recorded_pins) =
            pin_run_requirements(&doc.requirements.run, &target_env.packages, &config.variant, pin_depends)?;

        doc.requirements.build = build_env.requirements.clone();
        doc.requirements.host = has_host.then(|| host_env.requirements.clone());
        doc.requirements.run = run;

        // Without a host section the build env is the target env
        let host_input = if has_host {
            doc.requirements(Phase::Host)
        } else {
            doc.requirements(Phase::Build)
        };
        let hash = DependencyHasher::new(config.hash_build_dependencies).hash(
            &doc.requirements.build,
            host_input,
            &doc.requirements.run,
            pin_depends,
        )?;

        let mut identity_context = pinned_context;
        identity_context.insert("PKG_HASH", hash.clone());
        let identity_doc = self.evaluate(&recipe, &identity_context)?;

        let build_string = match identity_doc.build.string.filter(|s| !s.is_empty()) {
            Some(explicit) => {
                doc.build.string = Some(explicit.clone());
                explicit
            }
            None => {
                doc.build.string = None;
                let python = python_tag(&doc, &variant, &target_env.packages);
                default_build_string(python.as_deref(), &hash, doc.build.number)
            }
        };

        debug!(
            "Finalized {}-{}-{} ({})",
            doc.package.name, doc.package.version, build_string, variant
        );

        Ok(metadata.into_final(doc, hash, build_string, recorded_pins))
    }

    fn evaluate(&self, recipe: &Path, context: &TemplateContext) -> Result<RecipeDocument> {
        let evaluation = self.engine.evaluate(recipe, self.template, context)?;
        parse_rendered(recipe, evaluation.text())
    }

    fn resolve_env(
        &self,
        recipe: &Path,
        phase: Phase,
        specs: &[MatchSpec],
        subdir: &str,
        variant: &VariantSelection,
    ) -> Result<Environment> {
        if specs.is_empty() {
            return Ok(Environment {
                packages: Vec::new(),
                requirements: Vec::new(),
            });
        }

        let resolution = self.resolver.resolve(specs, subdir)?;
        if !resolution.is_satisfied() && !self.bypass_env_check {
            return Err(Error::Unsatisfiable {
                recipe: recipe.to_path_buf(),
                phase: phase.to_string(),
                variant: variant.to_string(),
                specs: resolution.unsatisfied.iter().map(|s| s.to_string()).collect(),
            });
        }

        let mut requirements: Vec<String> =
            resolution.packages.iter().map(PackageRecord::dist_string).collect();
        requirements.extend(resolution.unsatisfied.iter().map(|s| s.to_string()));

        Ok(Environment {
            packages: resolution.packages,
            requirements,
        })
    }
}

/// Constraint a variant value places on a bare requirement
fn variant_constraint(value: &str) -> String {
    let plain = value.starts_with(|c: char| c.is_ascii_digit())
        && !value.contains(['*', '<', '>', '=', ',', '|', ' ']);
    if plain {
        format!("{}.*", value)
    } else {
        value.to_string()
    }
}

/// Parse requirements, constraining bare names that are variant variables
fn apply_variant(requirements: &[String], variant: &VariantSelection) -> Result<Vec<MatchSpec>> {
    requirements
        .iter()
        .map(|req| {
            let spec = MatchSpec::parse(req)?;
            match variant.get(&spec.name) {
                Some(value) if spec.is_bare() && !value.is_empty() => {
                    MatchSpec::parse(&format!("{} {}", spec.name, variant_constraint(value)))
                }
                _ => Ok(spec),
            }
        })
        .collect()
}

/// Pin run requirements against the environment they were built with
///
/// Returns the finalized run list and the exact pins recorded under
/// `pin_depends: record`.
fn pin_run_requirements(
    run: &[String],
    env: &[PackageRecord],
    variant: &VariantConfig,
    pin_depends: Option<PinDepends>,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut pinned: Vec<String> = Vec::new();
    let mut recorded = Vec::new();

    for req in run {
        let spec = MatchSpec::parse(req)?;
        let record = env.iter().find(|r| r.name == spec.name);

        let line = match (record, pin_depends) {
            (Some(record), Some(PinDepends::Strict)) => record.dist_string(),
            (Some(record), _) if spec.is_bare() => match variant.pin_run_as_build(&spec.name) {
                Some(pin) => {
                    let range = pin.apply(&record.version)?;
                    if range.is_empty() {
                        spec.name.clone()
                    } else {
                        format!("{} {}", spec.name, range)
                    }
                }
                None => req.clone(),
            },
            _ => req.clone(),
        };

        if let (Some(record), Some(PinDepends::Record)) = (record, pin_depends) {
            recorded.push(record.dist_string());
        }
        if !pinned.contains(&line) {
            pinned.push(line);
        }
    }

    // Run exports of the environment apply unless the recipe names the package
    for record in env {
        for export in &record.run_exports {
            let name = export.split_whitespace().next().unwrap_or_default();
            let already = pinned
                .iter()
                .any(|p| p.split_whitespace().next() == Some(name));
            if !name.is_empty() && !already {
                pinned.push(export.clone());
            }
        }
    }

    Ok((pinned, recorded))
}

/// `py<PP>` tag for packages that depend on python
fn python_tag(doc: &RecipeDocument, variant: &VariantSelection, env: &[PackageRecord]) -> Option<String> {
    if !doc.requirement_names().any(|name| name == "python") {
        return None;
    }

    let version = variant
        .get("python")
        .map(str::to_string)
        .or_else(|| env.iter().find(|r| r.name == "python").map(|r| r.version.clone()))?;

    let digits: String = version
        .split('.')
        .take(2)
        .map(|part| part.chars().take_while(char::is_ascii_digit).collect::<String>())
        .collect();

    (!digits.is_empty()).then(|| format!("py{}", digits))
}

/// Build string used when the recipe does not set one
fn default_build_string(python: Option<&str>, hash: &str, build_number: u64) -> String {
    format!("{}{}_{}", python.unwrap_or_default(), hash, build_number)
}
