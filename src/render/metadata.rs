// src/render/metadata.rs

//! Rendered recipe metadata
//!
//! A [`Metadata`] binds one evaluated recipe document to one variant
//! selection and to its own configuration snapshot. It starts out
//! non-final; finalization consumes it and returns a final value carrying
//! pinned requirements, the dependency hash and the build string.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::recipe::{Phase, PinDepends, RecipeDocument, SourceSpec};
use crate::variant::VariantSelection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Derived package identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildIdentity {
    pub name: String,
    pub version: String,
    pub build_number: u64,
    pub build_string: String,
}

impl BuildIdentity {
    /// `name-version-build_string`
    pub fn dist_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build_string)
    }
}

/// One rendered recipe variant
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    recipe_path: PathBuf,
    document: RecipeDocument,
    variant: VariantSelection,
    used_variables: BTreeSet<String>,
    config: RenderConfig,
    is_final: bool,
    hash: Option<String>,
    build_string: Option<String>,
    recorded_pins: Vec<String>,
}

impl Metadata {
    /// Create non-final metadata
    pub fn new(
        recipe_path: PathBuf,
        document: RecipeDocument,
        variant: VariantSelection,
        used_variables: BTreeSet<String>,
        config: RenderConfig,
    ) -> Self {
        Self {
            recipe_path,
            document,
            variant,
            used_variables,
            config,
            is_final: false,
            hash: None,
            build_string: None,
            recorded_pins: Vec::new(),
        }
    }

    /// Turn this metadata into its final form
    pub(crate) fn into_final(
        mut self,
        document: RecipeDocument,
        hash: String,
        build_string: String,
        recorded_pins: Vec<String>,
    ) -> Self {
        self.document = document;
        self.hash = Some(hash);
        self.build_string = Some(build_string);
        self.recorded_pins = recorded_pins;
        self.is_final = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.document.package.name
    }

    pub fn version(&self) -> &str {
        &self.document.package.version
    }

    pub fn build_number(&self) -> u64 {
        self.document.build.number
    }

    /// Build string of the package
    ///
    /// Final metadata always has one. Non-final metadata only has one when
    /// the recipe spells it out; otherwise it depends on the dependency
    /// hash and the call fails with [`Error::HashInputIncomplete`].
    pub fn build_id(&self) -> Result<String> {
        if let Some(ref build_string) = self.build_string {
            return Ok(build_string.clone());
        }
        match self.document.build.string {
            Some(ref explicit) if !explicit.is_empty() => Ok(explicit.clone()),
            _ => Err(Error::HashInputIncomplete {
                package: self.name().to_string(),
            }),
        }
    }

    /// Whether the recipe replaces the computed build string
    pub fn has_explicit_build_string(&self) -> bool {
        self.document
            .build
            .string
            .as_ref()
            .is_some_and(|s| !s.is_empty())
            && self.build_string.as_deref() == self.document.build.string.as_deref()
    }

    /// Dependency hash token (`h` + 7 hex digits)
    pub fn hash_dependencies(&self) -> Result<String> {
        match (self.is_final, self.hash.as_ref()) {
            (true, Some(hash)) => Ok(hash.clone()),
            _ => Err(Error::HashInputIncomplete {
                package: self.name().to_string(),
            }),
        }
    }

    /// `name-version-build_string`
    pub fn dist_name(&self) -> Result<String> {
        Ok(self.identity()?.dist_name())
    }

    /// Derived identity
    pub fn identity(&self) -> Result<BuildIdentity> {
        Ok(BuildIdentity {
            name: self.name().to_string(),
            version: self.version().to_string(),
            build_number: self.build_number(),
            build_string: self.build_id()?,
        })
    }

    pub fn requirements(&self, phase: Phase) -> &[String] {
        self.document.requirements(phase)
    }

    pub fn run_constrained(&self) -> &[String] {
        &self.document.requirements.run_constrained
    }

    pub fn source(&self) -> &[SourceSpec] {
        &self.document.source
    }

    pub fn pin_depends(&self) -> Option<PinDepends> {
        self.document.build.pin_depends
    }

    /// Exact pins recorded under `pin_depends: record`
    pub fn recorded_pins(&self) -> &[String] {
        &self.recorded_pins
    }

    pub fn variant(&self) -> &VariantSelection {
        &self.variant
    }

    /// Variant variables the recipe actually referenced
    pub fn used_variables(&self) -> &BTreeSet<String> {
        &self.used_variables
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn document(&self) -> &RecipeDocument {
        &self.document
    }

    pub fn recipe_path(&self) -> &Path {
        &self.recipe_path
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Whether any build, host or run requirement names python
    pub fn has_python_dependency(&self) -> bool {
        self.document.requirement_names().any(|name| name == "python")
    }

    /// Document as written out by `output_yaml`: the computed build string
    /// replaces the recipe's `build.string`
    pub fn output_document(&self) -> RecipeDocument {
        let mut doc = self.document.clone();
        if self.build_string.is_some() {
            doc.build.string = self.build_string.clone();
        }
        doc
    }

    /// Key for collapsing variants that render to the same package
    pub(crate) fn dedup_key(&self) -> String {
        let identity = match self.build_id() {
            Ok(build) => format!("{}-{}-{}", self.name(), self.version(), build),
            Err(_) => format!("{}-{}-#{}", self.name(), self.version(), self.build_number()),
        };
        let reqs: Vec<String> = [Phase::Build, Phase::Host, Phase::Run]
            .iter()
            .map(|phase| format!("{}={}", phase, self.requirements(*phase).join(";")))
            .collect();
        format!("{}|{}", identity, reqs.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;

    fn metadata(yaml: &str) -> Metadata {
        Metadata::new(
            PathBuf::from("/recipes/foo/meta.yaml"),
            parse_recipe(yaml).unwrap(),
            VariantSelection::default(),
            BTreeSet::new(),
            RenderConfig::default(),
        )
    }

    #[test]
    fn test_non_final_accessors() {
        let meta = metadata(
            r#"
package: {name: foo, version: "1.0"}
build: {number: 2}
requirements:
  run: [python]
"#,
        );
        assert_eq!(meta.name(), "foo");
        assert_eq!(meta.version(), "1.0");
        assert_eq!(meta.build_number(), 2);
        assert!(!meta.is_final());
        assert!(meta.has_python_dependency());
        assert!(matches!(
            meta.hash_dependencies(),
            Err(Error::HashInputIncomplete { .. })
        ));
        assert!(meta.build_id().is_err());
        assert!(meta.dist_name().is_err());
    }

    #[test]
    fn test_explicit_build_string_without_finalize() {
        let meta = metadata("package: {name: foo, version: '1.0'}\nbuild: {string: steve}");
        assert_eq!(meta.build_id().unwrap(), "steve");
        assert_eq!(meta.dist_name().unwrap(), "foo-1.0-steve");
        assert!(meta.hash_dependencies().is_err());
    }

    #[test]
    fn test_into_final() {
        let meta = metadata("package: {name: foo, version: '1.0'}");
        let doc = meta.document().clone();
        let final_meta = meta.into_final(doc, "habcdef0".into(), "habcdef0_0".into(), vec![]);

        assert!(final_meta.is_final());
        assert_eq!(final_meta.hash_dependencies().unwrap(), "habcdef0");
        assert_eq!(final_meta.dist_name().unwrap(), "foo-1.0-habcdef0_0");
        assert!(!final_meta.has_explicit_build_string());
        assert_eq!(
            final_meta.output_document().build.string.as_deref(),
            Some("habcdef0_0")
        );
    }

    #[test]
    fn test_dedup_key_distinguishes_requirements() {
        let a = metadata("package: {name: foo, version: '1.0'}\nrequirements: {run: [a]}");
        let b = metadata("package: {name: foo, version: '1.0'}\nrequirements: {run: [b]}");
        let c = metadata("package: {name: foo, version: '1.0'}\nrequirements: {run: [a]}");
        assert_ne!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key(), c.dedup_key());
    }
}
