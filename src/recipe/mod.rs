// src/recipe/mod.rs

//! Recipes: templated build descriptions
//!
//! A recipe directory holds a `meta.yaml` whose text is a template. The
//! template is evaluated against a variant selection (and, when needed,
//! facts from the fetched source) and the resulting YAML is parsed into a
//! [`RecipeDocument`].
//!
//! # Example Recipe
//!
//! ```yaml
//! package:
//!   name: libfoo
//!   version: "{{ GIT_DESCRIBE_TAG }}"
//!
//! source:
//!   git_url: https://example.com/libfoo.git
//!   git_tag: v1.2.0
//!
//! build:
//!   number: {{ GIT_DESCRIBE_NUMBER }}
//!
//! requirements:
//!   build:
//!     - {{ compiler('c') }}
//!   host:
//!     - python
//!     - zlib
//!   run:
//!     - python
//!     - {{ pin_compatible('zlib') }}
//! ```

mod format;
pub mod parser;
pub mod template;

pub use format::{
    AboutSection, BuildSection, PackageSection, Phase, PinDepends, RecipeDocument,
    RequirementsSection, SourceSpec, TestSection,
};
pub use parser::{find_recipe_file, parse_recipe, parse_recipe_file, validate_recipe};
pub use template::{
    Evaluation, TemplateContext, TemplateEngine, TemplateReferences, TeraEngine,
    ENV_ONLY_FUNCTIONS,
};
