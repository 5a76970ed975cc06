// src/recipe/template.rs

//! Recipe template evaluation
//!
//! Recipes embed `{{ expr }}` and `{% stmt %}` blocks. Before rendering,
//! the engine scans the template for the identifiers and functions it
//! references. Identifiers that name source facts but have no value yet
//! are bound to the empty string and reported back in
//! [`Evaluation::NeedsSource`], so the caller decides whether to fetch.
//! Identifiers nobody defines are an error, never silently empty.
//!
//! Template functions available to recipes:
//!
//! - `compiler(lang='c')`: `<compiler>_<target subdir>`, taking the
//!   compiler name from the `<lang>_compiler` variant key
//! - `pin_compatible(name='zlib', min_pin=, max_pin=, exact=, lower_bound=,
//!   upper_bound=)`: a range around the version in the host environment
//! - `load_setup_py_data()`, `load_file_data(...)`, `load_file_regex(...)`:
//!   only meaningful inside a provisioned build environment; they evaluate
//!   to empty values here and mark the result for a later reparse
//!
//! Positional first arguments (`compiler('c')`, `pin_compatible('zlib')`)
//! are accepted and rewritten to keyword form before evaluation.

use crate::error::{Error, Result};
use crate::resolver::PackageRecord;
use crate::source::{is_source_variable, SourceFacts};
use crate::version::PinSpec;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;
use tera::{Context, Tera};

/// Functions that need a provisioned build environment to evaluate
pub const ENV_ONLY_FUNCTIONS: &[&str] = &["load_setup_py_data", "load_file_data", "load_file_regex"];

/// Default compiler package per language
fn default_compiler(lang: &str) -> &str {
    match lang {
        "c" => "gcc",
        "cxx" => "gxx",
        "fortran" => "gfortran",
        other => other,
    }
}

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{#.*?#\}").expect("valid comment regex"));
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{-?(.*?)-?\}\}|\{%-?(.*?)-?%\}").expect("valid block regex")
});
static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("valid string regex"));
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"));
static FOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfor\s+([A-Za-z_]\w*)(?:\s*,\s*([A-Za-z_]\w*))?\s+in\b").expect("valid for regex")
});
static SET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bset(?:_global)?\s+([A-Za-z_]\w*)\s*=").expect("valid set regex")
});
static COMPILER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bcompiler\(\s*(?:lang\s*=\s*)?["']([^"']+)["']"#).expect("valid compiler regex")
});
static POSITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(compiler|pin_compatible)\(\s*(["'])"#).expect("valid call regex")
});

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "elif", "endif", "for", "endfor", "set",
    "set_global", "endset", "true", "false", "True", "False", "none", "None", "loop", "break",
    "continue", "filter", "endfilter", "raw", "endraw", "macro", "endmacro", "block", "endblock",
    "extends", "include", "import", "as", "self", "super", "defined", "undefined",
];

/// What a template refers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateReferences {
    /// Free identifiers read by the template
    pub variables: BTreeSet<String>,
    /// Names of functions called
    pub functions: BTreeSet<String>,
    /// Languages passed to `compiler(...)`
    pub compilers: BTreeSet<String>,
}

impl TemplateReferences {
    /// Whether the recipe declares a compiler dependency
    pub fn uses_compiler(&self) -> bool {
        self.functions.contains("compiler")
    }

    /// Whether a later pass inside a build environment is required
    pub fn needs_build_env(&self) -> bool {
        self.functions
            .iter()
            .any(|f| ENV_ONLY_FUNCTIONS.contains(&f.as_str()))
    }

    /// Source facts referenced by the template
    pub fn source_variables(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .map(String::as_str)
            .filter(|v| is_source_variable(v))
    }
}

/// Outcome of evaluating a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Every expression evaluated
    Resolved(String),
    /// Some expressions need source facts; `provisional` was rendered with
    /// those facts bound to the empty string
    NeedsSource {
        provisional: String,
        missing: Vec<String>,
    },
}

impl Evaluation {
    /// The rendered text, provisional or not
    pub fn text(&self) -> &str {
        match self {
            Evaluation::Resolved(text) => text,
            Evaluation::NeedsSource { provisional, .. } => provisional,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Evaluation::Resolved(_))
    }

    /// Source facts that were missing
    pub fn missing(&self) -> &[String] {
        match self {
            Evaluation::Resolved(_) => &[],
            Evaluation::NeedsSource { missing, .. } => missing,
        }
    }
}

/// Variables and environment visible to a template
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: BTreeMap<String, Value>,
    host_packages: BTreeMap<String, PackageRecord>,
    target_subdir: String,
}

impl TemplateContext {
    /// Create an empty context for a target platform subdir
    pub fn new(target_subdir: impl Into<String>) -> Self {
        Self {
            target_subdir: target_subdir.into(),
            ..Default::default()
        }
    }

    /// Set a variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Get a variable as a string (numbers and booleans are stringified)
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.variables.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn target_subdir(&self) -> &str {
        &self.target_subdir
    }

    /// Bind the facts of a fetched source
    pub fn with_source_facts(mut self, facts: &SourceFacts) -> Self {
        for (name, value) in facts.variables() {
            self.insert(name.clone(), value.clone());
        }
        self
    }

    /// Make host environment records visible to `pin_compatible`
    pub fn with_host_packages(mut self, packages: &[PackageRecord]) -> Self {
        self.host_packages = packages
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        self
    }

    fn to_tera(&self) -> Context {
        let mut context = Context::new();
        for (name, value) in &self.variables {
            context.insert(name.as_str(), value);
        }
        context
    }
}

/// Trait for template evaluation
pub trait TemplateEngine: Send + Sync {
    /// Scan a template for the identifiers and functions it references
    fn references(&self, template: &str) -> TemplateReferences;

    /// Evaluate a template against a context
    fn evaluate(&self, recipe: &Path, template: &str, context: &TemplateContext) -> Result<Evaluation>;
}

/// Tera-backed template engine
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraEngine;

impl TeraEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `compiler('c')` to `compiler(lang='c')` and
    /// `pin_compatible('x')` to `pin_compatible(name='x')`
    fn normalize_calls(template: &str) -> String {
        POSITIONAL_RE
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let kwarg = if &caps[1] == "compiler" { "lang" } else { "name" };
                format!("{}({}={}", &caps[1], kwarg, &caps[2])
            })
            .into_owned()
    }

    fn build_tera(context: &TemplateContext) -> Tera {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        let subdir = context.target_subdir.clone();
        let variables = context.variables.clone();
        tera.register_function("compiler", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            let lang = args
                .get("lang")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("compiler() requires a `lang` argument"))?;

            let name = variables
                .get(&format!("{}_compiler", lang))
                .and_then(Value::as_str)
                .unwrap_or_else(|| default_compiler(lang))
                .to_string();
            let mut spec = format!("{}_{}", name, subdir);
            if let Some(version) = variables
                .get(&format!("{}_compiler_version", lang))
                .and_then(Value::as_str)
            {
                spec = format!("{} {}", spec, version);
            }
            Ok(Value::String(spec))
        });

        let host = context.host_packages.clone();
        tera.register_function("pin_compatible", move |args: &HashMap<String, Value>| -> tera::Result<Value> {
            pin_compatible(&host, args)
        });

        tera.register_function("load_setup_py_data", |_: &HashMap<String, Value>| -> tera::Result<Value> {
            Ok(Value::Object(serde_json::Map::new()))
        });
        tera.register_function("load_file_data", |_: &HashMap<String, Value>| -> tera::Result<Value> {
            Ok(Value::Object(serde_json::Map::new()))
        });
        tera.register_function("load_file_regex", |_: &HashMap<String, Value>| -> tera::Result<Value> {
            Ok(Value::Null)
        });

        tera
    }

    fn scan_expression(
        expr: &str,
        locals: &BTreeSet<String>,
        refs: &mut TemplateReferences,
    ) {
        let stripped = STRING_RE.replace_all(expr, "\"\"");

        for m in IDENT_RE.find_iter(&stripped) {
            let word = m.as_str();
            let raw_before = &stripped[..m.start()];

            // Part of a numeric literal such as `1e5`
            if raw_before
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_alphanumeric())
            {
                continue;
            }

            let before = raw_before.trim_end();
            if matches!(before.chars().last(), Some('.') | Some('|')) {
                continue;
            }

            let after = stripped[m.end()..].trim_start();
            if after.starts_with('(') {
                refs.functions.insert(word.to_string());
                continue;
            }
            if after.starts_with('=') && !after.starts_with("==") {
                continue;
            }
            if KEYWORDS.contains(&word) || locals.contains(word) {
                continue;
            }
            if after.starts_with("is ") && after.contains("defined") {
                continue;
            }

            refs.variables.insert(word.to_string());
        }
    }
}

impl TemplateEngine for TeraEngine {
    fn references(&self, template: &str) -> TemplateReferences {
        let template = COMMENT_RE.replace_all(template, "");
        let mut refs = TemplateReferences::default();

        let mut locals = BTreeSet::new();
        for caps in SET_RE.captures_iter(&template) {
            locals.insert(caps[1].to_string());
        }
        for caps in FOR_RE.captures_iter(&template) {
            locals.insert(caps[1].to_string());
            if let Some(second) = caps.get(2) {
                locals.insert(second.as_str().to_string());
            }
        }

        for caps in BLOCK_RE.captures_iter(&template) {
            if let Some(expr) = caps.get(1).or_else(|| caps.get(2)) {
                Self::scan_expression(expr.as_str(), &locals, &mut refs);
            }
        }

        for caps in COMPILER_RE.captures_iter(&template) {
            refs.compilers.insert(caps[1].to_string());
        }

        refs
    }

    fn evaluate(&self, recipe: &Path, template: &str, context: &TemplateContext) -> Result<Evaluation> {
        let refs = self.references(template);

        let mut missing = Vec::new();
        for variable in &refs.variables {
            if context.contains(variable) {
                continue;
            }
            if is_source_variable(variable) {
                missing.push(variable.clone());
                continue;
            }
            return Err(Error::AmbiguousVariant {
                recipe: recipe.to_path_buf(),
                variable: variable.clone(),
            });
        }

        let mut tera_context = context.to_tera();
        for variable in &missing {
            tera_context.insert(variable.as_str(), "");
        }

        let mut tera = Self::build_tera(context);
        let text = tera
            .render_str(&Self::normalize_calls(template), &tera_context)
            .map_err(|e| Error::TemplateError {
                recipe: recipe.to_path_buf(),
                message: format_tera_error(&e),
            })?;

        Ok(if missing.is_empty() {
            Evaluation::Resolved(text)
        } else {
            Evaluation::NeedsSource {
                provisional: text,
                missing,
            }
        })
    }
}

fn pin_compatible(
    host: &BTreeMap<String, PackageRecord>,
    args: &HashMap<String, Value>,
) -> tera::Result<Value> {
    let name = args
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("pin_compatible() requires a `name` argument"))?;

    // Before the host environment is resolved the requirement stays bare
    let Some(record) = host.get(name) else {
        return Ok(Value::String(name.to_string()));
    };

    if args.get("exact").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(Value::String(record.dist_string()));
    }

    let lower = args.get("lower_bound").and_then(Value::as_str);
    let upper = args.get("upper_bound").and_then(Value::as_str);
    let pins = if lower.is_some() || upper.is_some() {
        let mut bounds = Vec::new();
        if let Some(lower) = lower {
            bounds.push(format!(">={}", lower));
        }
        if let Some(upper) = upper {
            bounds.push(format!("<{}", upper));
        }
        bounds.join(",")
    } else {
        let defaults = PinSpec::compatible();
        let min_pin = args.get("min_pin").and_then(Value::as_str).or(defaults.min_pin.as_deref());
        let max_pin = args.get("max_pin").and_then(Value::as_str).or(defaults.max_pin.as_deref());
        crate::version::apply_pin_expressions(&record.version, min_pin, max_pin)
            .map_err(|e| tera::Error::msg(e.to_string()))?
    };

    if pins.is_empty() {
        Ok(Value::String(name.to_string()))
    } else {
        Ok(Value::String(format!("{} {}", name, pins)))
    }
}

/// Flatten a tera error and its causes into one message
fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error as _;

    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    messages
        .into_iter()
        .map(|m| m.replace("'__tera_one_off'", "recipe"))
        .collect::<Vec<_>>()
        .join(": ")
}
