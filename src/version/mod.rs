// src/version/mod.rs

//! Version handling and constraint satisfaction for recipe requirements
//!
//! Versions follow the loose dotted form used by source packages
//! (`1.2.8`, `3.6`, `2.0a0`, `1.0rc1`). Each dot/underscore separated
//! component is split into numeric and alphabetic runs; alphabetic runs sort
//! before numeric ones so that `2.0a0 < 2.0 == 2.0.0`.

mod pin;

pub use pin::{apply_pin_expressions, PinSpec};

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// One run inside a version component
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Str(String),
    Num(u64),
}

impl Part {
    fn rank(&self) -> u8 {
        match self {
            // "dev" releases sort before everything else
            Part::Str(s) if s == "dev" => 0,
            Part::Str(_) => 1,
            Part::Num(_) => 2,
        }
    }
}

impl Ord for Part {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Part::Num(a), Part::Num(b)) => a.cmp(b),
            (Part::Str(a), Part::Str(b)) if self.rank() == other.rank() => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed package version
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    components: Vec<Vec<Part>>,
}

impl PackageVersion {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → [[1], [2], [3]]
    /// - "2.0a0" → [[2], [0, "a", 0]]
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::ParseError("Empty version string".to_string()));
        }
        if raw.contains(char::is_whitespace) {
            return Err(Error::ParseError(format!(
                "Version '{}' contains whitespace",
                raw
            )));
        }

        let components = raw
            .to_lowercase()
            .split(['.', '_', '-'])
            .map(split_component)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    /// The version exactly as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of dotted components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the version has no components (never true for parsed versions)
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Check whether this version starts with all components of `prefix`
    pub fn starts_with(&self, prefix: &PackageVersion) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix
                .components
                .iter()
                .zip(&self.components)
                .all(|(p, c)| cmp_component(p, c) == Ordering::Equal)
    }
}

fn split_component(component: &str) -> Result<Vec<Part>> {
    if component.is_empty() {
        return Ok(vec![Part::Num(0)]);
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut numeric = None;

    for ch in component.chars() {
        let is_digit = ch.is_ascii_digit();
        if numeric.is_some_and(|n| n != is_digit) {
            parts.push(make_part(&current, numeric.unwrap_or(false))?);
            current.clear();
        }
        numeric = Some(is_digit);
        current.push(ch);
    }
    parts.push(make_part(&current, numeric.unwrap_or(false))?);

    Ok(parts)
}

fn make_part(run: &str, numeric: bool) -> Result<Part> {
    if numeric {
        run.parse::<u64>()
            .map(Part::Num)
            .map_err(|e| Error::ParseError(format!("Invalid version number '{}': {}", run, e)))
    } else {
        Ok(Part::Str(run.to_string()))
    }
}

fn cmp_component(a: &[Part], b: &[Part]) -> Ordering {
    let zero = Part::Num(0);
    let len = a.len().max(b.len());
    for i in 0..len {
        let pa = a.get(i).unwrap_or(&zero);
        let pb = b.get(i).unwrap_or(&zero);
        match pa.cmp(pb) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = vec![Part::Num(0)];
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).unwrap_or(&zero);
            let b = other.components.get(i).unwrap_or(&zero);
            match cmp_component(a, b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match (`==1.2`, or a bare `1.2`)
    Exact(PackageVersion),
    /// Prefix match (`1.2.*`, `=1.2`)
    Prefix(PackageVersion),
    /// Greater than
    GreaterThan(PackageVersion),
    /// Greater than or equal
    GreaterOrEqual(PackageVersion),
    /// Less than
    LessThan(PackageVersion),
    /// Less than or equal
    LessOrEqual(PackageVersion),
    /// Not equal
    NotEqual(PackageVersion),
    /// Every constraint must hold (`>=1.2.8,<2.0a0`)
    All(Vec<VersionConstraint>),
    /// At least one constraint must hold (`1.2.*|2.0.*`)
    AnyOf(Vec<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// Examples:
    /// - ">=1.2.8,<2.0a0" → All([GreaterOrEqual(1.2.8), LessThan(2.0a0)])
    /// - "3.6.*" → Prefix(3.6)
    /// - "1.2.8" → Exact(1.2.8)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if s.contains('|') {
            let parts = s
                .split('|')
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(VersionConstraint::AnyOf(parts));
        }

        if s.contains(',') {
            let parts = s
                .split(',')
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(VersionConstraint::All(parts));
        }

        // Check longer operators first
        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionConstraint::NotEqual(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("==") {
            Ok(VersionConstraint::Exact(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            let rest = rest.trim_end_matches(".*").trim_end_matches('*');
            Ok(VersionConstraint::Prefix(PackageVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_suffix('*') {
            let rest = rest.trim_end_matches('.');
            if rest.is_empty() {
                return Ok(VersionConstraint::Any);
            }
            Ok(VersionConstraint::Prefix(PackageVersion::parse(rest)?))
        } else {
            Ok(VersionConstraint::Exact(PackageVersion::parse(s)?))
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &PackageVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::Prefix(v) => version.starts_with(v),
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::All(parts) => parts.iter().all(|c| c.satisfies(version)),
            VersionConstraint::AnyOf(parts) => parts.iter().any(|c| c.satisfies(version)),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "{}", v),
            VersionConstraint::Prefix(v) => write!(f, "{}.*", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!={}", v),
            VersionConstraint::All(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            VersionConstraint::AnyOf(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join("|"))
            }
        }
    }
}

/// A requirement line: `name [version-constraint [build]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    pub name: String,
    pub version: Option<String>,
    pub build: Option<String>,
}

impl MatchSpec {
    /// Parse a requirement line such as `zlib >=1.2.8,<2.0a0` or
    /// `python 3.6.5 h1234567_0`
    pub fn parse(s: &str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        let name = fields
            .next()
            .ok_or_else(|| Error::ParseError("Empty requirement".to_string()))?;
        let version = fields.next().map(str::to_string);
        let build = fields.next().map(str::to_string);

        if let Some(extra) = fields.next() {
            return Err(Error::ParseError(format!(
                "Unexpected token '{}' in requirement '{}'",
                extra, s
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version,
            build,
        })
    }

    /// Whether the requirement carries no version or build constraint
    pub fn is_bare(&self) -> bool {
        self.version.is_none() && self.build.is_none()
    }

    /// Parsed version constraint (Any when absent)
    pub fn constraint(&self) -> Result<VersionConstraint> {
        match &self.version {
            Some(v) => VersionConstraint::parse(v),
            None => Ok(VersionConstraint::Any),
        }
    }

    /// Check whether a concrete `version`/`build` pair satisfies this spec
    pub fn matches(&self, version: &PackageVersion, build: &str) -> Result<bool> {
        if !self.constraint()?.satisfies(version) {
            return Ok(false);
        }
        Ok(match &self.build {
            None => true,
            Some(pattern) => match pattern.strip_suffix('*') {
                Some(prefix) => build.starts_with(prefix),
                None => build == pattern,
            },
        })
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(ref version) = self.version {
            write!(f, " {}", version)?;
        }
        if let Some(ref build) = self.build {
            write!(f, " {}", build)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn test_version_compare_numeric() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("3.6.5") > v("2.7.15"));
    }

    #[test]
    fn test_version_trailing_zeros_equal() {
        assert_eq!(v("2.0"), v("2.0.0"));
        assert_eq!(v("1.11"), v("1.11.0"));
    }

    #[test]
    fn test_version_alpha_sorts_before_release() {
        assert!(v("2.0a0") < v("2.0"));
        assert!(v("2.0a0") < v("2.0.0"));
        assert!(v("1.9.9") < v("2.0a0"));
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0dev") < v("1.0a1"));
    }

    #[test]
    fn test_version_parse_rejects_empty() {
        assert!(PackageVersion::parse("").is_err());
        assert!(PackageVersion::parse("1 2").is_err());
    }

    #[test]
    fn test_version_display_keeps_raw() {
        assert_eq!(v("1.20.2").to_string(), "1.20.2");
    }

    #[test]
    fn test_constraint_range() {
        let c = VersionConstraint::parse(">=1.2.8,<2.0a0").unwrap();
        assert!(c.satisfies(&v("1.2.8")));
        assert!(c.satisfies(&v("1.9")));
        assert!(!c.satisfies(&v("2.0")));
        assert!(!c.satisfies(&v("1.2.7")));
    }

    #[test]
    fn test_constraint_prefix() {
        let c = VersionConstraint::parse("3.6.*").unwrap();
        assert!(c.satisfies(&v("3.6.5")));
        assert!(c.satisfies(&v("3.6")));
        assert!(!c.satisfies(&v("3.7.0")));
        assert!(!c.satisfies(&v("3.60")));

        let c = VersionConstraint::parse("=1.2").unwrap();
        assert!(c.satisfies(&v("1.2.9")));
    }

    #[test]
    fn test_constraint_exact_and_any() {
        assert!(VersionConstraint::parse("1.2.8").unwrap().satisfies(&v("1.2.8")));
        assert!(!VersionConstraint::parse("1.2.8").unwrap().satisfies(&v("1.2.9")));
        assert!(VersionConstraint::parse("*").unwrap().satisfies(&v("99")));
    }

    #[test]
    fn test_constraint_or() {
        let c = VersionConstraint::parse("2.7.*|3.6.*").unwrap();
        assert!(c.satisfies(&v("2.7.15")));
        assert!(c.satisfies(&v("3.6.5")));
        assert!(!c.satisfies(&v("3.5.0")));
    }

    #[test]
    fn test_constraint_display() {
        let c = VersionConstraint::parse(">=1.2.8,<2.0a0").unwrap();
        assert_eq!(c.to_string(), ">=1.2.8,<2.0a0");
    }

    #[test]
    fn test_matchspec_parse() {
        let spec = MatchSpec::parse("python 3.6.5 h1234567_0").unwrap();
        assert_eq!(spec.name, "python");
        assert_eq!(spec.version.as_deref(), Some("3.6.5"));
        assert_eq!(spec.build.as_deref(), Some("h1234567_0"));
        assert_eq!(spec.to_string(), "python 3.6.5 h1234567_0");

        let bare = MatchSpec::parse("  zlib ").unwrap();
        assert!(bare.is_bare());
        assert_eq!(bare.to_string(), "zlib");

        assert!(MatchSpec::parse("").is_err());
        assert!(MatchSpec::parse("a 1 b c").is_err());
    }

    #[test]
    fn test_matchspec_matches_build() {
        let spec = MatchSpec::parse("zlib 1.2.* h*").unwrap();
        assert!(spec.matches(&v("1.2.11"), "h7b6447c_3").unwrap());
        assert!(!spec.matches(&v("1.2.11"), "0").unwrap());
        assert!(!spec.matches(&v("1.3"), "h1").unwrap());
    }
}
