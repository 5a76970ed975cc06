// src/variant/mod.rs

//! Variant matrices
//!
//! A variant config maps variable names to ordered candidate values:
//!
//! ```yaml
//! python: ["2.7", "3.6"]
//! numpy: ["1.11", "1.16"]
//! zip_keys:
//!   - [python, numpy]
//! pin_run_as_build:
//!   python: {min_pin: x.x, max_pin: x.x}
//! ```
//!
//! Only the variables a recipe actually references take part in expansion.
//! Keys in a `zip_keys` group advance together instead of forming a cross
//! product. Declaration order is preserved everywhere: the first key is the
//! outermost loop of the expansion.

use crate::error::{Error, Result};
use crate::version::PinSpec;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Ordered variable → candidate values mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantConfig {
    variables: Vec<(String, Vec<String>)>,
    zip_keys: Vec<Vec<String>>,
    pin_run_as_build: BTreeMap<String, PinSpec>,
}

impl VariantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate values of a variable, keeping its original position
    /// if it is already declared
    pub fn with_variable<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_variable(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a group of variables that advance in lock-step
    pub fn with_zip_keys<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zip_keys.push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Set how a bare run requirement is pinned against the host environment
    pub fn with_pin_run_as_build(mut self, name: impl Into<String>, pin: PinSpec) -> Self {
        self.pin_run_as_build.insert(name.into(), pin);
        self
    }

    fn set_variable(&mut self, name: String, values: Vec<String>) {
        match self.variables.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = values,
            None => self.variables.push((name, values)),
        }
    }

    /// Parse a variant config from YAML
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::VariantConfig(e.to_string()))
    }

    /// Load a variant config from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read variant config {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
            .map_err(|e| Error::VariantConfig(format!("{}: {}", path.display(), e)))
    }

    /// Layer another config on top of this one; its values win
    pub fn merge(&mut self, other: VariantConfig) {
        for (name, values) in other.variables {
            self.set_variable(name, values);
        }
        for group in other.zip_keys {
            if !self.zip_keys.contains(&group) {
                self.zip_keys.push(group);
            }
        }
        self.pin_run_as_build.extend(other.pin_run_as_build);
    }

    /// Variable names in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.variables
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn zip_keys(&self) -> &[Vec<String>] {
        &self.zip_keys
    }

    /// Pin used for a bare run requirement found in the host environment
    ///
    /// `python` defaults to `x.x`/`x.x` when not configured.
    pub fn pin_run_as_build(&self, name: &str) -> Option<PinSpec> {
        self.pin_run_as_build.get(name).cloned().or_else(|| {
            (name == "python").then(|| PinSpec {
                min_pin: Some("x.x".to_string()),
                max_pin: Some("x.x".to_string()),
            })
        })
    }

    /// The selection made of every variable's first value
    pub fn first_selection(&self) -> VariantSelection {
        VariantSelection {
            values: self
                .variables
                .iter()
                .filter_map(|(k, v)| v.first().map(|first| (k.clone(), first.clone())))
                .collect(),
        }
    }

    /// Expand the variables named in `used` into concrete selections
    ///
    /// Every selection assigns every declared variable: used ones take
    /// their expanded value, the rest their first value. With no used
    /// variables the result is exactly one selection.
    pub fn combinations(&self, used: &BTreeSet<String>) -> Result<Vec<VariantSelection>> {
        let mut units: Vec<Vec<&str>> = Vec::new();
        let mut placed: BTreeSet<&str> = BTreeSet::new();

        for (key, _) in self.variables.iter().filter(|(k, _)| used.contains(k)) {
            if placed.contains(key.as_str()) {
                continue;
            }
            let unit: Vec<&str> = match self.zip_keys.iter().find(|g| g.contains(key)) {
                Some(group) => group
                    .iter()
                    .map(String::as_str)
                    .filter(|member| self.contains(member))
                    .collect(),
                None => vec![key.as_str()],
            };
            placed.extend(unit.iter().copied());
            units.push(unit);
        }

        let mut rows: Vec<BTreeMap<&str, &str>> = vec![BTreeMap::new()];
        for unit in &units {
            let lengths: Vec<usize> = unit
                .iter()
                .map(|k| self.get(k).map(<[String]>::len).unwrap_or(0))
                .collect();
            let len = lengths[0];
            if len == 0 {
                return Err(Error::VariantConfig(format!("variable '{}' has no values", unit[0])));
            }
            if lengths.iter().any(|l| *l != len) {
                return Err(Error::VariantConfig(format!(
                    "zip_keys group [{}] has members of different lengths",
                    unit.join(", ")
                )));
            }

            let mut expanded = Vec::with_capacity(rows.len() * len);
            for row in &rows {
                for i in 0..len {
                    let mut next = row.clone();
                    for key in unit {
                        if let Some(values) = self.get(key) {
                            next.insert(*key, values[i].as_str());
                        }
                    }
                    expanded.push(next);
                }
            }
            rows = expanded;
        }

        Ok(rows
            .into_iter()
            .map(|row| VariantSelection {
                values: self
                    .variables
                    .iter()
                    .filter_map(|(k, v)| {
                        row.get(k.as_str())
                            .map(|s| s.to_string())
                            .or_else(|| v.first().cloned())
                            .map(|value| (k.clone(), value))
                    })
                    .collect(),
            })
            .collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Values {
    Many(Vec<Scalar>),
    One(Scalar),
}

struct VariantConfigVisitor;

impl<'de> Visitor<'de> for VariantConfigVisitor {
    type Value = VariantConfig;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a mapping of variant variables to candidate values")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<VariantConfig, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut config = VariantConfig::default();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "zip_keys" => config.zip_keys = map.next_value()?,
                "pin_run_as_build" => config.pin_run_as_build = map.next_value()?,
                _ => {
                    let values = match map.next_value::<Option<Values>>()? {
                        None => Vec::new(),
                        Some(Values::One(v)) => vec![v.into_string()],
                        Some(Values::Many(vs)) => vs.into_iter().map(Scalar::into_string).collect(),
                    };
                    if config.contains(&key) {
                        return Err(de::Error::custom(format!("duplicate variant key '{}'", key)));
                    }
                    config.variables.push((key, values));
                }
            }
        }

        Ok(config)
    }
}

impl<'de> Deserialize<'de> for VariantConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(VariantConfigVisitor)
    }
}

/// One concrete assignment of variant variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct VariantSelection {
    values: Vec<(String, String)>,
}

impl VariantSelection {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Restrict the selection to the given variables, keeping order
    pub fn subset(&self, names: &BTreeSet<String>) -> VariantSelection {
        VariantSelection {
            values: self
                .values
                .iter()
                .filter(|(k, _)| names.contains(k))
                .cloned()
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariantSelection {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for VariantSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("<no variant>");
        }
        let parts: Vec<String> = self.values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&parts.join(","))
    }
}
