// src/version/pin.rs

//! Pin expressions: turning a concrete version into a compatibility range
//!
//! A pin expression is a dotted run of `x` placeholders. `min_pin` selects
//! how many components form the lower bound; `max_pin` selects the component
//! that is incremented for the exclusive upper bound.
//!
//! `1.2.8` with `min_pin = x.x.x` and `max_pin = x` → `>=1.2.8,<2.0a0`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Lower/upper pin expressions for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    #[serde(default)]
    pub min_pin: Option<String>,
    #[serde(default)]
    pub max_pin: Option<String>,
}

impl PinSpec {
    /// Default used by `pin_compatible`
    pub fn compatible() -> Self {
        Self {
            min_pin: Some("x.x.x.x.x.x".to_string()),
            max_pin: Some("x".to_string()),
        }
    }

    /// Apply the pins to a concrete version
    pub fn apply(&self, version: &str) -> Result<String> {
        apply_pin_expressions(version, self.min_pin.as_deref(), self.max_pin.as_deref())
    }
}

fn pin_depth(expr: &str) -> Result<usize> {
    let depth = expr.split('.').count();
    if expr.split('.').any(|p| p != "x") {
        return Err(Error::ParseError(format!(
            "Invalid pin expression '{}': expected dotted 'x' placeholders",
            expr
        )));
    }
    Ok(depth)
}

/// Increment the leading numeric run of a version component
fn bump(component: &str) -> String {
    let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u64>() {
        Ok(n) => (n + 1).to_string(),
        // Purely alphabetic components cannot be bumped; pin to the next major instead
        Err(_) => format!("{}1", component),
    }
}

/// Build a `>=lower,<upper` constraint string from a version and pin expressions
///
/// Either pin may be absent; when both are absent the result is empty.
pub fn apply_pin_expressions(
    version: &str,
    min_pin: Option<&str>,
    max_pin: Option<&str>,
) -> Result<String> {
    let components: Vec<&str> = version.trim().split('.').collect();
    if version.trim().is_empty() {
        return Err(Error::ParseError("Cannot pin an empty version".to_string()));
    }

    let mut bounds = Vec::new();

    if let Some(min_pin) = min_pin.filter(|p| !p.is_empty()) {
        let depth = pin_depth(min_pin)?.min(components.len());
        bounds.push(format!(">={}", components[..depth].join(".")));
    }

    if let Some(max_pin) = max_pin.filter(|p| !p.is_empty()) {
        let depth = pin_depth(max_pin)?.min(components.len());
        let mut upper: Vec<String> = components[..depth].iter().map(|c| c.to_string()).collect();
        if let Some(last) = upper.last_mut() {
            *last = bump(last);
        }
        bounds.push(format!("<{}.0a0", upper.join(".")));
    }

    Ok(bounds.join(","))
}
