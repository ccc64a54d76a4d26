//! Kubernetes resource quantities
//!
//! Parses `cpu` and `memory` values (`250m`, `0.5`, `128Mi`, `1e3`, `2G`) into
//! comparable numbers. Anything unparsable yields `None`, and callers skip the
//! comparison instead of reporting it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)([a-zA-Z]*)$")
        .expect("valid quantity regex")
});

fn multiplier(suffix: &str) -> Option<f64> {
    let m = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => return None,
    };
    Some(m)
}

/// Parse a quantity into its base unit value
pub fn parse_quantity(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let caps = QUANTITY.captures(s.trim())?;
            let number: f64 = caps.get(1)?.as_str().parse().ok()?;
            let suffix = caps.get(2).map_or("", |m| m.as_str());
            Some(number * multiplier(suffix)?)
        }
        _ => None,
    }
}

/// CPU in cores (`250m` → 0.25)
pub fn parse_cpu(value: &JsonValue) -> Option<f64> {
    parse_quantity(value)
}

/// Memory in bytes (`128Mi` → 134217728)
pub fn parse_memory(value: &JsonValue) -> Option<f64> {
    parse_quantity(value)
}
