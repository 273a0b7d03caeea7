//! JSON Schema checks for tool arguments.
//!
//! Runs before any credential is resolved, so a malformed call never triggers
//! a consent flow or a network request. Messages name the offending parameter
//! and list the valid ones, so a model can correct its call.
//!
//! # Validation steps (in order)
//!
//! 1. **Required parameters**: present and non-null.
//! 2. **Unknown parameters**: keys not under `properties` are rejected.
//! 3. **Types with safe coercion**: `"10"` becomes `10` for `integer`,
//!    `"true"` becomes `true` for `boolean`; array items are checked against
//!    `items.type`.
//! 4. **Enums and bounds**: `enum`, `minimum`, `minLength`.

use std::fmt::Write as _;

use serde_json::{Map, Value};

/// A single problem with one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolation {
    /// Parameter name (empty for top-level issues)
    pub param: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationViolation {
    fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating one argument map
#[derive(Debug, Clone)]
pub struct SchemaValidationResult {
    /// All violations found; empty means valid
    pub violations: Vec<ValidationViolation>,
    /// Arguments after coercion; only meaningful when valid
    pub coerced: Map<String, Value>,
}

impl SchemaValidationResult {
    /// Returns `true` if there are no violations.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render the violations plus a parameter summary of `schema`.
    #[must_use]
    pub fn format_error(&self, schema: &Value) -> String {
        let mut out = String::from("Invalid arguments:\n");

        for v in &self.violations {
            if v.param.is_empty() {
                let _ = writeln!(out, "- {}", v.message);
            } else {
                let _ = writeln!(out, "- '{}': {}", v.param, v.message);
            }
        }

        let params = describe_params(schema);
        if !params.is_empty() {
            out.push_str("Valid parameters:\n");
            for (name, info) in &params {
                let _ = writeln!(out, "  - {name} {info}");
            }
        }

        out.trim_end().to_string()
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Validate `arguments` against an object `input_schema`.
#[must_use]
pub fn validate_arguments(arguments: &Map<String, Value>, input_schema: &Value) -> SchemaValidationResult {
    let Some(properties) = input_schema.get("properties").and_then(Value::as_object) else {
        return SchemaValidationResult {
            violations: Vec::new(),
            coerced: arguments.clone(),
        };
    };

    let required: Vec<&str> = input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut violations = Vec::new();

    for name in &required {
        match arguments.get(*name) {
            None => violations.push(ValidationViolation::new(*name, "required parameter is missing")),
            Some(Value::Null) => {
                violations.push(ValidationViolation::new(*name, "required parameter must not be null"));
            }
            Some(_) => {}
        }
    }

    for key in arguments.keys() {
        if !properties.contains_key(key) {
            violations.push(ValidationViolation::new(key, "unknown parameter"));
        }
    }

    // Type errors on top of missing/unknown keys only add noise
    if !violations.is_empty() {
        return SchemaValidationResult {
            violations,
            coerced: arguments.clone(),
        };
    }

    let mut coerced = Map::new();
    for (name, prop_schema) in properties {
        match arguments.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => match check_property(value, prop_schema) {
                Ok(v) => {
                    coerced.insert(name.clone(), v);
                }
                Err(message) => violations.push(ValidationViolation::new(name, message)),
            },
        }
    }

    SchemaValidationResult { violations, coerced }
}

// ── Per-property checks ──────────────────────────────────────────────────────

fn check_property(value: &Value, prop_schema: &Value) -> Result<Value, String> {
    let coerced = match prop_schema.get("type").and_then(Value::as_str) {
        Some(ty) => coerce(value, ty)?,
        None => value.clone(),
    };

    if let Some(items_type) = prop_schema
        .get("items")
        .and_then(|items| items.get("type"))
        .and_then(Value::as_str)
    {
        if let Value::Array(items) = &coerced {
            let items = items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(item, items_type).map_err(|e| format!("item {i}: {e}")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(items));
        }
    }

    if let Some(options) = prop_schema.get("enum").and_then(Value::as_array) {
        if !options.contains(&coerced) {
            let listed: Vec<String> = options.iter().map(display_value).collect();
            return Err(format!("must be one of: {}", listed.join(", ")));
        }
    }

    if let (Some(n), Some(min)) = (
        coerced.as_f64(),
        prop_schema.get("minimum").and_then(Value::as_f64),
    ) {
        if n < min {
            return Err(format!("must be >= {min}"));
        }
    }

    if let (Some(s), Some(min_len)) = (
        coerced.as_str(),
        prop_schema.get("minLength").and_then(Value::as_u64),
    ) {
        if (s.chars().count() as u64) < min_len {
            return Err(format!("must be at least {min_len} characters long"));
        }
    }

    Ok(coerced)
}

fn coerce(value: &Value, declared_type: &str) -> Result<Value, String> {
    let mismatch = || format!("expected {declared_type}, got {}", json_type_name(value));
    match (declared_type, value) {
        ("string", Value::String(_))
        | ("boolean", Value::Bool(_))
        | ("number", Value::Number(_))
        | ("array", Value::Array(_))
        | ("object", Value::Object(_)) => Ok(value.clone()),

        ("string", Value::Number(n)) => Ok(Value::String(n.to_string())),

        ("integer", Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(value.clone())
            } else {
                match n.as_f64() {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(f) if f.fract() == 0.0 => Ok(Value::Number((f as i64).into())),
                    _ => Err(format!("expected integer, got {n}")),
                }
            }
        }
        ("integer", Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| format!("expected integer, got \"{s}\"")),

        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got \"{s}\"")),

        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{s}\"")),
        },

        ("string" | "integer" | "number" | "boolean" | "array" | "object", _) => Err(mismatch()),
        _ => Ok(value.clone()),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        _ => v.to_string(),
    }
}

/// `(name, "(type, required)")` pairs for the error hint
fn describe_params(schema: &Value) -> Vec<(String, String)> {
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    props
        .iter()
        .map(|(name, prop)| {
            let ty = prop.get("type").and_then(Value::as_str).unwrap_or("any");
            let req = if required.contains(&name.as_str()) {
                "required"
            } else {
                "optional"
            };
            (name.clone(), format!("({ty}, {req})"))
        })
        .collect()
}
