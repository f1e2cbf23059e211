//! Default primitive constraint matcher
//!
//! Covers the JSON-Schema keywords most descriptors use: `type`, `enum`,
//! `const`, numeric bounds, string length, `pattern`, `format` and array
//! item checks. Anything else is ignored.

use chrono::{DateTime, NaiveDate};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::traits::{ConstraintMatcher, ConstraintViolation};
use crate::types::PropertySpec;
use crate::validator::report::TYPE;

static EMAIL: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"));

/// Matcher for the common JSON-Schema primitive keywords
#[derive(Debug, Default)]
pub struct BasicConstraintMatcher {
    /// Compiled `pattern` keywords
    patterns: DashMap<String, Regex>,
}

impl BasicConstraintMatcher {
    /// Create a new matcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn type_matches(value: &Value, kind: &str) -> bool {
        match kind {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => is_integer(value),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            "null" => value.is_null(),
            _ => true,
        }
    }

    fn check_type(value: &Value, spec: &PropertySpec) -> Option<ConstraintViolation> {
        let kind = spec.kind.as_deref()?;
        if Self::type_matches(value, kind) {
            None
        } else {
            Some(ConstraintViolation::new(
                TYPE,
                format!("expected {kind}, found {}", json_type(value)),
            ))
        }
    }

    fn check_keyword(
        &self,
        keyword: &str,
        expected: &Value,
        value: &Value,
    ) -> Option<ConstraintViolation> {
        let failed = |message: String| Some(ConstraintViolation::new(keyword, message));

        match keyword {
            "enum" => {
                let options = expected.as_array()?;
                if options.contains(value) {
                    None
                } else {
                    failed(format!("{value} is not one of {expected}"))
                }
            }
            "const" if value != expected => failed(format!("expected {expected}, found {value}")),
            "minimum" => {
                let (n, bound) = (value.as_f64()?, expected.as_f64()?);
                (n < bound).then(|| ConstraintViolation::new(keyword, format!("{n} < {bound}")))
            }
            "maximum" => {
                let (n, bound) = (value.as_f64()?, expected.as_f64()?);
                (n > bound).then(|| ConstraintViolation::new(keyword, format!("{n} > {bound}")))
            }
            "exclusiveMinimum" => {
                let (n, bound) = (value.as_f64()?, expected.as_f64()?);
                (n <= bound).then(|| ConstraintViolation::new(keyword, format!("{n} <= {bound}")))
            }
            "exclusiveMaximum" => {
                let (n, bound) = (value.as_f64()?, expected.as_f64()?);
                (n >= bound).then(|| ConstraintViolation::new(keyword, format!("{n} >= {bound}")))
            }
            "minLength" => {
                let (len, bound) = (value.as_str()?.chars().count(), expected.as_u64()?);
                (len < to_usize(bound)).then(|| {
                    ConstraintViolation::new(keyword, format!("length {len} is below {bound}"))
                })
            }
            "maxLength" => {
                let (len, bound) = (value.as_str()?.chars().count(), expected.as_u64()?);
                (len > to_usize(bound)).then(|| {
                    ConstraintViolation::new(keyword, format!("length {len} is above {bound}"))
                })
            }
            "minItems" => {
                let (len, bound) = (value.as_array()?.len(), expected.as_u64()?);
                (len < to_usize(bound)).then(|| {
                    ConstraintViolation::new(keyword, format!("{len} items, need {bound}"))
                })
            }
            "maxItems" => {
                let (len, bound) = (value.as_array()?.len(), expected.as_u64()?);
                (len > to_usize(bound)).then(|| {
                    ConstraintViolation::new(keyword, format!("{len} items, at most {bound}"))
                })
            }
            "pattern" => self.check_pattern(value.as_str()?, expected.as_str()?),
            "format" => check_format(value.as_str()?, expected.as_str()?),
            _ => None,
        }
    }

    fn check_pattern(&self, text: &str, pattern: &str) -> Option<ConstraintViolation> {
        if !self.patterns.contains_key(pattern) {
            match Regex::new(pattern) {
                Ok(regex) => {
                    self.patterns.insert(pattern.to_string(), regex);
                }
                Err(err) => {
                    return Some(ConstraintViolation::new(
                        "pattern",
                        format!("invalid pattern '{pattern}': {err}"),
                    ));
                }
            }
        }

        let matched = self
            .patterns
            .get(pattern)
            .is_some_and(|regex| regex.is_match(text));
        (!matched).then(|| {
            ConstraintViolation::new("pattern", format!("'{text}' does not match '{pattern}'"))
        })
    }
}

impl ConstraintMatcher for BasicConstraintMatcher {
    fn check(&self, value: &Value, spec: &PropertySpec) -> Vec<ConstraintViolation> {
        if let Some(violation) = Self::check_type(value, spec) {
            return vec![violation];
        }

        let mut violations: Vec<ConstraintViolation> = spec
            .constraints
            .iter()
            .filter_map(|(keyword, expected)| self.check_keyword(keyword, expected, value))
            .collect();

        if let (Some(items), Some(elements)) = (&spec.items, value.as_array()) {
            for (index, element) in elements.iter().enumerate() {
                violations.extend(self.check(element, items).into_iter().map(|v| {
                    let location = match v.location.as_deref() {
                        Some(inner) => format!("[{index}]{inner}"),
                        None => format!("[{index}]"),
                    };
                    v.at(location)
                }));
            }
        }

        violations
    }

    fn name(&self) -> &str {
        "BasicConstraintMatcher"
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64()
        || value.is_u64()
        || value.as_f64().is_some_and(|n| n.is_finite() && n.fract() == 0.0)
}

fn to_usize(bound: u64) -> usize {
    usize::try_from(bound).unwrap_or(usize::MAX)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_format(text: &str, format: &str) -> Option<ConstraintViolation> {
    let valid = match format {
        "date-time" => DateTime::parse_from_rfc3339(text).is_ok(),
        "date" => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        "uri" | "url" => url::Url::parse(text).is_ok(),
        "email" => EMAIL.as_ref().is_ok_and(|re| re.is_match(text)),
        _ => true,
    };
    (!valid).then(|| {
        ConstraintViolation::new("format", format!("'{text}' is not a valid {format}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> PropertySpec {
        serde_json::from_value(value).expect("valid spec")
    }

    fn names(violations: &[ConstraintViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.constraint.as_str()).collect()
    }

    #[test]
    fn test_type_mismatch_short_circuits() {
        let matcher = BasicConstraintMatcher::new();
        let violations =
            matcher.check(&json!(42), &spec(json!({"type": "string", "minLength": 3})));
        assert_eq!(names(&violations), vec!["type"]);
        assert_eq!(violations[0].message, "expected string, found number");
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        let matcher = BasicConstraintMatcher::new();
        let integer = spec(json!({"type": "integer"}));
        assert!(matcher.check(&json!(320), &integer).is_empty());
        assert!(matcher.check(&json!(320.0), &integer).is_empty());
        assert_eq!(names(&matcher.check(&json!(320.5), &integer)), vec!["type"]);
    }

    #[test]
    fn test_keywords_in_declaration_order() {
        let matcher = BasicConstraintMatcher::new();
        let violations = matcher.check(
            &json!("ab"),
            &spec(json!({"type": "string", "pattern": "^[0-9]+$", "minLength": 3})),
        );
        assert_eq!(names(&violations), vec!["pattern", "minLength"]);
    }

    #[test]
    fn test_bounds_enum_and_format() {
        let matcher = BasicConstraintMatcher::new();
        assert_eq!(
            names(&matcher.check(&json!(0), &spec(json!({"type": "number", "minimum": 1})))),
            vec!["minimum"]
        );
        assert_eq!(
            names(&matcher.check(&json!("flac"), &spec(json!({"enum": ["mp3", "ogg"]})))),
            vec!["enum"]
        );
        assert!(
            matcher
                .check(&json!("2024-05-01T10:00:00Z"), &spec(json!({"format": "date-time"})))
                .is_empty()
        );
        assert_eq!(
            names(&matcher.check(&json!("not a uri"), &spec(json!({"format": "uri"})))),
            vec!["format"]
        );
    }

    #[test]
    fn test_array_items_report_index() {
        let matcher = BasicConstraintMatcher::new();
        let violations = matcher.check(
            &json!(["a", 1, "c"]),
            &spec(json!({"type": "array", "items": {"type": "string"}})),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location.as_deref(), Some("[1]"));
    }
}
