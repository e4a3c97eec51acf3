//! Type rules for custom field values.
//!
//! Empty values (`null`, `""` and `[]`) are never type-checked; they only
//! fail when the field is required. Everything else is checked against the
//! field's declared type and constraints. Validation never mutates the value.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::error::ValueError;
use crate::types::{CustomField, CustomFieldType};

pub const MAX_FIELD_NAME_LEN: usize = 50;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static URL_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("invalid url scheme regex")
});

// Compiled field patterns, keyed by source text.
static COMPILED: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Checks that a field name is usable as a key in custom field data.
pub fn validate_field_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Custom field name cannot be empty".to_string());
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(format!(
            "Custom field name cannot exceed {MAX_FIELD_NAME_LEN} characters"
        ));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(
            "Custom field name can only contain alphanumeric characters, hyphens, and underscores"
                .to_string(),
        );
    }
    Ok(())
}

/// Returns true for the values that count as "not set".
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Renders a value for error messages: strings bare, everything else as JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compiles a user-supplied validation regex as authored (no anchoring added).
pub fn compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(pattern)
}

/// Returns the compiled form of `pattern`, compiling it on first use.
pub(crate) fn cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut compiled = COMPILED.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(regex) = compiled.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = compile_regex(pattern)?;
    compiled.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Validates `value` against `field`'s type rules. `choices` are the field's
/// current choice values and only matter for selection fields.
pub fn validate_value(
    field: &CustomField,
    choices: &[String],
    value: &Value,
) -> Result<(), ValueError> {
    if is_empty_value(value) {
        if field.required {
            return Err(ValueError::RequiredEmpty);
        }
        return Ok(());
    }

    match field.field_type {
        CustomFieldType::Text => check_regex(&field.validation_regex, value),
        CustomFieldType::Integer => {
            let number = as_integer(value).ok_or(ValueError::NotInteger)?;
            check_bounds(number, field.validation_minimum, field.validation_maximum)
        }
        CustomFieldType::Boolean => check_boolean(value),
        CustomFieldType::Date => check_date(value),
        CustomFieldType::Url => check_url(value),
        CustomFieldType::Select => check_choice(value, choices),
        CustomFieldType::MultiSelect => check_choices(value, choices),
    }
}

/// The match must begin at the start of the value; the end is only pinned
/// if the pattern itself says so.
pub(crate) fn check_regex(pattern: &str, value: &Value) -> Result<(), ValueError> {
    if pattern.is_empty() {
        return Ok(());
    }
    let mismatch = || ValueError::RegexMismatch {
        regex: pattern.to_string(),
    };
    let text = value.as_str().ok_or_else(mismatch)?;
    let regex = cached_regex(pattern).map_err(|_| mismatch())?;
    match regex.find(text) {
        Some(m) if m.start() == 0 => Ok(()),
        _ => Err(mismatch()),
    }
}

/// Converts a value to an integer only when no information is lost.
#[must_use]
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn check_bounds(
    number: i64,
    minimum: Option<i64>,
    maximum: Option<i64>,
) -> Result<(), ValueError> {
    if let Some(min) = minimum {
        if number < min {
            return Err(ValueError::BelowMinimum(min));
        }
    }
    if let Some(max) = maximum {
        if number > max {
            return Err(ValueError::AboveMaximum(max));
        }
    }
    Ok(())
}

// Numeric 1/0 are accepted alongside true/false for loosely-typed inputs.
fn check_boolean(value: &Value) -> Result<(), ValueError> {
    match value {
        Value::Bool(_) => Ok(()),
        Value::Number(n) if matches!(n.as_f64(), Some(f) if f == 0.0 || f == 1.0) => Ok(()),
        _ => Err(ValueError::NotBoolean),
    }
}

pub(crate) fn parse_date(text: &str) -> Result<NaiveDate, ValueError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| ValueError::InvalidDate)
}

fn check_date(value: &Value) -> Result<(), ValueError> {
    let text = value.as_str().ok_or(ValueError::InvalidDate)?;
    parse_date(text).map(|_| ())
}

/// Lenient URL check: relative and scheme-less forms pass, whitespace and
/// malformed `scheme://` prefixes do not.
pub(crate) fn check_url(value: &Value) -> Result<(), ValueError> {
    let text = value.as_str().ok_or(ValueError::InvalidUrl)?;
    if text.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValueError::InvalidUrl);
    }
    if let Some((scheme, rest)) = text.split_once("://") {
        if !URL_SCHEME.is_match(scheme) || rest.is_empty() || rest.starts_with('/') {
            return Err(ValueError::InvalidUrl);
        }
    }
    Ok(())
}

fn contains_choice(choices: &[String], value: &str) -> bool {
    choices.iter().any(|c| c == value)
}

pub(crate) fn check_choice(value: &Value, choices: &[String]) -> Result<(), ValueError> {
    match value.as_str() {
        Some(s) if contains_choice(choices, s) => Ok(()),
        _ => Err(ValueError::InvalidChoice {
            value: display_value(value),
            available: choices.to_vec(),
        }),
    }
}

pub(crate) fn check_choices(value: &Value, choices: &[String]) -> Result<(), ValueError> {
    let all_valid = value.as_array().is_some_and(|items| {
        items
            .iter()
            .all(|item| item.as_str().is_some_and(|s| contains_choice(choices, s)))
    });
    if all_valid {
        Ok(())
    } else {
        Err(ValueError::InvalidChoices {
            value: display_value(value),
            available: choices.to_vec(),
        })
    }
}
