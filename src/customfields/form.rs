//! Input descriptions for editing custom field values.
//!
//! A [`FormField`] says how a value should be collected (widget kind,
//! choices, bounds, initial value) and turns raw submitted input into the
//! value that is stored.

use serde::Serialize;
use serde_json::Value;

use super::validator::{DATE_FORMAT, as_integer, check_bounds, check_regex, check_url, parse_date};
use crate::error::ValueError;
use crate::types::{CustomField, CustomFieldType};

pub const BLANK_CHOICE_LABEL: &str = "---------";
pub const TEXT_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormOptions {
    /// Pre-fill the field's default. Off for bulk editing.
    pub set_initial: bool,
    /// Honor the field's `required` flag. Off for filtering and bulk editing.
    pub enforce_required: bool,
    /// Accept the flat string forms used by CSV import.
    pub for_csv_import: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            set_initial: true,
            enforce_required: true,
            for_csv_import: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldKind {
    Integer,
    NullBoolean,
    DatePicker,
    Url,
    Text,
    Select,
    MultiSelect,
    CsvSelect,
    CsvMultiSelect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormChoice {
    pub value: Value,
    pub label: String,
}

impl FormChoice {
    fn new(value: Value, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    fn blank(value: Value) -> Self {
        Self::new(value, BLANK_CHOICE_LABEL)
    }

    fn is_blank(&self) -> bool {
        self.label == BLANK_CHOICE_LABEL && (self.value.is_null() || self.value == "")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub kind: FormFieldKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    pub required: bool,
    pub initial: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<FormChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_message: Option<String>,
}

impl FormField {
    fn base(kind: FormFieldKind, field: &CustomField, required: bool, initial: Option<Value>) -> Self {
        Self {
            kind,
            label: field.display_label(),
            help_text: (!field.description.is_empty()).then(|| field.description.clone()),
            required,
            initial,
            choices: Vec::new(),
            min_value: None,
            max_value: None,
            max_length: None,
            regex: None,
            regex_message: None,
        }
    }

    /// Describes the input for `field`, whose current choice values are
    /// `choices`.
    #[must_use]
    pub fn for_field(field: &CustomField, choices: &[String], options: FormOptions) -> Self {
        let initial = if options.set_initial {
            field.default_value().cloned()
        } else {
            None
        };
        let required = field.required && options.enforce_required;

        match field.field_type {
            CustomFieldType::Integer => Self {
                min_value: field.validation_minimum,
                max_value: field.validation_maximum,
                ..Self::base(FormFieldKind::Integer, field, required, initial)
            },
            CustomFieldType::Boolean => Self {
                choices: vec![
                    FormChoice::blank(Value::Null),
                    FormChoice::new(Value::Bool(true), "True"),
                    FormChoice::new(Value::Bool(false), "False"),
                ],
                ..Self::base(FormFieldKind::NullBoolean, field, required, initial)
            },
            CustomFieldType::Date => Self::base(FormFieldKind::DatePicker, field, required, initial),
            CustomFieldType::Url => Self::base(FormFieldKind::Url, field, required, initial),
            CustomFieldType::Text => {
                let regex = (!field.validation_regex.is_empty()).then(|| field.validation_regex.clone());
                Self {
                    max_length: Some(TEXT_MAX_LENGTH),
                    regex_message: regex
                        .as_ref()
                        .map(|r| format!("Values must match this regex: {r}")),
                    regex,
                    ..Self::base(FormFieldKind::Text, field, required, initial)
                }
            }
            CustomFieldType::Select | CustomFieldType::MultiSelect => {
                let default_choice = field
                    .default_value()
                    .and_then(Value::as_str)
                    .and_then(|d| choices.iter().find(|c| c.as_str() == d));

                let mut form_choices = Vec::with_capacity(choices.len() + 1);
                if !required || default_choice.is_none() {
                    form_choices.push(FormChoice::blank(Value::String(String::new())));
                }
                form_choices.extend(
                    choices
                        .iter()
                        .map(|c| FormChoice::new(Value::String(c.clone()), c.clone())),
                );

                let initial = match default_choice {
                    Some(choice) if options.set_initial => Some(Value::String(choice.clone())),
                    _ => initial,
                };
                let kind = match (field.field_type, options.for_csv_import) {
                    (CustomFieldType::Select, false) => FormFieldKind::Select,
                    (CustomFieldType::Select, true) => FormFieldKind::CsvSelect,
                    (_, false) => FormFieldKind::MultiSelect,
                    (_, true) => FormFieldKind::CsvMultiSelect,
                };
                Self {
                    choices: form_choices,
                    ..Self::base(kind, field, required, initial)
                }
            }
        }
    }

    /// Converts submitted input into the value to store, or explains why
    /// it cannot be accepted. Empty input becomes `null`.
    pub fn parse_input(&self, raw: &Value) -> Result<Value, ValueError> {
        let value = match self.kind {
            FormFieldKind::Integer => self.parse_integer(raw)?,
            FormFieldKind::NullBoolean => parse_boolean(raw)?,
            FormFieldKind::DatePicker => match non_empty_text(raw) {
                Some(text) => {
                    let date = parse_date(text.trim())?;
                    Value::String(date.format(DATE_FORMAT).to_string())
                }
                None if is_blank(raw) => Value::Null,
                None => return Err(ValueError::InvalidDate),
            },
            FormFieldKind::Url => match non_empty_text(raw) {
                Some(text) => {
                    let url = Value::String(text.trim().to_string());
                    check_url(&url)?;
                    url
                }
                None if is_blank(raw) => Value::Null,
                None => return Err(ValueError::InvalidUrl),
            },
            FormFieldKind::Text => self.parse_text(raw)?,
            FormFieldKind::Select | FormFieldKind::CsvSelect => self.parse_choice(raw)?,
            FormFieldKind::MultiSelect => self.parse_choices(raw)?,
            FormFieldKind::CsvMultiSelect => match raw {
                Value::String(s) => {
                    let items = s
                        .split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(|item| Value::String(item.to_string()))
                        .collect();
                    self.parse_choices(&Value::Array(items))?
                }
                other => self.parse_choices(other)?,
            },
        };

        if value.is_null() && self.required {
            return Err(ValueError::RequiredEmpty);
        }
        Ok(value)
    }

    fn parse_integer(&self, raw: &Value) -> Result<Value, ValueError> {
        if is_blank(raw) {
            return Ok(Value::Null);
        }
        let number = as_integer(raw).ok_or(ValueError::NotInteger)?;
        check_bounds(number, self.min_value, self.max_value)?;
        Ok(Value::from(number))
    }

    fn parse_text(&self, raw: &Value) -> Result<Value, ValueError> {
        let text = match raw {
            Value::Null => return Ok(Value::Null),
            Value::String(s) if s.is_empty() => return Ok(Value::Null),
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ValueError::RegexMismatch {
                    regex: self.regex.clone().unwrap_or_default(),
                });
            }
        };
        if let Some(max) = self.max_length {
            if text.chars().count() > max {
                return Err(ValueError::TooLong(max));
            }
        }
        let value = Value::String(text);
        if let Some(regex) = &self.regex {
            check_regex(regex, &value)?;
        }
        Ok(value)
    }

    fn available(&self) -> Vec<String> {
        self.choices
            .iter()
            .filter(|c| !c.is_blank())
            .filter_map(|c| c.value.as_str().map(str::to_string))
            .collect()
    }

    fn parse_choice(&self, raw: &Value) -> Result<Value, ValueError> {
        if is_blank(raw) {
            return Ok(Value::Null);
        }
        let available = self.available();
        match raw.as_str() {
            Some(s) if available.iter().any(|c| c == s) => Ok(raw.clone()),
            _ => Err(ValueError::InvalidChoice {
                value: super::validator::display_value(raw),
                available,
            }),
        }
    }

    fn parse_choices(&self, raw: &Value) -> Result<Value, ValueError> {
        if is_blank(raw) {
            return Ok(Value::Null);
        }
        let available = self.available();
        let valid = raw.as_array().is_some_and(|items| {
            items
                .iter()
                .all(|item| item.as_str().is_some_and(|s| available.iter().any(|c| c == s)))
        });
        if valid {
            Ok(raw.clone())
        } else {
            Err(ValueError::InvalidChoices {
                value: super::validator::display_value(raw),
                available,
            })
        }
    }
}

fn is_blank(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn non_empty_text(raw: &Value) -> Option<&str> {
    raw.as_str().filter(|s| !s.trim().is_empty())
}

fn parse_boolean(raw: &Value) -> Result<Value, ValueError> {
    match raw {
        Value::Null => Ok(Value::Null),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(ValueError::NotBoolean),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "unknown" => Ok(Value::Null),
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(ValueError::NotBoolean),
        },
        _ => Err(ValueError::NotBoolean),
    }
}
