use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("{attribute} cannot be changed once created")]
    ImmutableField { attribute: &'static str },

    #[error("{attribute}: {message}")]
    ConstraintScope {
        attribute: &'static str,
        message: String,
    },

    #[error("invalid validation regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid default value {default}: {reason}")]
    InvalidDefault { default: String, reason: String },

    #[error("cannot delete choice '{value}' because it is in active use")]
    ChoiceInUse { value: String },

    #[error("cannot delete choice '{value}' because it is a default value for the field")]
    ChoiceIsDefault { value: String },

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("maintenance queue closed")]
    QueueClosed,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single value was rejected by its field's type rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Required field cannot be empty.")]
    RequiredEmpty,

    #[error("Value must match regex '{regex}'")]
    RegexMismatch { regex: String },

    #[error("Value must be an integer.")]
    NotInteger,

    #[error("Value must be at least {0}")]
    BelowMinimum(i64),

    #[error("Value must not exceed {0}")]
    AboveMaximum(i64),

    #[error("Value must be true or false.")]
    NotBoolean,

    #[error("Date values must be in the format YYYY-MM-DD.")]
    InvalidDate,

    #[error("Enter a valid URL.")]
    InvalidUrl,

    #[error("Ensure this value has at most {0} characters.")]
    TooLong(usize),

    #[error("Invalid choice ({value}). Available choices are: {}", .available.join(", "))]
    InvalidChoice {
        value: String,
        available: Vec<String>,
    },

    #[error("Invalid choice(s) ({value}). Available choices are: {}", .available.join(", "))]
    InvalidChoices {
        value: String,
        available: Vec<String>,
    },
}

/// A problem found while validating one record's custom field data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Unknown field name '{name}' in custom field data.")]
    UnknownField { name: String },

    #[error("Missing required custom field '{name}'.")]
    MissingRequiredField { name: String },

    #[error("Invalid value for custom field '{name}': {reason}")]
    InvalidFieldValue { name: String, reason: ValueError },
}

impl FieldError {
    /// Name of the custom field the error refers to.
    #[must_use]
    pub fn field_name(&self) -> &str {
        match self {
            Self::UnknownField { name }
            | Self::MissingRequiredField { name }
            | Self::InvalidFieldValue { name, .. } => name,
        }
    }
}

/// Every field error found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// Ok when nothing was collected, otherwise the whole set as one error.
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
