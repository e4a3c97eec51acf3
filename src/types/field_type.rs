use std::fmt;

use serde::{Deserialize, Serialize};

/// The data type of a custom field. Fixed once the field is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomFieldType {
    #[default]
    Text,
    Integer,
    Boolean,
    Date,
    Url,
    Select,
    MultiSelect,
}

impl CustomFieldType {
    pub const ALL: [CustomFieldType; 7] = [
        Self::Text,
        Self::Integer,
        Self::Boolean,
        Self::Date,
        Self::Url,
        Self::Select,
        Self::MultiSelect,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Url => "url",
            Self::Select => "select",
            Self::MultiSelect => "multi-select",
        }
    }

    pub fn parse(s: &str) -> Option<CustomFieldType> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Returns true for the types whose values come from a choice list.
    #[must_use]
    pub const fn is_selection(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }

    /// Returns true for the types that accept a validation regex.
    #[must_use]
    pub const fn supports_regex(self) -> bool {
        matches!(self, Self::Text | Self::Url)
    }
}

impl fmt::Display for CustomFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How filtering on a custom field matches stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    Disabled,
    /// Matches any instance of a given string.
    #[default]
    Loose,
    /// Matches the entire field.
    Exact,
}

impl FilterLogic {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Loose => "loose",
            Self::Exact => "exact",
        }
    }

    pub fn parse(s: &str) -> Option<FilterLogic> {
        match s {
            "disabled" => Some(Self::Disabled),
            "loose" => Some(Self::Loose),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}

impl fmt::Display for FilterLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
