use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::field_type::{CustomFieldType, FilterLogic};

pub const DEFAULT_WEIGHT: i32 = 100;

/// Opaque identifier for a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentTypeId(i64);

impl ContentTypeId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ContentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: ContentTypeId,
    pub app_label: String,
    pub model: String,
}

impl ContentType {
    /// The `app_label.model` form used on the command line.
    #[must_use]
    pub fn natural_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filter_logic: FilterLogic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub weight: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_maximum: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation_regex: String,
    pub content_types: BTreeSet<ContentTypeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomField {
    /// A fresh, unsaved field with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: CustomFieldType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            label: String::new(),
            field_type,
            description: String::new(),
            required: false,
            filter_logic: FilterLogic::default(),
            default: None,
            weight: DEFAULT_WEIGHT,
            validation_minimum: None,
            validation_maximum: None,
            validation_regex: String::new(),
            content_types: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The label shown to users; derived from the name when left blank.
    #[must_use]
    pub fn display_label(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        self.name
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    /// The default, treating an explicit JSON null as unset.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref().filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn applies_to(&self, content_type: ContentTypeId) -> bool {
        self.content_types.contains(&content_type)
    }
}

impl fmt::Display for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldChoice {
    pub id: String,
    pub field_id: String,
    pub value: String,
    pub weight: i32,
    pub created_at: DateTime<Utc>,
}

impl CustomFieldChoice {
    #[must_use]
    pub fn new(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            field_id: field_id.into(),
            value: value.into(),
            weight: DEFAULT_WEIGHT,
            created_at: Utc::now(),
        }
    }
}

/// Schemaless custom field values attached to a record, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomFieldData(Map<String, Value>);

impl CustomFieldData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CustomFieldData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CustomFieldData {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Any record that carries custom field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub content_type: ContentTypeId,
    pub custom_field_data: CustomFieldData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    #[must_use]
    pub fn new(content_type: ContentTypeId, custom_field_data: CustomFieldData) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content_type,
            custom_field_data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short alias for the record's custom field data.
    #[must_use]
    pub fn cf(&self) -> &CustomFieldData {
        &self.custom_field_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_label_falls_back_to_title_cased_name() {
        let mut field = CustomField::new("circuit_install_date", CustomFieldType::Date);
        assert_eq!(field.display_label(), "Circuit Install Date");

        field.label = "Installed".to_string();
        assert_eq!(field.display_label(), "Installed");
    }

    #[test]
    fn test_null_default_is_unset() {
        let mut field = CustomField::new("rack_units", CustomFieldType::Integer);
        field.default = Some(Value::Null);
        assert!(field.default_value().is_none());

        field.default = Some(json!(4));
        assert_eq!(field.default_value(), Some(&json!(4)));
    }

    #[test]
    fn test_custom_field_data_is_a_plain_json_object() {
        let data: CustomFieldData = [("environment", json!("prod"))].into_iter().collect();
        let encoded = serde_json::to_string(&data).unwrap();
        assert_eq!(encoded, r#"{"environment":"prod"}"#);

        let decoded: CustomFieldData = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.get("environment"), Some(&json!("prod")));
    }

    #[test]
    fn test_custom_field_serializes_type_key() {
        let field = CustomField::new("site_code", CustomFieldType::Text);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["weight"], 100);
        assert!(value.get("validation_regex").is_none());
    }
}
