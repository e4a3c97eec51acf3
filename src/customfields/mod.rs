//! The custom field engine.
//!
//! Custom field definitions form a schema catalog kept apart from the
//! records themselves. Records hold their values in a flat
//! [`CustomFieldData`](crate::types::CustomFieldData) document keyed by field
//! name and are checked against the catalog when validated, not when read.

mod choice;
mod data;
mod field;
mod form;
mod manager;
pub mod validator;

use serde_json::Value;

pub use choice::clean_choice;
pub use field::clean_field;
pub use form::{FormChoice, FormField, FormFieldKind, FormOptions};
pub use manager::CustomFieldManager;

use crate::error::{Result, ValueError};
use crate::store::Store;
use crate::types::{ContentTypeId, CustomField};

/// A custom field together with its current choice values, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub field: CustomField,
    pub choices: Vec<String>,
}

impl FieldSchema {
    /// Loads the choices for `field` from the store.
    pub fn load(store: &dyn Store, field: CustomField) -> Result<Self> {
        let choices = choice_values(store, &field.id)?;
        Ok(Self { field, choices })
    }

    /// Validates a value against this field's rules.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), ValueError> {
        validator::validate_value(&self.field, &self.choices, value)
    }

    /// Builds the input description for this field.
    #[must_use]
    pub fn form_field(&self, options: FormOptions) -> FormField {
        FormField::for_field(&self.field, &self.choices, options)
    }
}

/// Every field that applies to `content_type`, with its choices, ordered by
/// weight then name.
pub fn schema_for(store: &dyn Store, content_type: ContentTypeId) -> Result<Vec<FieldSchema>> {
    store
        .list_custom_fields_for_content_type(content_type)?
        .into_iter()
        .map(|field| FieldSchema::load(store, field))
        .collect()
}

/// The current choice values of a field, ordered by weight then value.
pub fn choice_values(store: &dyn Store, field_id: &str) -> Result<Vec<String>> {
    Ok(store
        .list_choices(field_id)?
        .into_iter()
        .map(|c| c.value)
        .collect())
}
