use serde_json::Value;

use super::FieldSchema;
use crate::error::{FieldError, ValidationErrors};
use crate::types::CustomFieldData;

impl CustomFieldData {
    /// Pairs every applicable field with its stored value, in schema order.
    /// Fields without a stored value come back as `null`.
    #[must_use]
    pub fn all_fields<'a>(&self, schema: &'a [FieldSchema]) -> Vec<(&'a FieldSchema, Value)> {
        schema
            .iter()
            .map(|entry| {
                let value = self.get(&entry.field.name).cloned().unwrap_or(Value::Null);
                (entry, value)
            })
            .collect()
    }

    /// Validates the data against the fields applicable to its record type.
    ///
    /// Every problem is collected: unknown keys and bad values in key order,
    /// then missing required fields in schema order.
    pub fn validate(&self, schema: &[FieldSchema]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (name, value) in self.iter() {
            match schema.iter().find(|entry| &entry.field.name == name) {
                None => errors.push(FieldError::UnknownField { name: name.clone() }),
                Some(entry) => {
                    if let Err(reason) = entry.validate(value) {
                        errors.push(FieldError::InvalidFieldValue {
                            name: name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        for entry in schema {
            if entry.field.required && !self.contains_key(&entry.field.name) {
                errors.push(FieldError::MissingRequiredField {
                    name: entry.field.name.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
