use chrono::Utc;

use super::choice_values;
use super::validator::{compile_regex, display_value, validate_field_name, validate_value};
use crate::error::{Error, Result};
use crate::jobs::MaintenanceJob;
use crate::store::{Store, transaction};
use crate::types::{CustomField, CustomFieldType};

/// Checks a custom field definition before it is persisted.
///
/// `store` supplies the previously saved version (for the immutability
/// check) and the field's current choices. Run this inside the same
/// transaction as the write that follows it.
pub fn clean_field(store: &dyn Store, field: &CustomField) -> Result<()> {
    validate_field_name(&field.name).map_err(Error::InvalidName)?;

    if let Some(existing) = store.get_custom_field(&field.id)? {
        if field.name != existing.name {
            return Err(Error::ImmutableField { attribute: "name" });
        }
        if field.field_type != existing.field_type {
            return Err(Error::ImmutableField { attribute: "type" });
        }
    }

    if !field.validation_regex.is_empty() {
        if let Err(e) = compile_regex(&field.validation_regex) {
            return Err(Error::InvalidRegex {
                pattern: field.validation_regex.clone(),
                reason: e.to_string(),
            });
        }
    }

    let choices = choice_values(store, &field.id)?;

    if let Some(default) = field.default_value() {
        if let Err(reason) = validate_value(field, &choices, default) {
            return Err(Error::InvalidDefault {
                default: display_value(default),
                reason: reason.to_string(),
            });
        }
    }

    if field.validation_minimum.is_some() && field.field_type != CustomFieldType::Integer {
        return Err(Error::ConstraintScope {
            attribute: "validation_minimum",
            message: "A minimum value may be set only for numeric fields".to_string(),
        });
    }
    if field.validation_maximum.is_some() && field.field_type != CustomFieldType::Integer {
        return Err(Error::ConstraintScope {
            attribute: "validation_maximum",
            message: "A maximum value may be set only for numeric fields".to_string(),
        });
    }

    if !field.validation_regex.is_empty() && !field.field_type.supports_regex() {
        return Err(Error::ConstraintScope {
            attribute: "validation_regex",
            message: "Regular expression validation is supported only for text and URL fields"
                .to_string(),
        });
    }

    if !choices.is_empty() && !field.field_type.is_selection() {
        return Err(Error::ConstraintScope {
            attribute: "choices",
            message: "Choices may be set only for custom selection fields.".to_string(),
        });
    }

    if field.field_type == CustomFieldType::Select {
        if let Some(default) = field.default_value().filter(|d| d.as_str() != Some("")) {
            let listed = default
                .as_str()
                .is_some_and(|d| choices.iter().any(|c| c == d));
            if !listed {
                return Err(Error::InvalidDefault {
                    default: display_value(default),
                    reason: "The specified default value is not listed as an available choice."
                        .to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Cleans and writes a field in one transaction, creating it if it has not
/// been saved before.
pub(crate) fn save_field(store: &dyn Store, field: &mut CustomField) -> Result<()> {
    transaction(store, |tx| {
        clean_field(tx, field)?;
        field.updated_at = Utc::now();
        if tx.get_custom_field(&field.id)?.is_some() {
            tx.update_custom_field(field)
        } else {
            field.created_at = field.updated_at;
            tx.create_custom_field(field)
        }
    })
}

/// Deletes a field and its choices. Returns the job that clears the field
/// from the data of every record type it was assigned to.
pub(crate) fn delete_field(store: &dyn Store, id: &str) -> Result<MaintenanceJob> {
    transaction(store, |tx| {
        let field = tx.get_custom_field(id)?.ok_or(Error::NotFound)?;
        tx.delete_custom_field(id)?;
        Ok(MaintenanceJob::PurgeField {
            field_name: field.name,
            content_types: field.content_types.into_iter().collect(),
        })
    })
}
