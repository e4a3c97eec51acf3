use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::jobs::MaintenanceJob;
use crate::store::{RecordFilter, Store, transaction};
use crate::types::{CustomField, CustomFieldChoice, CustomFieldType};

/// Checks a choice before it is persisted. Returns the field it belongs to.
pub fn clean_choice(store: &dyn Store, choice: &CustomFieldChoice) -> Result<CustomField> {
    if choice.value.is_empty() {
        return Err(Error::InvalidName(
            "Custom field choice value cannot be empty".to_string(),
        ));
    }

    let field = store
        .get_custom_field(&choice.field_id)?
        .ok_or(Error::NotFound)?;
    if !field.field_type.is_selection() {
        return Err(Error::ConstraintScope {
            attribute: "field",
            message: "Custom field choices can only be assigned to selection fields.".to_string(),
        });
    }

    if let Some(existing) = store.get_choice(&choice.id)? {
        if existing.field_id != choice.field_id {
            return Err(Error::ImmutableField { attribute: "field" });
        }
    }

    Ok(field)
}

/// Creates or updates a choice. A changed value also rewrites the field's
/// default in place and yields the job that rewrites stored record data.
pub(crate) fn save_choice(
    store: &dyn Store,
    choice: &CustomFieldChoice,
) -> Result<Option<MaintenanceJob>> {
    transaction(store, |tx| {
        let mut field = clean_choice(tx, choice)?;

        let Some(existing) = tx.get_choice(&choice.id)? else {
            tx.create_choice(choice)?;
            return Ok(None);
        };

        tx.update_choice(choice)?;
        if existing.value == choice.value {
            return Ok(None);
        }

        if let Some(default) = field.default.as_mut() {
            if rename_in_default(default, &existing.value, &choice.value) {
                field.updated_at = Utc::now();
                tx.update_custom_field(&field)?;
                debug!(field = %field.name, "Renamed choice in field default");
            }
        }

        Ok(Some(MaintenanceJob::RenameChoiceValue {
            field_id: field.id.clone(),
            old_value: existing.value,
            new_value: choice.value.clone(),
        }))
    })
}

/// Deletes a choice unless the field's default or any record still uses it.
pub(crate) fn delete_choice(store: &dyn Store, id: &str) -> Result<CustomFieldChoice> {
    transaction(store, |tx| {
        let choice = tx.get_choice(id)?.ok_or(Error::NotFound)?;
        let field = tx
            .get_custom_field(&choice.field_id)?
            .ok_or(Error::NotFound)?;

        if field
            .default_value()
            .is_some_and(|default| default_uses(default, &choice.value))
        {
            return Err(Error::ChoiceIsDefault {
                value: choice.value,
            });
        }

        let filter = match field.field_type {
            CustomFieldType::Select => Some(RecordFilter::FieldEquals {
                name: field.name.clone(),
                value: choice.value.clone(),
            }),
            CustomFieldType::MultiSelect => Some(RecordFilter::FieldContains {
                name: field.name.clone(),
                value: choice.value.clone(),
            }),
            _ => None,
        };
        if let Some(filter) = filter {
            for &content_type in &field.content_types {
                if tx.record_exists(content_type, &filter)? {
                    return Err(Error::ChoiceInUse {
                        value: choice.value,
                    });
                }
            }
        }

        tx.delete_choice(id)?;
        Ok(choice)
    })
}

fn default_uses(default: &Value, value: &str) -> bool {
    match default {
        Value::String(s) => s == value,
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(value)),
        _ => false,
    }
}

fn rename_in_default(default: &mut Value, old_value: &str, new_value: &str) -> bool {
    match default {
        Value::String(s) if s == old_value => {
            *s = new_value.to_string();
            true
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items.iter_mut() {
                if item.as_str() == Some(old_value) {
                    *item = Value::String(new_value.to_string());
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}
