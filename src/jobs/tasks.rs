use serde_json::Value;
use tracing::{debug, info, warn};

use super::MaintenanceJob;
use crate::error::{Error, Result};
use crate::store::{RecordFilter, Store, transaction};
use crate::types::{ContentTypeId, CustomFieldType};

/// Executes one job to completion. Returns the number of records rewritten.
pub fn run_job(store: &dyn Store, job: &MaintenanceJob) -> Result<usize> {
    match job {
        MaintenanceJob::PurgeField {
            field_name,
            content_types,
        } => purge_field_data(store, field_name, content_types),
        MaintenanceJob::RenameChoiceValue {
            field_id,
            old_value,
            new_value,
        } => rename_choice_data(store, field_id, old_value, new_value),
    }
}

/// Removes `field_name` from the custom field data of every record of the
/// given types.
pub fn purge_field_data(
    store: &dyn Store,
    field_name: &str,
    content_types: &[ContentTypeId],
) -> Result<usize> {
    let mut total = 0;
    for &content_type in content_types {
        let updated = transaction(store, |tx| {
            let records =
                tx.query_records(content_type, &RecordFilter::HasField(field_name.to_string()))?;
            for record in &records {
                let mut data = record.custom_field_data.clone();
                data.remove(field_name);
                tx.update_record_data(&record.id, &data)?;
                debug!(record_id = %record.id, field = field_name, "Removed custom field data");
            }
            Ok(records.len())
        })?;
        total += updated;
    }

    info!(
        field = field_name,
        records = total,
        "Purged custom field data"
    );
    Ok(total)
}

/// Rewrites every stored occurrence of `old_value` for a selection field to
/// `new_value`: exact matches for select fields, list elements for
/// multi-select fields.
pub fn rename_choice_data(
    store: &dyn Store,
    field_id: &str,
    old_value: &str,
    new_value: &str,
) -> Result<usize> {
    let field = store.get_custom_field(field_id)?.ok_or(Error::NotFound)?;

    let filter = match field.field_type {
        CustomFieldType::Select => RecordFilter::FieldEquals {
            name: field.name.clone(),
            value: old_value.to_string(),
        },
        CustomFieldType::MultiSelect => RecordFilter::FieldContains {
            name: field.name.clone(),
            value: old_value.to_string(),
        },
        other => {
            warn!(
                field = %field.name,
                field_type = %other,
                "Unknown field type, failed to update custom field choice data"
            );
            return Ok(0);
        }
    };

    let mut total = 0;
    for &content_type in &field.content_types {
        let updated = transaction(store, |tx| {
            let records = tx.query_records(content_type, &filter)?;
            for record in &records {
                let mut data = record.custom_field_data.clone();
                if let Some(current) = data.get_mut(&field.name) {
                    replace_value(current, old_value, new_value);
                }
                tx.update_record_data(&record.id, &data)?;
                debug!(record_id = %record.id, field = %field.name, "Renamed custom field choice");
            }
            Ok(records.len())
        })?;
        total += updated;
    }

    info!(
        field = %field.name,
        old_value,
        new_value,
        records = total,
        "Updated custom field choice data"
    );
    Ok(total)
}

fn replace_value(current: &mut Value, old_value: &str, new_value: &str) {
    match current {
        Value::String(s) if s == old_value => *s = new_value.to_string(),
        Value::Array(items) => {
            for item in items.iter_mut() {
                if item.as_str() == Some(old_value) {
                    *item = Value::String(new_value.to_string());
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{CustomField, CustomFieldData, Record};
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn data(pairs: &[(&str, Value)]) -> CustomFieldData {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_purge_only_touches_listed_types() {
        let (_temp, store) = test_store();
        let device = store.get_or_create_content_type("dcim", "device").unwrap();
        let site = store.get_or_create_content_type("dcim", "site").unwrap();

        let a = Record::new(device.id, data(&[("old", json!(1)), ("keep", json!("x"))]));
        let b = Record::new(device.id, data(&[("keep", json!("y"))]));
        let c = Record::new(site.id, data(&[("old", json!(2))]));
        for r in [&a, &b, &c] {
            store.create_record(r).unwrap();
        }

        let updated = purge_field_data(&store, "old", &[device.id]).unwrap();
        assert_eq!(updated, 1);

        let a = store.get_record(&a.id).unwrap().unwrap();
        assert!(!a.cf().contains_key("old"));
        assert_eq!(a.cf().get("keep"), Some(&json!("x")));
        let c = store.get_record(&c.id).unwrap().unwrap();
        assert_eq!(c.cf().get("old"), Some(&json!(2)));
    }

    #[test]
    fn test_rename_select_value() {
        let (_temp, store) = test_store();
        let device = store.get_or_create_content_type("dcim", "device").unwrap();
        let mut field = CustomField::new("environment", CustomFieldType::Select);
        field.content_types.insert(device.id);
        store.create_custom_field(&field).unwrap();

        let stage = Record::new(device.id, data(&[("environment", json!("stage"))]));
        let prod = Record::new(device.id, data(&[("environment", json!("prod"))]));
        store.create_record(&stage).unwrap();
        store.create_record(&prod).unwrap();

        let job = MaintenanceJob::RenameChoiceValue {
            field_id: field.id.clone(),
            old_value: "stage".to_string(),
            new_value: "staging".to_string(),
        };
        assert_eq!(run_job(&store, &job).unwrap(), 1);

        let stage = store.get_record(&stage.id).unwrap().unwrap();
        assert_eq!(stage.cf().get("environment"), Some(&json!("staging")));
        let prod = store.get_record(&prod.id).unwrap().unwrap();
        assert_eq!(prod.cf().get("environment"), Some(&json!("prod")));
    }

    #[test]
    fn test_rename_multi_select_elements() {
        let (_temp, store) = test_store();
        let device = store.get_or_create_content_type("dcim", "device").unwrap();
        let mut field = CustomField::new("roles", CustomFieldType::MultiSelect);
        field.content_types.insert(device.id);
        store.create_custom_field(&field).unwrap();

        let record = Record::new(device.id, data(&[("roles", json!(["edge", "core"]))]));
        store.create_record(&record).unwrap();

        rename_choice_data(&store, &field.id, "edge", "border").unwrap();

        let record = store.get_record(&record.id).unwrap().unwrap();
        assert_eq!(record.cf().get("roles"), Some(&json!(["border", "core"])));
    }

    #[test]
    fn test_rename_on_non_selection_field_is_a_no_op() {
        let (_temp, store) = test_store();
        let field = CustomField::new("notes", CustomFieldType::Text);
        store.create_custom_field(&field).unwrap();

        assert_eq!(rename_choice_data(&store, &field.id, "a", "b").unwrap(), 0);
        assert!(matches!(
            rename_choice_data(&store, "missing", "a", "b"),
            Err(Error::NotFound)
        ));
    }
}
