use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{FieldSchema, FormField, FormOptions, choice, field, schema_for};
use crate::error::{Error, Result};
use crate::jobs::JobQueue;
use crate::store::{SharedStore, Store, transaction};
use crate::types::{ContentTypeId, CustomField, CustomFieldChoice, CustomFieldData, Record};

/// Entry point for schema edits and record validation.
///
/// Writes go through a single store transaction each. Follow-up data
/// rewrites are handed to the job queue only after that transaction has
/// committed, so a failed edit never schedules work.
#[derive(Clone)]
pub struct CustomFieldManager {
    store: SharedStore,
    queue: Arc<dyn JobQueue>,
}

impl CustomFieldManager {
    pub fn new(store: SharedStore, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    fn db(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Every field that applies to `content_type`, with its choices, ordered
    /// by weight then name.
    pub fn schema_for(&self, content_type: ContentTypeId) -> Result<Vec<FieldSchema>> {
        schema_for(self.db(), content_type)
    }

    pub fn field_schema(&self, field_id: &str) -> Result<FieldSchema> {
        let field = self
            .db()
            .get_custom_field(field_id)?
            .ok_or(Error::NotFound)?;
        FieldSchema::load(self.db(), field)
    }

    /// The applicable fields of a record paired with its stored values.
    /// Stale keys are left out; unset fields come back as `null`.
    pub fn get_custom_fields(&self, record: &Record) -> Result<Vec<(CustomField, Value)>> {
        let schema = self.schema_for(record.content_type)?;
        Ok(record
            .cf()
            .all_fields(&schema)
            .into_iter()
            .map(|(entry, value)| (entry.field.clone(), value))
            .collect())
    }

    pub fn validate_data(&self, content_type: ContentTypeId, data: &CustomFieldData) -> Result<()> {
        let schema = self.schema_for(content_type)?;
        data.validate(&schema).map_err(Error::Validation)
    }

    pub fn validate_record(&self, record: &Record) -> Result<()> {
        self.validate_data(record.content_type, record.cf())
    }

    /// Validates and writes a record's custom field data. The schema is read
    /// in the same transaction as the write, so a choice deleted concurrently
    /// is either seen by validation or refused by the delete.
    pub fn save_record(&self, record: &mut Record) -> Result<()> {
        transaction(self.db(), |tx| {
            let schema = schema_for(tx, record.content_type)?;
            record
                .cf()
                .validate(&schema)
                .map_err(Error::Validation)?;
            record.updated_at = Utc::now();
            if tx.get_record(&record.id)?.is_some() {
                tx.update_record_data(&record.id, &record.custom_field_data)
            } else {
                tx.create_record(record)
            }
        })?;
        debug!(record_id = %record.id, "Saved custom field data");
        Ok(())
    }

    pub fn form_field(&self, field_id: &str, options: FormOptions) -> Result<FormField> {
        Ok(self.field_schema(field_id)?.form_field(options))
    }

    pub fn save_field(&self, field: &mut CustomField) -> Result<()> {
        field::save_field(self.db(), field)?;
        info!(field = %field.name, field_type = %field.field_type, "Saved custom field");
        Ok(())
    }

    /// Deletes a field, then schedules removal of its data from records.
    pub fn delete_field(&self, field_id: &str) -> Result<()> {
        let job = field::delete_field(self.db(), field_id)?;
        info!(field_id, "Deleted custom field");
        self.queue.enqueue(job)
    }

    /// Creates or updates a choice. Changing its value schedules the rewrite
    /// of every record that stores the old value.
    pub fn save_choice(&self, choice: &CustomFieldChoice) -> Result<()> {
        let job = choice::save_choice(self.db(), choice)?;
        info!(field_id = %choice.field_id, value = %choice.value, "Saved custom field choice");
        match job {
            Some(job) => self.queue.enqueue(job),
            None => Ok(()),
        }
    }

    /// Deletes a choice unless it is the field default or still in use.
    pub fn delete_choice(&self, choice_id: &str) -> Result<()> {
        let choice = choice::delete_choice(self.db(), choice_id).inspect_err(|e| {
            if matches!(e, Error::ChoiceInUse { .. } | Error::ChoiceIsDefault { .. }) {
                warn!(choice_id, "Refused to delete custom field choice: {e}");
            }
        })?;
        info!(field_id = %choice.field_id, value = %choice.value, "Deleted custom field choice");
        Ok(())
    }
}
