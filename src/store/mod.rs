mod schema;
mod sqlite;

use std::sync::Arc;

pub use sqlite::SqliteStore;

use crate::error::{Error, Result};
use crate::types::*;

/// Selects records by the contents of their custom field data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    /// The data has a key for the field, whatever its value.
    HasField(String),
    /// The field's value is exactly this string.
    FieldEquals { name: String, value: String },
    /// The field's value is a list containing this string.
    FieldContains { name: String, value: String },
}

/// Store defines the database interface.
///
/// Not `Send + Sync` itself: the view handed to a transaction body borrows a
/// single connection. Share a whole store as [`SharedStore`].
pub trait Store {
    fn initialize(&self) -> Result<()>;

    // Content type registry
    fn get_or_create_content_type(&self, app_label: &str, model: &str) -> Result<ContentType>;
    fn get_content_type(&self, id: ContentTypeId) -> Result<Option<ContentType>>;
    fn get_content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> Result<Option<ContentType>>;
    fn list_content_types(&self) -> Result<Vec<ContentType>>;

    // Custom field operations (listed by weight, then name)
    fn create_custom_field(&self, field: &CustomField) -> Result<()>;
    fn get_custom_field(&self, id: &str) -> Result<Option<CustomField>>;
    fn get_custom_field_by_name(&self, name: &str) -> Result<Option<CustomField>>;
    fn list_custom_fields(&self) -> Result<Vec<CustomField>>;
    fn list_custom_fields_for_content_type(
        &self,
        content_type: ContentTypeId,
    ) -> Result<Vec<CustomField>>;
    fn update_custom_field(&self, field: &CustomField) -> Result<()>;
    fn delete_custom_field(&self, id: &str) -> Result<bool>;

    // Choice operations (listed by weight, then value)
    fn create_choice(&self, choice: &CustomFieldChoice) -> Result<()>;
    fn get_choice(&self, id: &str) -> Result<Option<CustomFieldChoice>>;
    fn list_choices(&self, field_id: &str) -> Result<Vec<CustomFieldChoice>>;
    fn count_choices(&self, field_id: &str) -> Result<i64>;
    fn update_choice(&self, choice: &CustomFieldChoice) -> Result<()>;
    fn delete_choice(&self, id: &str) -> Result<bool>;

    // Record operations
    fn create_record(&self, record: &Record) -> Result<()>;
    fn get_record(&self, id: &str) -> Result<Option<Record>>;
    fn query_records(
        &self,
        content_type: ContentTypeId,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>>;
    fn record_exists(&self, content_type: ContentTypeId, filter: &RecordFilter) -> Result<bool>;
    fn update_record_data(&self, id: &str, data: &CustomFieldData) -> Result<()>;
    fn delete_record(&self, id: &str) -> Result<bool>;

    /// Runs `f` inside a single write transaction, committing only if it
    /// returns Ok. Calls made on the store passed to `f` see and hold the
    /// transaction; nested calls join the outer transaction.
    fn in_transaction(&self, f: &mut dyn FnMut(&dyn Store) -> Result<()>) -> Result<()>;
}

/// A store that can be shared with the maintenance worker.
pub type SharedStore = Arc<dyn Store + Send + Sync>;

/// Value-returning wrapper around [`Store::in_transaction`].
pub fn transaction<T, F>(store: &dyn Store, f: F) -> Result<T>
where
    F: FnOnce(&dyn Store) -> Result<T>,
{
    let mut f = Some(f);
    let mut output = None;
    store.in_transaction(&mut |tx| {
        let f = f.take().ok_or_else(|| {
            Error::Internal("transaction body invoked more than once".to_string())
        })?;
        output = Some(f(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| Error::Internal("transaction body did not run".to_string()))
}

/// Looks up a content type from its `app_label.model` form.
pub fn resolve_content_type(store: &dyn Store, natural_key: &str) -> Result<ContentType> {
    let (app_label, model) = natural_key
        .split_once('.')
        .ok_or_else(|| Error::InvalidName(format!("expected app_label.model, got '{natural_key}'")))?;
    store
        .get_content_type_by_natural_key(app_label, model)?
        .ok_or(Error::NotFound)
}
