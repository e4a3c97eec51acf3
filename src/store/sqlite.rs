use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use serde_json::Value;

use super::schema::SCHEMA;
use super::{RecordFilter, Store};
use crate::error::{Error, Result};
use crate::types::*;

const FIELD_COLUMNS: &str = "id, name, label, type, description, required, filter_logic, \
     default_value, weight, validation_minimum, validation_maximum, validation_regex, \
     created_at, updated_at";

const CHOICE_COLUMNS: &str = "id, field_id, value, weight, created_at";

const RECORD_COLUMNS: &str = "id, content_type_id, custom_field_data, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    fn with<T>(&self, f: impl FnOnce(&SqliteConn<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn();
        f(&SqliteConn { conn: &conn })
    }
}

/// Store operations over a borrowed connection or open transaction.
struct SqliteConn<'a> {
    conn: &'a Connection,
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Maps unique-key violations to `AlreadyExists`.
fn map_insert_error(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn json_path(name: &str) -> String {
    format!("$.\"{name}\"")
}

fn custom_field_from_row(row: &Row<'_>) -> rusqlite::Result<CustomField> {
    let type_str: String = row.get(3)?;
    let field_type = CustomFieldType::parse(&type_str)
        .ok_or_else(|| conversion_error(3, format!("unknown custom field type '{type_str}'")))?;
    let logic_str: String = row.get(6)?;
    let filter_logic = FilterLogic::parse(&logic_str)
        .ok_or_else(|| conversion_error(6, format!("unknown filter logic '{logic_str}'")))?;
    let default = row
        .get::<_, Option<String>>(7)?
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()
        .map_err(|e| conversion_error(7, e))?;

    Ok(CustomField {
        id: row.get(0)?,
        name: row.get(1)?,
        label: row.get(2)?,
        field_type,
        description: row.get(4)?,
        required: row.get(5)?,
        filter_logic,
        default,
        weight: row.get(8)?,
        validation_minimum: row.get(9)?,
        validation_maximum: row.get(10)?,
        validation_regex: row.get(11)?,
        content_types: BTreeSet::new(),
        created_at: parse_datetime(&row.get::<_, String>(12)?),
        updated_at: parse_datetime(&row.get::<_, String>(13)?),
    })
}

fn choice_from_row(row: &Row<'_>) -> rusqlite::Result<CustomFieldChoice> {
    Ok(CustomFieldChoice {
        id: row.get(0)?,
        field_id: row.get(1)?,
        value: row.get(2)?,
        weight: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let data: String = row.get(2)?;
    let custom_field_data =
        serde_json::from_str::<CustomFieldData>(&data).map_err(|e| conversion_error(2, e))?;

    Ok(Record {
        id: row.get(0)?,
        content_type: ContentTypeId::new(row.get(1)?),
        custom_field_data,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn content_type_from_row(row: &Row<'_>) -> rusqlite::Result<ContentType> {
    Ok(ContentType {
        id: ContentTypeId::new(row.get(0)?),
        app_label: row.get(1)?,
        model: row.get(2)?,
    })
}

/// Builds the WHERE clause and parameters selecting records of one type.
fn record_filter_sql(
    content_type: ContentTypeId,
    filter: &RecordFilter,
) -> (String, Vec<SqlValue>) {
    let mut values = vec![SqlValue::Integer(content_type.get())];
    let clause = match filter {
        RecordFilter::All => "content_type_id = ?1".to_string(),
        RecordFilter::HasField(name) => {
            values.push(SqlValue::Text(json_path(name)));
            "content_type_id = ?1 AND json_type(custom_field_data, ?2) IS NOT NULL".to_string()
        }
        RecordFilter::FieldEquals { name, value } => {
            values.push(SqlValue::Text(json_path(name)));
            values.push(SqlValue::Text(value.clone()));
            "content_type_id = ?1
             AND json_type(custom_field_data, ?2) = 'text'
             AND json_extract(custom_field_data, ?2) = ?3"
                .to_string()
        }
        RecordFilter::FieldContains { name, value } => {
            values.push(SqlValue::Text(json_path(name)));
            values.push(SqlValue::Text(value.clone()));
            "content_type_id = ?1
             AND json_type(custom_field_data, ?2) = 'array'
             AND EXISTS (
                 SELECT 1 FROM json_each(records.custom_field_data, ?2) AS item
                 WHERE item.type = 'text' AND item.value = ?3
             )"
            .to_string()
        }
    };
    (clause, values)
}

impl SqliteConn<'_> {
    fn load_content_types(&self, field: &mut CustomField) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT content_type_id FROM custom_field_content_types
             WHERE custom_field_id = ?1 ORDER BY content_type_id",
        )?;
        let ids = stmt.query_map(params![field.id], |row| row.get::<_, i64>(0))?;
        field.content_types = ids
            .map(|id| id.map(ContentTypeId::new))
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(())
    }

    fn write_content_types(&self, field: &CustomField) -> Result<()> {
        self.conn.execute(
            "DELETE FROM custom_field_content_types WHERE custom_field_id = ?1",
            params![field.id],
        )?;
        for ct in &field.content_types {
            self.conn.execute(
                "INSERT INTO custom_field_content_types (custom_field_id, content_type_id)
                 VALUES (?1, ?2)",
                params![field.id, ct.get()],
            )?;
        }
        Ok(())
    }

    fn query_fields(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<CustomField>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), custom_field_from_row)?;
        let mut fields = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        for field in &mut fields {
            self.load_content_types(field)?;
        }
        Ok(fields)
    }

    fn query_field(&self, sql: &str, args: &[SqlValue]) -> Result<Option<CustomField>> {
        let field = self
            .conn
            .query_row(sql, params_from_iter(args.iter()), custom_field_from_row)
            .optional()?;
        match field {
            Some(mut field) => {
                self.load_content_types(&mut field)?;
                Ok(Some(field))
            }
            None => Ok(None),
        }
    }

    fn default_json(field: &CustomField) -> Result<Option<String>> {
        field
            .default_value()
            .map(serde_json::to_string)
            .transpose()
            .map_err(Error::from)
    }
}

impl Store for SqliteConn<'_> {
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // Content type registry

    fn get_or_create_content_type(&self, app_label: &str, model: &str) -> Result<ContentType> {
        self.conn.execute(
            "INSERT OR IGNORE INTO content_types (app_label, model) VALUES (?1, ?2)",
            params![app_label, model],
        )?;
        self.get_content_type_by_natural_key(app_label, model)?
            .ok_or(Error::NotFound)
    }

    fn get_content_type(&self, id: ContentTypeId) -> Result<Option<ContentType>> {
        self.conn
            .query_row(
                "SELECT id, app_label, model FROM content_types WHERE id = ?1",
                params![id.get()],
                content_type_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> Result<Option<ContentType>> {
        self.conn
            .query_row(
                "SELECT id, app_label, model FROM content_types
                 WHERE app_label = ?1 AND model = ?2",
                params![app_label, model],
                content_type_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_content_types(&self) -> Result<Vec<ContentType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, app_label, model FROM content_types ORDER BY app_label, model")?;
        let rows = stmt.query_map([], content_type_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Custom field operations

    fn create_custom_field(&self, field: &CustomField) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO custom_fields (id, name, label, type, description, required,
                     filter_logic, default_value, weight, validation_minimum,
                     validation_maximum, validation_regex, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    field.id,
                    field.name,
                    field.label,
                    field.field_type.as_str(),
                    field.description,
                    field.required,
                    field.filter_logic.as_str(),
                    Self::default_json(field)?,
                    field.weight,
                    field.validation_minimum,
                    field.validation_maximum,
                    field.validation_regex,
                    format_datetime(&field.created_at),
                    format_datetime(&field.updated_at),
                ],
            )
            .map_err(map_insert_error)?;
        self.write_content_types(field)
    }

    fn get_custom_field(&self, id: &str) -> Result<Option<CustomField>> {
        self.query_field(
            &format!("SELECT {FIELD_COLUMNS} FROM custom_fields WHERE id = ?1"),
            &[SqlValue::Text(id.to_string())],
        )
    }

    fn get_custom_field_by_name(&self, name: &str) -> Result<Option<CustomField>> {
        self.query_field(
            &format!("SELECT {FIELD_COLUMNS} FROM custom_fields WHERE name = ?1"),
            &[SqlValue::Text(name.to_string())],
        )
    }

    fn list_custom_fields(&self) -> Result<Vec<CustomField>> {
        self.query_fields(
            &format!("SELECT {FIELD_COLUMNS} FROM custom_fields ORDER BY weight, name"),
            &[],
        )
    }

    fn list_custom_fields_for_content_type(
        &self,
        content_type: ContentTypeId,
    ) -> Result<Vec<CustomField>> {
        self.query_fields(
            &format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields
                 WHERE id IN (
                     SELECT custom_field_id FROM custom_field_content_types
                     WHERE content_type_id = ?1
                 )
                 ORDER BY weight, name"
            ),
            &[SqlValue::Integer(content_type.get())],
        )
    }

    fn update_custom_field(&self, field: &CustomField) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE custom_fields SET name = ?1, label = ?2, type = ?3, description = ?4,
                     required = ?5, filter_logic = ?6, default_value = ?7, weight = ?8,
                     validation_minimum = ?9, validation_maximum = ?10,
                     validation_regex = ?11, updated_at = ?12
                 WHERE id = ?13",
                params![
                    field.name,
                    field.label,
                    field.field_type.as_str(),
                    field.description,
                    field.required,
                    field.filter_logic.as_str(),
                    Self::default_json(field)?,
                    field.weight,
                    field.validation_minimum,
                    field.validation_maximum,
                    field.validation_regex,
                    format_datetime(&field.updated_at),
                    field.id,
                ],
            )
            .map_err(map_insert_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        self.write_content_types(field)
    }

    fn delete_custom_field(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM custom_fields WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Choice operations

    fn create_choice(&self, choice: &CustomFieldChoice) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO custom_field_choices (id, field_id, value, weight, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    choice.id,
                    choice.field_id,
                    choice.value,
                    choice.weight,
                    format_datetime(&choice.created_at),
                ],
            )
            .map_err(map_insert_error)?;
        Ok(())
    }

    fn get_choice(&self, id: &str) -> Result<Option<CustomFieldChoice>> {
        self.conn
            .query_row(
                &format!("SELECT {CHOICE_COLUMNS} FROM custom_field_choices WHERE id = ?1"),
                params![id],
                choice_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_choices(&self, field_id: &str) -> Result<Vec<CustomFieldChoice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHOICE_COLUMNS} FROM custom_field_choices
             WHERE field_id = ?1 ORDER BY weight, value"
        ))?;
        let rows = stmt.query_map(params![field_id], choice_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_choices(&self, field_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM custom_field_choices WHERE field_id = ?1",
            params![field_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_choice(&self, choice: &CustomFieldChoice) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE custom_field_choices SET field_id = ?1, value = ?2, weight = ?3
                 WHERE id = ?4",
                params![choice.field_id, choice.value, choice.weight, choice.id],
            )
            .map_err(map_insert_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_choice(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM custom_field_choices WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Record operations

    fn create_record(&self, record: &Record) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO records (id, content_type_id, custom_field_data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.content_type.get(),
                    serde_json::to_string(&record.custom_field_data)?,
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )
            .map_err(map_insert_error)?;
        Ok(())
    }

    fn get_record(&self, id: &str) -> Result<Option<Record>> {
        self.conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn query_records(
        &self,
        content_type: ContentTypeId,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>> {
        let (clause, args) = record_filter_sql(content_type, filter);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE {clause} ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), record_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn record_exists(&self, content_type: ContentTypeId, filter: &RecordFilter) -> Result<bool> {
        let (clause, args) = record_filter_sql(content_type, filter);
        let exists = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM records WHERE {clause})"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn update_record_data(&self, id: &str, data: &CustomFieldData) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE records SET custom_field_data = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(data)?,
                format_datetime(&Utc::now()),
                id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn in_transaction(&self, f: &mut dyn FnMut(&dyn Store) -> Result<()>) -> Result<()> {
        // Already inside the caller's transaction.
        f(self)
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.with(|c| c.initialize())
    }

    fn get_or_create_content_type(&self, app_label: &str, model: &str) -> Result<ContentType> {
        self.with(|c| c.get_or_create_content_type(app_label, model))
    }

    fn get_content_type(&self, id: ContentTypeId) -> Result<Option<ContentType>> {
        self.with(|c| c.get_content_type(id))
    }

    fn get_content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> Result<Option<ContentType>> {
        self.with(|c| c.get_content_type_by_natural_key(app_label, model))
    }

    fn list_content_types(&self) -> Result<Vec<ContentType>> {
        self.with(|c| c.list_content_types())
    }

    fn create_custom_field(&self, field: &CustomField) -> Result<()> {
        self.in_transaction(&mut |tx| tx.create_custom_field(field))
    }

    fn get_custom_field(&self, id: &str) -> Result<Option<CustomField>> {
        self.with(|c| c.get_custom_field(id))
    }

    fn get_custom_field_by_name(&self, name: &str) -> Result<Option<CustomField>> {
        self.with(|c| c.get_custom_field_by_name(name))
    }

    fn list_custom_fields(&self) -> Result<Vec<CustomField>> {
        self.with(|c| c.list_custom_fields())
    }

    fn list_custom_fields_for_content_type(
        &self,
        content_type: ContentTypeId,
    ) -> Result<Vec<CustomField>> {
        self.with(|c| c.list_custom_fields_for_content_type(content_type))
    }

    fn update_custom_field(&self, field: &CustomField) -> Result<()> {
        self.in_transaction(&mut |tx| tx.update_custom_field(field))
    }

    fn delete_custom_field(&self, id: &str) -> Result<bool> {
        self.with(|c| c.delete_custom_field(id))
    }

    fn create_choice(&self, choice: &CustomFieldChoice) -> Result<()> {
        self.with(|c| c.create_choice(choice))
    }

    fn get_choice(&self, id: &str) -> Result<Option<CustomFieldChoice>> {
        self.with(|c| c.get_choice(id))
    }

    fn list_choices(&self, field_id: &str) -> Result<Vec<CustomFieldChoice>> {
        self.with(|c| c.list_choices(field_id))
    }

    fn count_choices(&self, field_id: &str) -> Result<i64> {
        self.with(|c| c.count_choices(field_id))
    }

    fn update_choice(&self, choice: &CustomFieldChoice) -> Result<()> {
        self.with(|c| c.update_choice(choice))
    }

    fn delete_choice(&self, id: &str) -> Result<bool> {
        self.with(|c| c.delete_choice(id))
    }

    fn create_record(&self, record: &Record) -> Result<()> {
        self.with(|c| c.create_record(record))
    }

    fn get_record(&self, id: &str) -> Result<Option<Record>> {
        self.with(|c| c.get_record(id))
    }

    fn query_records(
        &self,
        content_type: ContentTypeId,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>> {
        self.with(|c| c.query_records(content_type, filter))
    }

    fn record_exists(&self, content_type: ContentTypeId, filter: &RecordFilter) -> Result<bool> {
        self.with(|c| c.record_exists(content_type, filter))
    }

    fn update_record_data(&self, id: &str, data: &CustomFieldData) -> Result<()> {
        self.with(|c| c.update_record_data(id, data))
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        self.with(|c| c.delete_record(id))
    }

    fn in_transaction(&self, f: &mut dyn FnMut(&dyn Store) -> Result<()>) -> Result<()> {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock up front, so reads made inside the
        // transaction cannot be invalidated by another writer before commit.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        f(&SqliteConn { conn: &tx })?;
        tx.commit()?;
        Ok(())
    }
}
