use serde::Serialize;

use super::init_store;
use crate::config::EngineConfig;
use crate::customfields::schema_for;
use crate::store::{RecordFilter, Store, resolve_content_type};

#[derive(Serialize)]
struct FieldErrorOutput {
    field: String,
    message: String,
}

#[derive(Serialize)]
struct RecordErrorOutput {
    record_id: String,
    errors: Vec<FieldErrorOutput>,
}

#[derive(Serialize)]
struct CheckOutput {
    model: String,
    records_checked: usize,
    invalid: Vec<RecordErrorOutput>,
}

/// Validates every record of one content type against the current schema.
/// Fails when any record is invalid.
pub fn run_check(config: &EngineConfig, model: String, json: bool) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let content_type = resolve_content_type(&store, &model)?;

    let schema = schema_for(&store, content_type.id)?;

    let records = store.query_records(content_type.id, &RecordFilter::All)?;
    let mut invalid = Vec::new();
    for record in &records {
        if let Err(errors) = record.cf().validate(&schema) {
            invalid.push(RecordErrorOutput {
                record_id: record.id.clone(),
                errors: errors
                    .iter()
                    .map(|e| FieldErrorOutput {
                        field: e.field_name().to_string(),
                        message: e.to_string(),
                    })
                    .collect(),
            });
        }
    }

    let output = CheckOutput {
        model,
        records_checked: records.len(),
        invalid,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        for record in &output.invalid {
            println!("  {}", record.record_id);
            for error in &record.errors {
                println!("    {}", error.message);
            }
        }
        println!(
            "{} record(s) checked, {} invalid",
            output.records_checked,
            output.invalid.len()
        );
        println!();
    }

    if !output.invalid.is_empty() {
        anyhow::bail!(
            "{} record(s) of {} failed validation",
            output.invalid.len(),
            output.model
        );
    }
    Ok(())
}
