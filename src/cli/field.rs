use serde::Serialize;
use serde_json::Value;

use super::init_store;
use crate::config::EngineConfig;
use crate::customfields::choice_values;
use crate::store::{Store, resolve_content_type};
use crate::types::CustomFieldType;

#[derive(Serialize)]
struct FieldOutput {
    id: String,
    name: String,
    label: String,
    #[serde(rename = "type")]
    field_type: CustomFieldType,
    required: bool,
    weight: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    content_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    choices: Vec<String>,
}

pub fn run_field_list(config: &EngineConfig, model: Option<String>, json: bool) -> anyhow::Result<()> {
    let store = init_store(config)?;

    let fields = match model {
        Some(ref natural_key) => {
            let content_type = resolve_content_type(&store, natural_key)?;
            store.list_custom_fields_for_content_type(content_type.id)?
        }
        None => store.list_custom_fields()?,
    };

    let mut outputs = Vec::with_capacity(fields.len());
    for field in fields {
        let mut content_types = Vec::with_capacity(field.content_types.len());
        for id in &field.content_types {
            if let Some(ct) = store.get_content_type(*id)? {
                content_types.push(ct.natural_key());
            }
        }
        outputs.push(FieldOutput {
            choices: choice_values(&store, &field.id)?,
            label: field.display_label(),
            id: field.id,
            name: field.name,
            field_type: field.field_type,
            required: field.required,
            weight: field.weight,
            default: field.default,
            content_types,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    if outputs.is_empty() {
        println!("No custom fields defined.");
        return Ok(());
    }

    println!();
    for field in &outputs {
        let required = if field.required { " (required)" } else { "" };
        println!("  {} [{}]{}", field.name, field.field_type, required);
        println!("    Label: {}", field.label);
        if !field.content_types.is_empty() {
            println!("    Content types: {}", field.content_types.join(", "));
        }
        if !field.choices.is_empty() {
            println!("    Choices: {}", field.choices.join(", "));
        }
    }
    println!();
    println!("{} field(s) total", outputs.len());
    println!();

    Ok(())
}
