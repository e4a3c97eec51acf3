use super::{confirm_action, init_store};
use crate::config::EngineConfig;
use crate::jobs::{purge_field_data, rename_choice_data};
use crate::store::resolve_content_type;

pub fn run_purge_field(
    config: &EngineConfig,
    name: String,
    models: Vec<String>,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;

    let mut content_types = Vec::with_capacity(models.len());
    for model in &models {
        content_types.push(resolve_content_type(&store, model)?.id);
    }

    let message = format!(
        "Remove '{name}' from every record of {}?",
        models.join(", ")
    );
    if !confirm_action(&message, yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    let updated = purge_field_data(&store, &name, &content_types)?;
    println!("Removed '{name}' from {updated} record(s)");

    Ok(())
}

pub fn run_rename_choice(
    config: &EngineConfig,
    field_id: String,
    old_value: String,
    new_value: String,
) -> anyhow::Result<()> {
    let store = init_store(config)?;

    let updated = rename_choice_data(&store, &field_id, &old_value, &new_value)?;
    println!("Renamed '{old_value}' to '{new_value}' in {updated} record(s)");

    Ok(())
}
