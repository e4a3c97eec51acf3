mod check;
mod commands;
mod field;
mod init;
mod maintenance;

pub use check::run_check;
pub use commands::FieldCommands;
pub use field::run_field_list;
pub use init::run_init;
pub use maintenance::{run_purge_field, run_rename_choice};

use std::path::Path;

use crate::config::EngineConfig;
use crate::store::SqliteStore;

/// Resolve the effective config: the file if given, then the `--data-dir`
/// override.
pub fn load_config(config: Option<&Path>, data_dir: Option<String>) -> anyhow::Result<EngineConfig> {
    let mut config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir.into();
    }
    Ok(config)
}

/// Initialize store from data directory, checking it exists
pub fn init_store(config: &EngineConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'cfengine init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

pub fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}
