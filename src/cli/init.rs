use std::fs;

use crate::config::EngineConfig;
use crate::store::{SqliteStore, Store};

pub fn run_init(config: &EngineConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    if db_path.exists() {
        anyhow::bail!(
            "Database already initialized at: {}",
            db_path.display()
        );
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!();
    println!("Initialized custom field database at {}", db_path.display());
    println!("Maintenance jobs go to the '{}' queue", config.queue_name);
    println!();

    Ok(())
}
