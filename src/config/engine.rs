use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Queue that custom field housekeeping jobs are sent to.
pub const DEFAULT_QUEUE_NAME: &str = "custom_fields";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub queue_name: String,
}

impl EngineConfig {
    /// Reads a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_name.trim().is_empty() {
            return Err(Error::Config(
                "queue_name must name the queue for custom field jobs".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cfengine.db")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfengine.toml");
        fs::write(&path, "data_dir = \"/var/lib/cfengine\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/cfengine"));
        assert_eq!(config.queue_name, DEFAULT_QUEUE_NAME);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/cfengine/cfengine.db"));
    }

    #[test]
    fn test_empty_queue_name_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfengine.toml");
        fs::write(&path, "queue_name = \"\"\n").unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cfengine.toml");
        fs::write(&path, "port = 8080\n").unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(Error::Config(_))));
    }
}
