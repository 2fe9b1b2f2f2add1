use serde::{Deserialize, Serialize};
use std::path::Path;

/// Channel keeper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Client identifier of the co-located virtual chain
    pub virtual_client_id: String,
    /// Prefix for generated channel identifiers
    pub channel_id_prefix: String,
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
    /// Register prometheus counters for handshake steps and virtual sends
    pub metrics_enabled: bool,
}

impl CoreConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CoreConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.virtual_client_id.trim().is_empty() {
            anyhow::bail!("virtual_client_id cannot be empty");
        }
        if self.channel_id_prefix.trim().is_empty() || self.channel_id_prefix.contains('/') {
            anyhow::bail!("invalid channel_id_prefix: {:?}", self.channel_id_prefix);
        }
        Ok(())
    }

    pub fn with_virtual_client_id(mut self, virtual_client_id: impl Into<String>) -> Self {
        self.virtual_client_id = virtual_client_id.into();
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            virtual_client_id: "polymer-0".to_string(),
            channel_id_prefix: "channel".to_string(),
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.virtual_client_id, "polymer-0");
        assert_eq!(config.channel_id_prefix, "channel");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vibc.toml");

        let config = CoreConfig::default().with_virtual_client_id("polymer-7");
        config.save(&path).unwrap();

        let loaded = CoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_saved_config_lists_only_keeper_settings() {
        let content = toml::to_string_pretty(&CoreConfig::default()).unwrap();
        let table: toml::Table = toml::from_str(&content).unwrap();

        let mut keys: Vec<&str> = table.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["channel_id_prefix", "log_level", "metrics_enabled", "virtual_client_id"]
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vibc.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();

        let loaded = CoreConfig::load(&path).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.virtual_client_id, "polymer-0");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vibc.toml");
        std::fs::write(&path, "virtual_client_id = \"\"\n").unwrap();

        assert!(CoreConfig::load(&path).is_err());
    }
}
