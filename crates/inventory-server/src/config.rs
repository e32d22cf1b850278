use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use inventory_core::lock::Lock;

use crate::check::ConsistencySettings;
use crate::consumer::DEFAULT_MAX_TX_RETRIES;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub consumer: ConsumerConfig,
    pub consistency: ConsistencyConfig,
    pub replication: ReplicationConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub partition: u32,
    pub channel_capacity: usize,
    pub poll_interval_ms: u64,
    pub max_tx_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub read_after_write_enabled: bool,
    pub default_to_at_least_as_acknowledged: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub broadcast_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "inventory-replicator".to_string(),
            partition: 0,
            channel_capacity: 1024,
            poll_interval_ms: 100,
            max_tx_retries: DEFAULT_MAX_TX_RETRIES,
        }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            read_after_write_enabled: true,
            default_to_at_least_as_acknowledged: true,
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            broadcast_enabled: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INVENTORY_CONSUMER_GROUP_ID") {
            self.consumer.group_id = v;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSUMER_PARTITION")
            && let Ok(n) = v.parse()
        {
            self.consumer.partition = n;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSUMER_CHANNEL_CAPACITY")
            && let Ok(n) = v.parse()
        {
            self.consumer.channel_capacity = n;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSUMER_POLL_INTERVAL_MS")
            && let Ok(n) = v.parse()
        {
            self.consumer.poll_interval_ms = n;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSUMER_MAX_TX_RETRIES")
            && let Ok(n) = v.parse()
        {
            self.consumer.max_tx_retries = n;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSISTENCY_READ_AFTER_WRITE_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.consistency.read_after_write_enabled = b;
        }
        if let Ok(v) = std::env::var("INVENTORY_CONSISTENCY_DEFAULT_TO_AT_LEAST_AS_ACKNOWLEDGED")
            && let Ok(b) = v.parse()
        {
            self.consistency.default_to_at_least_as_acknowledged = b;
        }
        if let Ok(v) = std::env::var("INVENTORY_REPLICATION_BROADCAST_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.replication.broadcast_enabled = b;
        }
        if let Ok(v) = std::env::var("INVENTORY_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("INVENTORY_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.consumer.group_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "consumer.group_id must not be empty".to_string(),
            ));
        }
        if self.consumer.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "consumer.channel_capacity must be non-zero".to_string(),
            ));
        }
        if self.consumer.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "consumer.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Fencing lock id owned by this consumer's partition.
    pub fn lock_id(&self) -> String {
        Lock::partition_id(&self.consumer.group_id, self.consumer.partition)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.consumer.poll_interval_ms)
    }

    pub fn to_consistency_settings(&self) -> ConsistencySettings {
        ConsistencySettings {
            read_after_write_enabled: self.consistency.read_after_write_enabled,
            default_to_at_least_as_acknowledged: self
                .consistency
                .default_to_at_least_as_acknowledged,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();

        assert_eq!(config.consumer.group_id, "inventory-replicator");
        assert_eq!(config.consumer.partition, 0);
        assert_eq!(config.consumer.channel_capacity, 1024);
        assert!(config.consistency.read_after_write_enabled);
        assert!(config.replication.broadcast_enabled);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.lock_id(), "inventory-replicator/0");
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[consumer]
group_id = "replicators"
partition = 4

[consistency]
default_to_at_least_as_acknowledged = false

[log]
format = "pretty"
level = "debug"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.lock_id(), "replicators/4");
        assert!(config.consistency.read_after_write_enabled);
        assert!(!config.consistency.default_to_at_least_as_acknowledged);
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn env_vars_override_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[consumer]
partition = 2
"#
        )
        .unwrap();

        // SAFETY: no other test reads this variable
        unsafe { std::env::set_var("INVENTORY_CONSUMER_PARTITION", "7") };
        let config = AppConfig::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("INVENTORY_CONSUMER_PARTITION") };

        assert_eq!(config.consumer.partition, 7);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/inventory.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile(ref path, _)) if path.contains("inventory.toml")));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[consumer\npartition = ").unwrap();

        let result = AppConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::ParseToml(_))));
    }

    #[test]
    fn validation_rejects_zero_channel_capacity() {
        let mut config = AppConfig::default();
        config.consumer.channel_capacity = 0;

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("channel_capacity"))
        );
    }

    #[test]
    fn validation_rejects_blank_group_id() {
        let mut config = AppConfig::default();
        config.consumer.group_id = "  ".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("group_id")));
    }

    #[test]
    fn consistency_settings_follow_config() {
        let mut config = AppConfig::default();
        config.consistency.read_after_write_enabled = false;

        let settings = config.to_consistency_settings();
        assert!(!settings.read_after_write_enabled);
        assert!(settings.default_to_at_least_as_acknowledged);
    }
}
