use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{Zone, ZoneId};

/// Connection settings for the hub's web console endpoints.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HubConfig {
    /// Base URL, e.g. `http://192.168.1.40`.
    pub url: String,

    /// Path of the command endpoint.
    #[serde(default = "default_command_path")]
    pub command_path: String,

    /// Path of the full-status endpoint.
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_command_path() -> String {
    "/command".into()
}
fn default_status_path() -> String {
    "/status".into()
}
fn default_timeout() -> u64 {
    5000
}

/// Root configuration file structure.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HearthConfig {
    /// Config file version
    #[serde(default = "default_version")]
    pub version: String,

    pub hub: HubConfig,

    /// Status poll period in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Sequence tick period in milliseconds. One tick per second unless
    /// you know why you need something else.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Display names for zones, keyed by hub id. Zones renamed on the
    /// hub keep working as long as the id is stable.
    #[serde(default)]
    pub zones: BTreeMap<ZoneId, String>,
}

fn default_version() -> String {
    "1".into()
}
fn default_poll_interval() -> u64 {
    5000
}
fn default_tick_interval() -> u64 {
    1000
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    MissingHubUrl,
    BadInterval { field: &'static str },
    NotFound { searched: Vec<PathBuf> },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Yaml(e) => write!(f, "YAML parse error: {}", e),
            Self::MissingHubUrl => write!(f, "hub.url must not be empty"),
            Self::BadInterval { field } => {
                write!(f, "{} must be greater than zero", field)
            }
            Self::NotFound { searched } => {
                write!(f, "no config file found, searched: {:?}", searched)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl HearthConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HearthConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HearthConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search for config file in standard locations
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let names = ["hearth.yaml", "hearth.yml", ".hearth.yaml", ".hearth.yml"];
        let mut searched = Vec::new();

        // Check environment variable first
        if let Ok(env_path) = std::env::var("HEARTH_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        // Search current directory and parents
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &names {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.url.trim().is_empty() {
            return Err(ConfigError::MissingHubUrl);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::BadInterval {
                field: "poll_interval_ms",
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::BadInterval {
                field: "tick_interval_ms",
            });
        }
        Ok(())
    }

    /// Configured zones in id order.
    pub fn zone_list(&self) -> Vec<Zone> {
        self.zones
            .iter()
            .map(|(id, name)| Zone {
                id: *id,
                name: name.clone(),
            })
            .collect()
    }

    /// Display name for a zone, falling back to its id.
    pub fn zone_name(&self, id: ZoneId) -> String {
        self.zones
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("zone {}", id))
    }

    pub fn command_url(&self) -> String {
        format!(
            "{}{}",
            self.hub.url.trim_end_matches('/'),
            self.hub.command_path
        )
    }

    pub fn status_url(&self) -> String {
        format!(
            "{}{}",
            self.hub.url.trim_end_matches('/'),
            self.hub.status_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
version: "1"
hub:
  url: http://192.168.1.40
zones:
  1: Kitchen
  3: Living Room
"#;
        let config = HearthConfig::from_str(yaml).unwrap();
        assert_eq!(config.hub.command_path, "/command");
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.zone_name(3), "Living Room");
        assert_eq!(config.zone_name(9), "zone 9");
        assert_eq!(config.command_url(), "http://192.168.1.40/command");
    }

    #[test]
    fn test_trailing_slash_in_hub_url() {
        let yaml = r#"
hub:
  url: http://hub.local/
"#;
        let config = HearthConfig::from_str(yaml).unwrap();
        assert_eq!(config.status_url(), "http://hub.local/status");
    }

    #[test]
    fn test_empty_hub_url_rejected() {
        let yaml = r#"
hub:
  url: ""
"#;
        let result = HearthConfig::from_str(yaml);
        assert!(matches!(result, Err(ConfigError::MissingHubUrl)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let yaml = r#"
hub:
  url: http://hub.local
tick_interval_ms: 0
"#;
        let result = HearthConfig::from_str(yaml);
        assert!(matches!(
            result,
            Err(ConfigError::BadInterval { field: "tick_interval_ms" })
        ));
    }

    #[test]
    fn test_zone_list_is_id_ordered() {
        let yaml = r#"
hub:
  url: http://hub.local
zones:
  5: Bath
  2: Hall
"#;
        let config = HearthConfig::from_str(yaml).unwrap();
        let ids: Vec<_> = config.zone_list().iter().map(|z| z.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }
}
