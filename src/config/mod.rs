//! Configuration loading and management

mod io;
mod settings;

pub use settings::{SeedAchievement, Settings};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Achievement definitions to create the first time each name is seen
    #[serde(default, rename = "achievement", skip_serializing_if = "Vec::is_empty")]
    pub achievements: Vec<SeedAchievement>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Create a config with the starter achievement ladder
    pub fn with_defaults() -> Self {
        let seed = |name: &str, target: i64| SeedAchievement {
            name: name.to_string(),
            target,
            genre: None,
        };
        Self {
            settings: Settings::default(),
            achievements: vec![seed("Reader I", 1), seed("Reader II", 10), seed("Reader III", 50)],
        }
    }

    /// Resolved path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        match &self.settings.database_path {
            Some(path) => expand_home(path),
            None => Self::global_config_dir().join("libris.db"),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [settings]
            database_path = "/var/lib/libris/data.db"
            busy_timeout_ms = 250

            [[achievement]]
            name = "Reader I"
            target = 1

            [[achievement]]
            name = "Dragon Rider"
            target = 3
            genre = "Fantasy"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/var/lib/libris/data.db"));
        assert_eq!(config.settings.busy_timeout_ms, 250);
        assert_eq!(config.achievements.len(), 2);
        assert_eq!(config.achievements[1].genre.as_deref(), Some("Fantasy"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.settings.busy_timeout_ms, 5000);
        assert!(config.achievements.is_empty());
        assert!(config.database_path().ends_with("libris.db"));
    }

    #[test]
    fn test_home_expansion() {
        let expanded = expand_home(Path::new("~/books/libris.db"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("books/libris.db"));
    }

    #[test]
    fn test_defaults_roundtrip_through_toml() {
        let config = Config::with_defaults();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.achievements, config.achievements);
    }
}
