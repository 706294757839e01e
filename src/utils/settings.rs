//! Settings and configuration utilities.
//!
//! Settings are read from `$HOME/.commit-distill/settings.json`. The `env`
//! map is a fallback for environment variables and the `generation`
//! section supplies the defaults for each generation run.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::commit::GenerationConfig;

/// Directory under `$HOME` holding the settings file.
const SETTINGS_DIR: &str = ".commit-distill";

/// Settings file name.
const SETTINGS_FILE: &str = "settings.json";

/// Settings loaded from `$HOME/.commit-distill/settings.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Generation defaults.
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    ///
    /// A missing file yields default settings.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Returns an environment variable with fallback to settings.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) => Some(value),
            Err(_) => self.env.get(key).cloned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("absent.json")).unwrap();
        assert!(settings.env.is_empty());
        assert_eq!(settings.generation, GenerationConfig::default());
    }

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        let settings_json = r#"{
            "env": {
                "CD_TEST_VAR": "test_value",
                "OPENAI_API_KEY": "test_api_key"
            },
            "generation": {
                "budget": 8000,
                "use_emoji": true
            }
        }"#;
        fs::write(&settings_path, settings_json).unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(settings.env.get("CD_TEST_VAR").unwrap(), "test_value");
        assert_eq!(settings.env.get("OPENAI_API_KEY").unwrap(), "test_api_key");
        assert_eq!(settings.generation.budget, 8000);
        assert!(settings.generation.use_emoji);
        assert_eq!(settings.generation.max_length, 72);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(&settings_path, "{ not json").unwrap();

        let err = Settings::load_from_path(&settings_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn settings_get_env_var() {
        let settings = Settings {
            env: HashMap::from([(
                "CD_SETTINGS_ONLY_VAR".to_string(),
                "from_settings".to_string(),
            )]),
            ..Settings::default()
        };

        // Environment takes precedence.
        env::set_var("CD_SETTINGS_ONLY_VAR", "from_env");
        assert_eq!(
            settings.get_env_var("CD_SETTINGS_ONLY_VAR").unwrap(),
            "from_env"
        );

        // Fallback to settings.
        env::remove_var("CD_SETTINGS_ONLY_VAR");
        assert_eq!(
            settings.get_env_var("CD_SETTINGS_ONLY_VAR").unwrap(),
            "from_settings"
        );

        assert!(settings.get_env_var("CD_NOWHERE_VAR").is_none());
    }
}
