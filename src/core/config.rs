use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Non-secret settings persisted as TOML. The API key is never stored
/// here; it is supplied through the environment at startup.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// API base URL override (e.g., a proxy in front of the real endpoint)
    pub base_url: Option<String>,
    /// Model name used to build the `generateContent` URL
    pub model: Option<String>,
    /// Total attempts per submission, transient retries included
    pub retry_attempts: Option<u32>,
    /// Fixed pause between transient attempts, in milliseconds
    pub retry_delay_ms: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "bavard")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("nonexistent_config.toml");

        let config = Config::load_from_path(&config_path).expect("Failed to load config");

        assert_eq!(config.base_url, None);
        assert_eq!(config.model, None);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_config_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.toml");

        let config = Config {
            base_url: Some("https://proxy.example.com/v1beta".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            retry_attempts: Some(5),
            retry_delay_ms: Some(500),
        };
        config.save_to_path(&config_path).expect("Failed to save config");

        let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
        assert_eq!(loaded.base_url(), "https://proxy.example.com/v1beta");
        assert_eq!(loaded.model(), "gemini-1.5-pro");
        assert_eq!(loaded.retry_attempts, Some(5));
        assert_eq!(loaded.retry_delay_ms, Some(500));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "model = \"gemini-1.5-pro\"\n").unwrap();

        let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
        assert_eq!(loaded.model(), "gemini-1.5-pro");
        assert_eq!(loaded.base_url(), DEFAULT_BASE_URL);
        assert_eq!(loaded.retry_attempts, None);
    }
}
