use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "dashchat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server origin, e.g. `https://dash.example.com`.
    pub base_url: String,
    /// Route the UI is sent to when the credential is rejected.
    pub sign_in_path: String,
    pub dashboard_stream_path: String,
    pub chart_stream_path: String,
    pub connect_timeout_secs: u64,
    /// Cancel a session's running stream when a new one starts for it.
    pub single_flight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            sign_in_path: "/login".to_string(),
            dashboard_stream_path: "/api/conversation/message/stream".to_string(),
            chart_stream_path: "/api/chart-conversation/message/stream".to_string(),
            connect_timeout_secs: 10,
            single_flight: true,
        }
    }
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".dashchat"))
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Path to the stored access token.
    pub fn credentials_path() -> PathBuf {
        Self::config_dir().join("auth.json")
    }

    /// Load from the default config file, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(base_url) = std::env::var("DASHCHAT_BASE_URL")
            && !base_url.is_empty()
        {
            config.base_url = base_url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Reject settings the driver cannot work with.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        for (name, path) in [
            ("sign_in_path", &self.sign_in_path),
            ("dashboard_stream_path", &self.dashboard_stream_path),
            ("chart_stream_path", &self.chart_stream_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!("{name} must start with '/': {path}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"https://dash.example.com\"\nsingle_flight = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://dash.example.com");
        assert!(!config.single_flight);
        assert_eq!(config.sign_in_path, "/login");
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_invalid_file_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "connect_timeout_secs = \"ten\"").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            base_url: "ftp://example.com".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            chart_stream_path: "api/chart".into(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chart_stream_path"));
    }

    #[test]
    fn test_paths_share_directory() {
        assert_eq!(Config::config_path().parent(), Config::credentials_path().parent());
    }
}
