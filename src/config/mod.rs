use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding `skm.db`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawAuthConfig")]
pub struct AuthConfig {
    /// Shared secrets accepted by the key API
    pub api_keys: Vec<String>,
    /// Set when `api_keys` holds a random key because none were configured
    pub generated_key: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        // Generate a random key if none is configured
        Self {
            api_keys: vec![uuid::Uuid::new_v4().to_string()],
            generated_key: true,
        }
    }
}

#[derive(Deserialize)]
struct RawAuthConfig {
    api_keys: Option<Vec<String>>,
}

impl From<RawAuthConfig> for AuthConfig {
    fn from(raw: RawAuthConfig) -> Self {
        match raw.api_keys {
            Some(api_keys) => Self {
                api_keys,
                generated_key: false,
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.api_keys.iter().all(|key| key.trim().is_empty()) {
            bail!("[auth] api_keys must contain at least one non-empty key");
        }
        if self.server.host.trim().is_empty() {
            bail!("[server] host must not be empty");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.data_dir, PathBuf::from("./data"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.auth.api_keys.len(), 1);
        assert!(config.auth.generated_key);
        assert!(config.validate().is_ok());

        let config = Config::parse("[auth]\n").unwrap();
        assert!(config.auth.generated_key);
    }

    #[test]
    fn test_parse_file() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            data_dir = "/var/lib/skm"

            [auth]
            api_keys = ["first", "second"]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.server.data_dir, PathBuf::from("/var/lib/skm"));
        assert_eq!(config.auth.api_keys, vec!["first", "second"]);
        assert!(!config.auth.generated_key);
    }

    #[test]
    fn test_validate_rejects_empty_keys() {
        let config = Config::parse("[auth]\napi_keys = []\n").unwrap();
        assert!(!config.auth.generated_key);
        assert!(config.validate().is_err());

        let config = Config::parse("[auth]\napi_keys = [\"  \"]\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("skm.toml")).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skm.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
