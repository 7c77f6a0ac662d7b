use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "xbskv")]
#[command(about = "Runs the xbskv bookmark sync service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".xbskv")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

pub const DEFAULT_ALLOWED_ORIGIN: &str = "chrome-extension://lcbjdhceifofjlpecfpeimnnphbcjgnc";
pub const DEFAULT_MAX_SYNC_SIZE: u64 = 104_857_600;
pub const DEFAULT_MESSAGE: &str = "Welcome to xbrowsersync-sqlite.";
pub const DEFAULT_API_VERSION: &str = "1.1.13";

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_create_enabled")]
    pub create_enabled: bool,
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    #[serde(default = "default_max_sync_size")]
    pub max_sync_size: u64,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub turso_url: Option<String>,
    #[serde(default)]
    pub turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_database() -> String {
    "xbskv.sqlite".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_create_enabled() -> bool {
    true
}

fn default_allowed_origin() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_string()
}

fn default_max_sync_size() -> u64 {
    DEFAULT_MAX_SYNC_SIZE
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_sync_interval() -> u64 {
    60
}

impl Default for App {
    fn default() -> Self {
        App {
            database: default_database(),
            port: default_port(),
            create_enabled: default_create_enabled(),
            allowed_origin: default_allowed_origin(),
            max_sync_size: default_max_sync_size(),
            message: default_message(),
            api_version: default_api_version(),
            turso_url: None,
            turso_auth_token: None,
            sync_interval_seconds: default_sync_interval(),
        }
    }
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Status code reported by `/info`: 1 accepts new syncs, 3 does not.
    pub fn service_status(&self) -> u8 {
        if self.create_enabled { 1 } else { 3 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: App,
}

impl Config {
    /// Loads `path` if it exists, otherwise falls back to built-in defaults.
    pub fn new_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Config::load_config(&path.to_string_lossy());
        }
        tracing::warn!(path = ?path, "config file not found, using defaults");
        Ok(Config::default())
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_app_section_missing() {
        let cfg = Config::from_yaml("{}").unwrap();
        assert_eq!(cfg.app.get_port(), 8080);
        assert_eq!(cfg.app.get_db(), "xbskv.sqlite");
        assert!(cfg.app.create_enabled);
        assert_eq!(cfg.app.service_status(), 1);
        assert_eq!(cfg.app.max_sync_size, DEFAULT_MAX_SYNC_SIZE);
        assert_eq!(cfg.app.allowed_origin, DEFAULT_ALLOWED_ORIGIN);
    }

    #[test]
    fn test_creation_disabled_status() {
        let cfg = Config::from_yaml("app:\n  create_enabled: false\n").unwrap();
        assert!(!cfg.app.create_enabled);
        assert_eq!(cfg.app.service_status(), 3);
    }

    #[test]
    fn test_env_default_substitution() {
        let yaml = "app:\n  port: ${XBSKV_TEST_UNSET_PORT:-9191}\n  database: ${XBSKV_TEST_UNSET_DB:-sync.db}\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.app.get_port(), 9191);
        assert_eq!(cfg.app.get_db(), "sync.db");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::new_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.app.get_port(), 8080);
    }
}
