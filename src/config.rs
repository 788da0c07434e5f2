use crate::nl_sql::config::LlmConfig;
use crate::nl_sql::dialect::SqlDialect;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// SQLite file used when neither a URL nor DB_PATH is given
pub const DEFAULT_DB_PATH: &str = "entegre_veritabani.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default = "default_console_output")]
    pub console_output: bool,
    #[serde(default = "default_file_output")]
    pub file_output: bool,
    /// Directory for the daily rolling log files
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::default(),
            console_output: default_console_output(),
            file_output: default_file_output(),
            directory: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => PathBuf::from(dir),
            None => Config::config_dir()
                .map(|dir| dir.join("logs"))
                .unwrap_or_else(|| std::env::temp_dir().join("nlsql").join("logs")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL; NLSQL_DATABASE_URL takes precedence
    #[serde(default)]
    pub url: Option<String>,
    /// Dialect the model writes and views are created in
    #[serde(default = "default_dialect")]
    pub dialect: SqlDialect,
    /// Namespace holding the dataset tables, defaults to the dialect's
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            dialect: default_dialect(),
            namespace: None,
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        self.connection_url_with(|name| std::env::var(name).ok())
    }

    /// NLSQL_DATABASE_URL, then `url`, then the SQLite file at DB_PATH
    fn connection_url_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        if let Some(url) = env("NLSQL_DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            return url;
        }
        if let Some(url) = self.url.as_ref().filter(|u| !u.trim().is_empty()) {
            return url.clone();
        }
        let path = env("DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        format!("sqlite://{path}")
    }

    pub fn namespace(&self) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| self.dialect.default_namespace().to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InteractionLogConfig {
    #[serde(default = "default_interaction_log_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        InteractionLogConfig {
            enabled: default_interaction_log_enabled(),
            path: None,
        }
    }
}

impl InteractionLogConfig {
    pub fn log_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => Config::config_dir()
                .map(|dir| dir.join("query_logs.jsonl"))
                .unwrap_or_else(|| PathBuf::from("query_logs.jsonl")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub interaction_log: InteractionLogConfig,
}

fn default_console_output() -> bool {
    true
}

fn default_file_output() -> bool {
    false
}

fn default_dialect() -> SqlDialect {
    SqlDialect::Sqlite
}

fn default_max_connections() -> u32 {
    5
}

fn default_interaction_log_enabled() -> bool {
    true
}

impl Config {
    /// `~/.config/nlsql`
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".config").join("nlsql"))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Config::default())
                }
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nl_sql::config::LlmProviderType;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.dialect, SqlDialect::Sqlite);
        assert_eq!(config.database.namespace(), "main");
        assert_eq!(config.llm.max_tokens, 256);
        assert!(config.interaction_log.enabled);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_connection_url_precedence() {
        let mut database = DatabaseConfig::default();
        assert_eq!(
            database.connection_url_with(env_of(&[])),
            "sqlite://entegre_veritabani.db"
        );
        assert_eq!(
            database.connection_url_with(env_of(&[("DB_PATH", "/data/plant.db")])),
            "sqlite:///data/plant.db"
        );

        database.url = Some("sqlite://configured.db".to_string());
        assert_eq!(
            database.connection_url_with(env_of(&[("DB_PATH", "/data/plant.db")])),
            "sqlite://configured.db"
        );
        assert_eq!(
            database.connection_url_with(env_of(&[("NLSQL_DATABASE_URL", "sqlite::memory:")])),
            "sqlite::memory:"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[llm]
provider = "openai"
openai_api_key = "k"

[database]
url = "sqlite://plant.db"
dialect = "sqlserver"
namespace = "main"

[logging]
level = "debug"
file_output = true
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.llm.provider, LlmProviderType::OpenAI);
        assert_eq!(config.database.dialect, SqlDialect::SqlServer);
        assert_eq!(config.database.namespace(), "main");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.file_output);
        assert!(config.logging.console_output);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database]\nmax_connections = \"many\"\n").unwrap();
        assert!(matches!(
            Config::load(Some(path.as_path())),
            Err(ConfigError::Parse { .. })
        ));
    }
}
