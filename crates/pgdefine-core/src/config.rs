//! Configuration schema (pgdefine.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured password
pub const PASSWORD_ENV_VAR: &str = "PGDEFINE_PASSWORD";

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Display label for the connection
    #[serde(default)]
    pub label: Option<String>,

    /// Server hostname or IP
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    #[serde(default = "default_user")]
    pub user: String,

    /// Password (prefer PGDEFINE_PASSWORD over storing it here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database to connect to
    #[serde(default)]
    pub database: Option<String>,

    /// Allow scripts with more than one statement
    #[serde(default = "default_multiple_statements")]
    pub multiple_statements: bool,

    /// CA certificate (PEM) used for TLS connections
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_multiple_statements() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            label: None,
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            database: None,
            multiple_statements: default_multiple_statements(),
            cert_path: None,
        }
    }
}

impl ConnectionConfig {
    /// Same connection pointed at another database.
    ///
    /// `None` keeps the configured database.
    pub fn with_database(&self, database: Option<&str>) -> Self {
        match database {
            Some(db) if !db.is_empty() => Self {
                database: Some(db.to_string()),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    /// Label shown to users: the configured label, or `user@host:port/db`
    pub fn display_name(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }

        match &self.database {
            Some(db) => format!("{}@{}:{}/{}", self.user, self.host, self.port, db),
            None => format!("{}@{}:{}", self.user, self.host, self.port),
        }
    }

    /// Render as a libpq key/value connection string
    pub fn to_connection_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", quote_conn_value(&self.host)),
            format!("port={}", self.port),
            format!("user={}", quote_conn_value(&self.user)),
        ];

        if let Some(password) = &self.password {
            parts.push(format!("password={}", quote_conn_value(password)));
        }
        if let Some(database) = &self.database {
            parts.push(format!("dbname={}", quote_conn_value(database)));
        }

        parts.join(" ")
    }

    /// Whether a usable CA certificate is configured
    pub fn has_certificate(&self) -> bool {
        self.cert_path.as_deref().is_some_and(Path::exists)
    }
}

/// Quote a libpq connection-string value when it contains spaces or quotes
fn quote_conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Database connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        // Relative certificate paths are relative to the config file
        if let Some(cert) = &config.connection.cert_path {
            if cert.is_relative() {
                config.connection.cert_path = Some(config.project_root.join(cert));
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply the password from `PGDEFINE_PASSWORD`, if set
    pub fn apply_env(&mut self) {
        self.apply_password_override(std::env::var(PASSWORD_ENV_VAR).ok());
    }

    fn apply_password_override(&mut self, password: Option<String>) {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.connection.password = Some(password);
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5432);
        assert!(config.connection.multiple_statements);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [connection]
            host = "db.internal"
            database = "analytics"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.connection.user, "postgres");
        assert_eq!(config.connection.database.as_deref(), Some("analytics"));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Config::from_toml("[connection]\nport = \"not a port\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.connection.database = Some("sales".to_string());
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.connection, parsed.connection);
    }

    #[test]
    fn with_database_overrides_only_database() {
        let mut conn = ConnectionConfig::default();
        conn.database = Some("main".to_string());
        conn.label = Some("prod".to_string());

        let other = conn.with_database(Some("archive"));
        assert_eq!(other.database.as_deref(), Some("archive"));
        assert_eq!(other.label.as_deref(), Some("prod"));
        assert_eq!(other.host, conn.host);

        assert_eq!(conn.with_database(None), conn);
        assert_eq!(conn.with_database(Some("")), conn);
    }

    #[test]
    fn connection_string_quotes_values() {
        let mut conn = ConnectionConfig::default();
        conn.password = Some("it's secret".to_string());
        conn.database = Some("reports".to_string());

        assert_eq!(
            conn.to_connection_string(),
            "host=localhost port=5432 user=postgres password='it\\'s secret' dbname=reports"
        );
    }

    #[test]
    fn display_name_prefers_label() {
        let mut conn = ConnectionConfig::default();
        assert_eq!(conn.display_name(), "postgres@localhost:5432");
        conn.label = Some("local".to_string());
        assert_eq!(conn.display_name(), "local");
    }

    #[test]
    fn password_override() {
        let mut config = Config::default();
        config.apply_password_override(Some("hunter2".to_string()));
        assert_eq!(config.connection.password.as_deref(), Some("hunter2"));

        config.apply_password_override(Some(String::new()));
        assert_eq!(config.connection.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn relative_cert_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgdefine.toml");
        std::fs::write(&path, "[connection]\ncert_path = \"certs/ca.pem\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(
            config.connection.cert_path,
            Some(dir.path().join("certs/ca.pem"))
        );
        assert!(!config.connection.has_certificate());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgdefine.toml");

        let mut config = Config::default();
        config.connection.label = Some("staging".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.connection.label.as_deref(), Some("staging"));
    }
}
