use crate::command::{DialectKind, Quoting};
use crate::core::db::SessionOptions;
use crate::core::{QueryKitError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Level name for `logging::init_with_level`
    pub log_level: Option<String>,
    /// Named connections, opened by `ConnectionRegistry::from_config`
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// One named connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Database path, or `:memory:`
    pub target: String,
    #[serde(default)]
    pub dialect: DialectKind,
    /// Identifier enclosing pair, e.g. `["[", "]"]`
    pub quote: Option<Quoting>,
    #[serde(default)]
    pub read_only: bool,
    /// `PRAGMA` statements applied after opening
    #[serde(default)]
    pub pragmas: Vec<String>,
}

impl ConnectionConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_only: self.read_only,
            pragmas: self.pragmas.clone(),
            dialect: self.dialect.dialect(),
            quoting: self.quote.clone().unwrap_or_default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        for (name, connection) in &config.connections {
            if connection.target.trim().is_empty() {
                return Err(QueryKitError::Config(format!(
                    "connection '{}' has an empty target",
                    name
                )));
            }
        }
        Ok(config)
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = querykit::config::load_config("querykit.toml")?;
/// println!("{:?}", config.connections.keys().collect::<Vec<_>>());
/// # Ok::<(), querykit::QueryKitError>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
