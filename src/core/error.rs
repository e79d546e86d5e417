/// QueryKit Error Module
///
/// This module defines the error taxonomy shared by command rendering, query
/// execution, record mapping and configuration loading.
use thiserror::Error;

/// Comprehensive error type for the crate.
///
/// This enum covers every failure the command layer can surface:
/// - Rendering (missing table, placeholder/parameter drift)
/// - Execution against a session (wraps the rendered SQL and the cause)
/// - Value coercion (absorbed by the lenient `MapValues` getters)
/// - Entity metadata and registries
/// - Configuration loading
#[derive(Error, Debug)]
pub enum QueryKitError {
    /// Required command state (table, values) was missing at render time
    #[error("Command incomplete: {0}")]
    CommandIncomplete(String),

    /// Bound parameter count differs from the placeholders in the rendered text
    #[error("Parameter mismatch: {placeholders} placeholder(s) but {parameters} parameter(s) in `{sql}`")]
    ParameterMismatch {
        sql: String,
        placeholders: usize,
        parameters: usize,
    },

    /// The engine rejected or failed a statement
    #[error("Execution error: {source} (sql: {sql})")]
    Execution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A raw value could not be converted to the requested type
    #[error("Coercion error: cannot convert {value} to {target}")]
    Coercion { target: &'static str, value: String },

    /// Entity table or primary-key declarations are missing
    #[error("Metadata missing: {0}")]
    MetadataMissing(String),

    /// Opening a named session failed
    #[error("Connection error: cannot open '{name}' at {target}: {source}")]
    Connect {
        name: String,
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The session behind a connection was already released
    #[error("Connection '{0}' is closed")]
    ConnectionClosed(String),

    /// Repository or connection registry rule violations
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors for unexpected conditions (poisoned locks and the like)
    #[error("Application error: {0}")]
    App(String),
}

impl QueryKitError {
    /// Wraps an engine error together with the SQL that triggered it.
    pub fn execution(sql: impl Into<String>, source: rusqlite::Error) -> Self {
        QueryKitError::Execution {
            sql: sql.into(),
            source,
        }
    }
}

/// Type alias for Result to use QueryKitError as the error type.
pub type Result<T> = std::result::Result<T, QueryKitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryKitError::execution("SELECT * FROM nope", rusqlite::Error::ExecuteReturnedResults);
        let text = err.to_string();
        assert!(text.contains("Execution error"));
        assert!(text.contains("SELECT * FROM nope"));

        let err = QueryKitError::ParameterMismatch {
            sql: "DELETE FROM t WHERE id = ?".to_string(),
            placeholders: 1,
            parameters: 0,
        };
        assert!(err.to_string().contains("1 placeholder(s) but 0 parameter(s)"));

        let err = QueryKitError::MetadataMissing("users has no primary key".to_string());
        assert!(err.to_string().contains("Metadata missing"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QueryKitError = io_err.into();
        match err {
            QueryKitError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: QueryKitError = toml_err.into();
        match err {
            QueryKitError::Toml(_) => {}
            _ => panic!("Expected TOML error"),
        }
    }

    #[test]
    fn test_execution_keeps_source() {
        use std::error::Error as _;
        let err = QueryKitError::execution("SELECT 1", rusqlite::Error::InvalidQuery);
        assert!(err.source().is_some());
    }
}
