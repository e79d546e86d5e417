/// Core Module for QueryKit
///
/// This module contains the shared infrastructure the command and record
/// layers are built on: the error taxonomy, raw values with their coercion
/// service, and the database session/execution layer.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{QueryKitError, Result};
pub use value::{FromValue, SqlType, Value, PLACEHOLDER};
