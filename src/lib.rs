//! SQL command building and record mapping over SQLite.
//!
//! Statements are assembled with the builders in [`command`], executed through
//! [`crate::core::db::Query`] on a named [`crate::core::db::Connection`], and mapped to typed
//! records with the [`record`] layer.

// Core infrastructure modules
pub mod config;
pub mod core;
pub mod logging;

// Statement building and record mapping
pub mod command;
pub mod record;

pub use command::{Command, Delete, Filter, Insert, Order, Rendered, Select, Update};
pub use crate::core::db::{Connection, ConnectionRegistry, Query, SessionOptions};
pub use crate::core::{FromValue, QueryKitError, Result, Value};
pub use record::{Entity, MapValues, Repositories, Repository};
