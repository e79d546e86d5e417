/// Database Module
///
/// This module binds rendered commands to live SQLite sessions.
///
/// ## Architecture
///
/// The database layer is split into two concerns:
/// - **Connection Management** (`connection.rs`): named sessions, their dialect and
///   identifier quoting, and the registry that owns them until shutdown
/// - **Query Execution** (`query.rs`): runs one command on one connection, either as
///   a plain statement or with bound parameters, and streams or materializes rows
///
/// ## Error Handling
///
/// Every engine failure is surfaced as `QueryKitError::Execution` carrying the
/// rendered SQL; nothing is swallowed at this layer.
pub mod connection;
pub mod query;

pub use connection::*;
pub use query::*;
