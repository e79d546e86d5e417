/// Connection Management Module
///
/// This module provides named, long-lived SQLite sessions and the registry
/// that creates them once per name and releases them once at shutdown.

use crate::command::{Command, Dialect, Quoting, Select, Standard};
use crate::config::Config;
use crate::core::db::Query;
use crate::core::{QueryKitError, Result};
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use rusqlite::OpenFlags;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Session settings applied when a connection is opened.
///
/// SQLite has no user credentials; open flags and pragmas play that role.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Open the database read-only
    pub read_only: bool,
    /// `PRAGMA` statements run after opening, e.g. `"foreign_keys = ON"`
    pub pragmas: Vec<String>,
    /// Pagination overlay used by the connection's selects
    pub dialect: Arc<dyn Dialect>,
    /// Identifier enclosing characters bound onto every command
    pub quoting: Quoting,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            read_only: false,
            pragmas: Vec::new(),
            dialect: Arc::new(Standard),
            quoting: Quoting::default(),
        }
    }
}

impl SessionOptions {
    fn open_flags(&self) -> OpenFlags {
        if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        }
    }
}

/// One named database session.
#[derive(Debug)]
pub struct Connection {
    name: String,
    target: String,
    /// Re-entrant so a row callback may issue further queries on the same
    /// connection. `None` once the session has been released.
    session: ReentrantMutex<RefCell<Option<rusqlite::Connection>>>,
    dialect: RwLock<Arc<dyn Dialect>>,
    quoting: RwLock<Quoting>,
}

impl Connection {
    /// Opens a session. Failures surface as `QueryKitError::Connect` and are not retried.
    pub fn open(name: &str, target: &str, options: SessionOptions) -> Result<Self> {
        let connect_error = |source: rusqlite::Error| QueryKitError::Connect {
            name: name.to_string(),
            target: target.to_string(),
            source,
        };

        let session = rusqlite::Connection::open_with_flags(target, options.open_flags())
            .map_err(connect_error)?;

        for pragma in &options.pragmas {
            session
                .execute_batch(&format!("PRAGMA {};", pragma))
                .map_err(connect_error)?;
        }

        info!(connection = name, path = target, dialect = options.dialect.name(), "opened database session");

        Ok(Connection {
            name: name.to_string(),
            target: target.to_string(),
            session: ReentrantMutex::new(RefCell::new(Some(session))),
            dialect: RwLock::new(options.dialect),
            quoting: RwLock::new(options.quoting),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// A fresh select using this connection's dialect.
    pub fn select(&self) -> Select {
        Select::with_dialect(self.dialect())
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        match self.dialect.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the dialect used by subsequent [`Connection::select`] calls.
    pub fn set_dialect(&self, dialect: Arc<dyn Dialect>) -> &Self {
        match self.dialect.write() {
            Ok(mut guard) => *guard = dialect,
            Err(poisoned) => *poisoned.into_inner() = dialect,
        }
        self
    }

    pub fn quoting(&self) -> Quoting {
        match self.quoting.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_quoting(&self, quoting: Quoting) -> &Self {
        match self.quoting.write() {
            Ok(mut guard) => *guard = quoting,
            Err(poisoned) => *poisoned.into_inner() = quoting,
        }
        self
    }

    /// Binds this connection's quoting onto `command` and pairs them.
    pub fn query<C: Command>(self: &Arc<Self>, mut command: C) -> Query<C> {
        command.set_quoting(self.quoting());
        Query::new(Arc::clone(self), command)
    }

    /// Runs `f` with the live session, holding it for the duration of the call.
    ///
    /// Other threads wait until `f` returns. Calls nested inside `f` on the
    /// same thread share the session, so a row callback can run more queries.
    pub fn with_session<R>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<R>) -> Result<R> {
        let guard = self.session.lock();
        let slot = guard.borrow();
        let session = slot
            .as_ref()
            .ok_or_else(|| QueryKitError::ConnectionClosed(self.name.clone()))?;
        f(session)
    }

    pub fn is_open(&self) -> bool {
        let guard = self.session.lock();
        let open = guard.borrow().is_some();
        open
    }

    /// Releases the session. Returns `true` when this call closed it and
    /// `false` when it was already released.
    ///
    /// Closing from inside a [`Connection::with_session`] call on the same
    /// connection fails with `QueryKitError::App`.
    pub fn close(&self) -> Result<bool> {
        let guard = self.session.lock();
        let mut slot = guard.try_borrow_mut().map_err(|_| {
            QueryKitError::App(format!("Cannot close '{}' while a query is running on it", self.name))
        })?;

        match slot.take() {
            Some(session) => {
                session.close().map_err(|(_, e)| QueryKitError::Connect {
                    name: self.name.clone(),
                    target: self.target.clone(),
                    source: e,
                })?;
                info!(connection = %self.name, "closed database session");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Named connections, at most one live session per name.
///
/// The registry is owned by application startup code and shared by
/// reference. Creation is synchronized per name: concurrent `create` calls
/// for one name open a single session and all receive it. Sessions are
/// released by [`ConnectionRegistry::close_all`] or when the registry drops.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<Connection>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry::default()
    }

    /// Opens every connection declared in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = ConnectionRegistry::new();
        for (name, connection) in &config.connections {
            registry.create_with(name, &connection.target, connection.session_options())?;
        }
        Ok(registry)
    }

    /// Returns the connection registered under `name`, opening it with default
    /// options on first request.
    pub fn create(&self, name: &str, target: &str) -> Result<Arc<Connection>> {
        self.create_with(name, target, SessionOptions::default())
    }

    /// Like [`ConnectionRegistry::create`]; `options` only apply when this call
    /// opens the session.
    pub fn create_with(&self, name: &str, target: &str, options: SessionOptions) -> Result<Arc<Connection>> {
        let slot = {
            let mut slots = self.lock_slots()?;
            Arc::clone(slots.entry(name.to_string()).or_default())
        };

        let mut opened = false;
        let connection = slot.get_or_try_init(|| {
            opened = true;
            Connection::open(name, target, options).map(Arc::new)
        })?;

        if !opened {
            debug!(connection = name, "reusing registered connection");
        }

        Ok(Arc::clone(connection))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Connection>> {
        let slots = self.lock_slots().ok()?;
        slots.get(name).and_then(|slot| slot.get().cloned())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.lock_slots() {
            Ok(slots) => slots
                .iter()
                .filter(|(_, slot)| slot.get().is_some())
                .map(|(name, _)| name.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Releases every open session. Returns how many were closed by this call;
    /// the first failure is reported after all sessions were attempted.
    pub fn close_all(&self) -> Result<usize> {
        let connections: Vec<Arc<Connection>> = {
            let slots = self.lock_slots()?;
            slots.values().filter_map(|slot| slot.get().cloned()).collect()
        };

        let mut closed = 0;
        let mut first_error = None;
        for connection in connections {
            match connection.close() {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(connection = connection.name(), error = %e, "failed to close session");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }

    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Arc<Connection>>>>>> {
        self.slots
            .lock()
            .map_err(|_| QueryKitError::App("Failed to acquire connection registry lock".to_string()))
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            warn!(error = %e, "errors while releasing sessions at shutdown");
        }
    }
}
