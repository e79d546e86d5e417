/// Repository Module
///
/// A [`Repository`] is the CRUD entry point for one entity type on one
/// connection. Every operation is assembled from the command model and runs
/// through a [`Query`]. Record values are always bound as parameters, never
/// inlined.
///
/// [`Repositories`] keeps at most one repository per entity type.
use super::entity::{require_primary_key, validate_metadata};
use super::{Entity, MapValues};
use crate::command::{Delete, Filter, Insert, Order, Select, Update};
use crate::core::db::{Connection, Query};
use crate::core::{FromValue, QueryKitError, Result, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub struct Repository<E: Entity> {
    connection: Arc<Connection>,
    factory: Arc<dyn Fn() -> E + Send + Sync>,
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &E::table())
            .field("connection", &self.connection.name())
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    /// Binds `E` to `connection`; `factory` produces blank records for reads.
    ///
    /// Nothing stops a caller from building several repositories for the
    /// same type this way. Only [`Repositories::get_or_create`] and
    /// [`Repositories::register`] keep one instance per entity type.
    pub fn new<F>(connection: Arc<Connection>, factory: F) -> Result<Self>
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        validate_metadata::<E>()?;
        Ok(Repository {
            connection,
            factory: Arc::new(factory),
        })
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// A blank record from the factory.
    pub fn create(&self) -> E {
        (self.factory)()
    }

    fn select(&self) -> Select {
        self.connection.select().table(E::table())
    }

    pub fn select_all(&self, orders: &[Order]) -> Query<Select> {
        let select = orders.iter().cloned().fold(self.select(), Select::order_by);
        self.connection.query(select)
    }

    pub fn select_by_filter(&self, filter: Filter, orders: &[Order]) -> Query<Select> {
        let select = orders
            .iter()
            .cloned()
            .fold(self.select().filter(filter), Select::order_by);
        self.connection.query(select)
    }

    /// Select on a single-field primary key.
    pub fn select_by_id(&self, id: impl Into<Value>) -> Result<Query<Select>> {
        self.select_by_key(vec![id.into()])
    }

    /// Select on every primary-key field, `key` given in key order.
    pub fn select_by_key(&self, key: Vec<Value>) -> Result<Query<Select>> {
        let fields = require_primary_key::<E>("select by id")?;
        if key.len() != fields.len() {
            return Err(QueryKitError::ParameterMismatch {
                sql: format!("primary key of {}", E::table()),
                placeholders: fields.len(),
                parameters: key.len(),
            });
        }

        let select = key
            .into_iter()
            .fold(self.select().filter(key_filter(fields)), Select::param);
        Ok(self.connection.query(select))
    }

    /// First value of `field` over the (optionally filtered) table.
    pub fn select_value(&self, field: &str, filter: Option<Filter>) -> Result<Option<Value>> {
        let mut select = self.select().field(field);
        if let Some(filter) = filter {
            select = select.filter(filter);
        }
        self.connection.query(select).value()
    }

    pub fn count_all(&self) -> Result<i64> {
        self.count_with(None)
    }

    pub fn count(&self, filter: Filter) -> Result<i64> {
        self.count_with(Some(filter))
    }

    fn count_with(&self, filter: Option<Filter>) -> Result<i64> {
        match self.select_value("count(*)", filter)? {
            Some(value) => i64::from_value(&value),
            None => Ok(0),
        }
    }

    /// Inserts every mapped field, all bound as parameters.
    pub fn insert(&self, record: &E) -> Result<()> {
        let insert = record
            .to_map_values()
            .iter()
            .fold(Insert::new().table(E::table()), |insert, (key, value)| {
                insert.bind(key, value.clone())
            });
        self.connection.query(insert).execute()
    }

    /// Inserts every non-key field and returns the engine-assigned key.
    pub fn insert_auto(&self, record: &E) -> Result<i64> {
        let insert = record
            .to_map_values()
            .iter()
            .filter(|(key, _)| !E::is_primary_key(key))
            .fold(Insert::new().table(E::table()), |insert, (key, value)| {
                insert.bind(key, value.clone())
            });
        let key = self.connection.query(insert).run(true)?;
        debug!(table = E::table(), key, "inserted record with generated key");
        Ok(key)
    }

    /// Writes every non-key field of the row identified by the record's key.
    pub fn update(&self, record: &E) -> Result<()> {
        let fields = require_primary_key::<E>("update")?;
        let values = record.to_map_values();

        let update = values
            .iter()
            .filter(|(key, _)| !E::is_primary_key(key))
            .fold(Update::new().table(E::table()), |update, (key, value)| {
                update.bind(key, value.clone())
            })
            .filter(key_filter(fields));

        let update = key_values::<E>(&values, fields)?
            .into_iter()
            .fold(update, Update::param);
        self.connection.query(update).execute()
    }

    /// Deletes the row identified by the record's key, reporting failure as `false`.
    pub fn delete(&self, record: &E) -> bool {
        report_delete(E::table(), self.try_delete(record))
    }

    /// Deletes the rows matching `filter`, reporting failure as `false`.
    pub fn delete_by_filter(&self, filter: Filter) -> bool {
        let delete = Delete::new().table(E::table()).filter(filter);
        report_delete(E::table(), self.connection.query(delete).execute())
    }

    /// Like [`Repository::delete`], with the failure cause.
    pub fn try_delete(&self, record: &E) -> Result<()> {
        let fields = require_primary_key::<E>("delete")?;
        let values = record.to_map_values();

        let delete = key_values::<E>(&values, fields)?
            .into_iter()
            .fold(Delete::new().table(E::table()).filter(key_filter(fields)), Delete::param);
        self.connection.query(delete).execute()
    }

    pub fn find_all(&self, orders: &[Order]) -> Result<Vec<E>> {
        self.select_all(orders).to_records(self.factory.as_ref())
    }

    pub fn find_by_filter(&self, filter: Filter, orders: &[Order]) -> Result<Vec<E>> {
        self.select_by_filter(filter, orders)
            .to_records(self.factory.as_ref())
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<E>> {
        let records = self.select_by_id(id)?.to_records(self.factory.as_ref())?;
        Ok(records.into_iter().next())
    }
}

/// `k1 =? AND k2 =? ...`
fn key_filter(fields: &[&str]) -> Filter {
    fields.iter().enumerate().fold(Filter::new(), |filter, (idx, field)| {
        let filter = if idx > 0 { filter.and() } else { filter };
        filter.field(field).eq(Value::placeholder())
    })
}

fn key_values<E: Entity>(values: &MapValues, fields: &[&str]) -> Result<Vec<Value>> {
    fields
        .iter()
        .map(|field| {
            values.get(field).cloned().ok_or_else(|| {
                QueryKitError::MetadataMissing(format!(
                    "{} does not write primary key field '{}'",
                    E::table(),
                    field
                ))
            })
        })
        .collect()
}

fn report_delete(table: &str, outcome: Result<()>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            warn!(table, error = %e, "delete failed");
            false
        }
    }
}

/// One repository per entity type.
#[derive(Debug, Default)]
pub struct Repositories {
    map: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Repositories {
    pub fn new() -> Self {
        Repositories::default()
    }

    /// Returns the repository for `E`, building it with `create` on first
    /// request. Later calls return the first instance and ignore `create`.
    pub fn get_or_create<E, F>(&self, create: F) -> Result<Arc<Repository<E>>>
    where
        E: Entity + 'static,
        F: FnOnce() -> Result<Repository<E>>,
    {
        let mut map = self.lock()?;
        if let Some(existing) = map.get(&TypeId::of::<E>()) {
            return downcast::<E>(Arc::clone(existing));
        }

        let repository = Arc::new(create()?);
        map.insert(TypeId::of::<E>(), repository.clone() as Arc<dyn Any + Send + Sync>);
        Ok(repository)
    }

    /// Registers `repository`; fails when `E` already has one.
    pub fn register<E: Entity + 'static>(&self, repository: Repository<E>) -> Result<Arc<Repository<E>>> {
        let mut map = self.lock()?;
        if map.contains_key(&TypeId::of::<E>()) {
            return Err(QueryKitError::Registry(format!(
                "a repository for table '{}' is already registered",
                E::table()
            )));
        }

        let repository = Arc::new(repository);
        map.insert(TypeId::of::<E>(), repository.clone() as Arc<dyn Any + Send + Sync>);
        Ok(repository)
    }

    pub fn get<E: Entity + 'static>(&self) -> Option<Arc<Repository<E>>> {
        let map = self.lock().ok()?;
        let existing = map.get(&TypeId::of::<E>())?;
        downcast::<E>(Arc::clone(existing)).ok()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> {
        self.map
            .lock()
            .map_err(|_| QueryKitError::App("Failed to acquire repository registry lock".to_string()))
    }
}

fn downcast<E: Entity + 'static>(any: Arc<dyn Any + Send + Sync>) -> Result<Arc<Repository<E>>> {
    any.downcast::<Repository<E>>()
        .map_err(|_| QueryKitError::Registry(format!("registry entry for '{}' has the wrong type", E::table())))
}
