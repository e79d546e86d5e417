/// Query Execution Module
///
/// A [`Query`] pairs one command with one connection. Every execution renders
/// the command afresh, then takes the plain statement path when nothing is
/// bound or the parameter-bound path otherwise. Row cursors are scoped: they
/// live inside the call that opened them and are released on both the normal
/// and the error path.

use crate::command::{Command, Rendered};
use crate::core::db::Connection;
use crate::core::{QueryKitError, Result, Value};
use crate::record::{Entity, MapValues};
use rusqlite::params_from_iter;
use std::sync::Arc;
use tracing::debug;

/// A command bound to a connection, ready for execution.
#[derive(Debug)]
pub struct Query<C: Command> {
    connection: Arc<Connection>,
    command: C,
}

/// A live result cursor, valid for the duration of [`Query::with_cursor`].
pub struct Cursor<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    labels: Vec<String>,
    sql: String,
}

impl<'stmt> Cursor<'stmt> {
    /// Column display labels (aliases when present), in projection order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Advances to the next raw row.
    pub fn next_row(&mut self) -> Result<Option<&rusqlite::Row<'stmt>>> {
        let sql = &self.sql;
        self.rows
            .next()
            .map_err(|e| QueryKitError::execution(sql.as_str(), e))
    }

    /// Advances to the next row and decodes it into a value bag.
    pub fn next_values(&mut self) -> Result<Option<MapValues>> {
        let sql = &self.sql;
        let labels = &self.labels;
        match self.rows.next() {
            Ok(Some(row)) => MapValues::from_row(labels, row)
                .map(Some)
                .map_err(|e| QueryKitError::execution(sql.as_str(), e)),
            Ok(None) => Ok(None),
            Err(e) => Err(QueryKitError::execution(sql.as_str(), e)),
        }
    }
}

impl<C: Command> Query<C> {
    pub fn new(connection: Arc<Connection>, command: C) -> Self {
        Query { connection, command }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Renders the bound command.
    pub fn rendered(&self) -> Result<Rendered> {
        self.command.render()
    }

    /// Executes a statement that returns no rows.
    ///
    /// With `generate_keys` an insert returns the engine-assigned row id.
    /// Every other command, or `generate_keys = false`, returns zero.
    pub fn run(&self, generate_keys: bool) -> Result<i64> {
        let rendered = self.rendered()?;
        self.trace(&rendered);

        self.connection.with_session(|session| {
            let outcome = if rendered.has_parameters() {
                session
                    .prepare(&rendered.sql)
                    .and_then(|mut stmt| stmt.execute(params_from_iter(rendered.params.iter())))
            } else {
                session.execute(&rendered.sql, [])
            };
            outcome.map_err(|e| QueryKitError::execution(rendered.sql.as_str(), e))?;

            if generate_keys && self.command.returns_generated_key() {
                Ok(session.last_insert_rowid())
            } else {
                Ok(0)
            }
        })
    }

    /// Executes a statement and discards any result.
    pub fn execute(&self) -> Result<()> {
        self.run(false).map(|_| ())
    }

    /// Opens a cursor over the result rows and hands it to `f`.
    ///
    /// The cursor and its statement are released when `f` returns, whether it
    /// succeeded or not.
    pub fn with_cursor<R>(&self, f: impl FnOnce(&mut Cursor<'_>) -> Result<R>) -> Result<R> {
        let rendered = self.rendered()?;
        self.trace(&rendered);

        self.connection.with_session(|session| {
            let sql = rendered.sql.as_str();
            let mut stmt = session
                .prepare(sql)
                .map_err(|e| QueryKitError::execution(sql, e))?;
            let labels: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let rows = if rendered.has_parameters() {
                stmt.query(params_from_iter(rendered.params.iter()))
            } else {
                stmt.query([])
            }
            .map_err(|e| QueryKitError::execution(sql, e))?;

            let mut cursor = Cursor {
                rows,
                labels,
                sql: rendered.sql.clone(),
            };
            f(&mut cursor)
        })
    }

    /// Invokes `f` once per row, in result order. Returns the row count.
    pub fn for_each_row<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(&rusqlite::Row<'_>) -> Result<()>,
    {
        self.with_cursor(|cursor| {
            let mut count = 0;
            while let Some(row) = cursor.next_row()? {
                f(row)?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Materializes every row as a record built by `factory`.
    pub fn to_records<E, F>(&self, factory: F) -> Result<Vec<E>>
    where
        E: Entity,
        F: Fn() -> E,
    {
        let mut records = Vec::new();
        self.for_each_record(factory, |record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Streams records one at a time to `f`. Returns the record count.
    pub fn for_each_record<E, F, G>(&self, factory: F, mut f: G) -> Result<usize>
    where
        E: Entity,
        F: Fn() -> E,
        G: FnMut(E) -> Result<()>,
    {
        self.with_cursor(|cursor| {
            let mut count = 0;
            while let Some(values) = cursor.next_values()? {
                let mut record = factory();
                record.read_from(&values);
                f(record)?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// First column of the first row, or `None` when there are no rows.
    pub fn value(&self) -> Result<Option<Value>> {
        self.with_cursor(|cursor| {
            let sql = cursor.sql.clone();
            match cursor.next_row()? {
                Some(row) => row
                    .get_ref(0)
                    .map(|v| Some(Value::from(v)))
                    .map_err(|e| QueryKitError::execution(sql, e)),
                None => Ok(None),
            }
        })
    }

    fn trace(&self, rendered: &Rendered) {
        debug!(
            connection = self.connection.name(),
            sql = %rendered.sql,
            params = rendered.params.len(),
            "executing statement"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Filter, Insert, Select, Update};
    use crate::core::db::ConnectionRegistry;
    use crate::core::SqlType;
    use chrono::NaiveDate;

    fn setup() -> (ConnectionRegistry, Arc<Connection>) {
        let registry = ConnectionRegistry::new();
        let conn = registry.create("test", ":memory:").unwrap();
        conn.with_session(|s| {
            s.execute_batch(
                "
                CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL);
                INSERT INTO items (name, price) VALUES ('apple', 1.25);
                INSERT INTO items (name, price) VALUES ('pear', 2.5);
            ",
            )
            .map_err(|e| QueryKitError::execution("setup", e))
        })
        .unwrap();
        (registry, conn)
    }

    #[test]
    fn test_run_plain_and_bound() {
        let (_registry, conn) = setup();

        let key = conn
            .query(Insert::new().table("items").value("name", "plum").value("price", 3.0))
            .run(true)
            .unwrap();
        assert_eq!(key, 3);

        let key = conn
            .query(Insert::new().table("items").bind("name", "fig").bind("price", 4.5))
            .run(true)
            .unwrap();
        assert_eq!(key, 4);

        let none = conn
            .query(
                Update::new()
                    .table("items")
                    .bind("price", 9.0)
                    .filter(Filter::by("name", "=", Value::placeholder()))
                    .param("fig"),
            )
            .run(false)
            .unwrap();
        assert_eq!(none, 0);

        let price = conn
            .query(Select::new().table("items").field("price").filter(Filter::new().field("id").eq(4)))
            .value()
            .unwrap();
        assert_eq!(price, Some(Value::Double(9.0)));
    }

    #[test]
    fn test_generated_key_only_for_inserts() {
        let (_registry, conn) = setup();
        let key = conn
            .query(Insert::new().table("items").bind("name", "lime"))
            .run(true)
            .unwrap();
        assert_eq!(key, 3);

        let key = conn
            .query(Update::new().table("items").bind("price", 1.0).filter(Filter::by("id", "=", 1)))
            .run(true)
            .unwrap();
        assert_eq!(key, 0);
    }

    #[test]
    fn test_bound_values_by_storage_class() {
        let (_registry, conn) = setup();
        conn.with_session(|s| {
            s.execute_batch("CREATE TABLE kinds (label TEXT, v)")
                .map_err(|e| QueryKitError::execution("setup", e))
        })
        .unwrap();

        let stamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let cases = vec![
            ("null", Value::Null),
            ("typed_null", Value::TypedNull(SqlType::Timestamp)),
            ("integer", Value::Integer(7)),
            ("long", Value::Long(1 << 40)),
            ("float", Value::Float(1.5)),
            ("double", Value::Double(2.25)),
            ("boolean", Value::Boolean(true)),
            ("text", Value::from("hi")),
            ("timestamp", Value::Timestamp(stamp)),
            ("date", Value::Date(stamp.date())),
            ("time", Value::Time(stamp.time())),
            ("blob", Value::Blob(vec![0xde, 0xad])),
            ("expr", Value::expr("CURRENT_TIMESTAMP")),
        ];
        for (label, value) in cases {
            conn.query(Insert::new().table("kinds").bind("label", label).bind("v", value))
                .execute()
                .unwrap();
        }

        let mut stored = Vec::new();
        conn.query(Select::new().table("kinds").fields(["label", "typeof(v)", "v"]).order("rowid"))
            .for_each_row(|row| {
                let label: String = row.get(0).map_err(|e| QueryKitError::execution("row", e))?;
                let class: String = row.get(1).map_err(|e| QueryKitError::execution("row", e))?;
                let value = row
                    .get_ref(2)
                    .map(Value::from)
                    .map_err(|e| QueryKitError::execution("row", e))?;
                stored.push((label, class, value));
                Ok(())
            })
            .unwrap();

        let expected = [
            ("null", "null", Value::Null),
            ("typed_null", "null", Value::Null),
            ("integer", "integer", Value::Long(7)),
            ("long", "integer", Value::Long(1 << 40)),
            ("float", "real", Value::Double(1.5)),
            ("double", "real", Value::Double(2.25)),
            ("boolean", "integer", Value::Long(1)),
            ("text", "text", Value::from("hi")),
            ("timestamp", "text", Value::from("2024-03-01 10:30:00")),
            ("date", "text", Value::from("2024-03-01")),
            ("time", "text", Value::from("10:30:00")),
            ("blob", "blob", Value::Blob(vec![0xde, 0xad])),
        ];
        assert_eq!(stored.len(), expected.len() + 1);
        for ((label, class, value), (want_label, want_class, want_value)) in stored.iter().zip(expected.iter()) {
            assert_eq!(label, want_label);
            assert_eq!(class, want_class, "storage class of {}", label);
            assert_eq!(value, want_value, "stored value of {}", label);
        }

        // Expressions are evaluated by the engine, not stored as text
        let (label, class, value) = &stored[expected.len()];
        assert_eq!(label, "expr");
        assert_eq!(class, "text");
        assert_ne!(value, &Value::from("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_nested_query_inside_row_callback() {
        let (_registry, conn) = setup();
        let mut totals = Vec::new();
        let count = conn
            .query(Select::new().table("items").field("id").order("id"))
            .for_each_row(|row| {
                let id: i64 = row.get(0).map_err(|e| QueryKitError::execution("row", e))?;
                let name = conn
                    .query(
                        Select::new()
                            .table("items")
                            .field("name")
                            .filter(Filter::by("id", "=", Value::placeholder()))
                            .param(id),
                    )
                    .value()?;
                totals.push((id, name));
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            totals,
            vec![(1, Some(Value::from("apple"))), (2, Some(Value::from("pear")))]
        );
    }

    #[test]
    fn test_for_each_row_in_order() {
        let (_registry, conn) = setup();
        let mut names = Vec::new();
        let count = conn
            .query(Select::new().table("items").field("name").order("id"))
            .for_each_row(|row| {
                let name: String = row.get(0).map_err(|e| QueryKitError::execution("row", e))?;
                names.push(name);
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(names, vec!["apple", "pear"]);
    }

    #[test]
    fn test_callback_error_propagates_and_releases_cursor() {
        let (_registry, conn) = setup();
        let query = conn.query(Select::new().table("items"));
        let result = query.for_each_row(|_| Err(QueryKitError::App("stop".to_string())));
        assert!(matches!(result, Err(QueryKitError::App(_))));

        // Session is usable again once the failed cursor was released
        assert!(query.value().unwrap().is_some());
    }

    #[test]
    fn test_cursor_labels_use_aliases() {
        let (_registry, conn) = setup();
        let labels = conn
            .query(Select::new().table("items").fields(["id AS item_id", "name"]))
            .with_cursor(|cursor| Ok(cursor.labels().to_vec()))
            .unwrap();
        assert_eq!(labels, vec!["item_id", "name"]);
    }

    #[test]
    fn test_value_on_empty_result() {
        let (_registry, conn) = setup();
        let value = conn
            .query(Select::new().table("items").filter(Filter::by("id", "=", 99)))
            .value()
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_execution_error_carries_sql() {
        let (_registry, conn) = setup();
        match conn.query(Select::new().table("missing_table")).value() {
            Err(QueryKitError::Execution { sql, .. }) => assert_eq!(sql, "SELECT * FROM missing_table"),
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_query_binds_connection_quoting() {
        let (_registry, conn) = setup();
        conn.set_quoting(crate::command::Quoting::new("\"", "\""));
        let query = conn.query(Insert::new().table("items").bind("name", "kiwi"));
        assert_eq!(
            query.rendered().unwrap().sql,
            "INSERT INTO \"items\" (\"name\") VALUES (?)"
        );
        query.execute().unwrap();
    }
}
