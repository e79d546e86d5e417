/// Command Module
///
/// SQL statements are assembled through mutable builders (`Select`, `Insert`,
/// `Update`, `Delete`) sharing one [`CommandState`]. Rendering never caches:
/// every call to [`Command::render`] rebuilds the text from the current state
/// and returns an immutable [`Rendered`] snapshot whose parameter list is in
/// lock-step with the `?` placeholders of its SQL.
///
/// Builders are plain values without internal locking. Mutating one instance
/// from several threads is the caller's responsibility.
pub mod delete;
pub mod dialect;
pub mod filter;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::Delete;
pub use dialect::{Dialect, DialectKind, Firebird, MySql, SqlServer, Standard};
pub use filter::{Filter, Operand};
pub use insert::Insert;
pub use select::{Join, JoinType, Order, Select};
pub use update::Update;

use crate::core::{QueryKitError, Result, Value};
use serde::Deserialize;

/// Enclosing characters applied to table and column identifiers.
///
/// The default pair is empty, which leaves identifiers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String)")]
pub struct Quoting {
    pub open: String,
    pub close: String,
}

impl Quoting {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Quoting {
            open: open.into(),
            close: close.into(),
        }
    }

    pub fn enclose(&self, identifier: &str) -> String {
        format!("{}{}{}", self.open, identifier, self.close)
    }
}

impl From<(String, String)> for Quoting {
    fn from((open, close): (String, String)) -> Self {
        Quoting { open, close }
    }
}

/// State shared by every command variant.
#[derive(Debug, Clone, Default)]
pub struct CommandState {
    table: Option<String>,
    filter: Option<Filter>,
    params: Vec<Value>,
    values: Vec<(String, Value)>,
    /// Values bound to a value slot by key, rendered as placeholders
    bindings: Vec<(String, Value)>,
    quoting: Quoting,
}

impl CommandState {
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Table name, or `CommandIncomplete` naming the statement kind.
    pub fn require_table(&self, kind: &str) -> Result<&str> {
        match self.table.as_deref() {
            Some(table) if !table.trim().is_empty() => Ok(table),
            _ => Err(QueryKitError::CommandIncomplete(format!(
                "{} has no target table",
                kind
            ))),
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Free parameters added with `param`, in call order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Value bound to the slot `key`, if any.
    pub fn binding(&self, key: &str) -> Option<&Value> {
        self.bindings.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_parameters(&self) -> bool {
        !self.params.is_empty() || !self.bindings.is_empty()
    }

    /// Parameters in placeholder order.
    ///
    /// Value slots come first in map order: a bound slot contributes its own
    /// value and an unbound placeholder slot takes the next free parameter.
    /// Remaining free parameters follow, for the WHERE clause.
    pub fn ordered_params(&self) -> Vec<Value> {
        let mut free = self.params.iter();
        let mut ordered = Vec::with_capacity(self.params.len() + self.bindings.len());

        for (key, value) in &self.values {
            if let Some(bound) = self.binding(key) {
                ordered.push(bound.clone());
            } else if value.is_placeholder() {
                if let Some(param) = free.next() {
                    ordered.push(param.clone());
                }
            }
        }

        ordered.extend(free.cloned());
        ordered
    }

    /// Ordered field/value pairs (insertion order).
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn quoting(&self) -> &Quoting {
        &self.quoting
    }

    pub(crate) fn set_table(&mut self, table: String) {
        self.table = Some(table);
    }

    pub(crate) fn set_filter(&mut self, filter: Filter) {
        self.filter = Some(filter);
    }

    pub(crate) fn push_param(&mut self, value: Value) {
        self.params.push(value);
    }

    /// Drops free parameters and slot bindings; placeholders stay in place.
    pub(crate) fn clear_params(&mut self) {
        self.params.clear();
        self.bindings.clear();
    }

    /// Re-setting a key replaces its value in place, keeping its position
    /// and dropping any binding it had.
    pub(crate) fn set_value(&mut self, key: String, value: Value) {
        self.bindings.retain(|(k, _)| *k != key);
        match self.values.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
    }

    /// Puts a placeholder in the slot `key` and ties `value` to it.
    /// Expressions are not bindable and are set inline instead.
    pub(crate) fn bind_value(&mut self, key: String, value: Value) {
        if let Value::Expr(_) = value {
            self.set_value(key, value);
            return;
        }
        self.set_value(key.clone(), Value::placeholder());
        self.bindings.push((key, value));
    }

    /// `WHERE <filter>` clause, or an empty string.
    pub(crate) fn where_clause(&self) -> Result<String> {
        match &self.filter {
            Some(filter) if !filter.is_empty() => Ok(format!(" WHERE {}", filter.to_sql()?)),
            _ => Ok(String::new()),
        }
    }
}

/// An immutable rendering of a command: SQL text plus its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Rendered {
    pub fn has_parameters(&self) -> bool {
        !self.params.is_empty()
    }
}

/// Behavior common to all SQL statements.
pub trait Command {
    fn state(&self) -> &CommandState;

    fn state_mut(&mut self) -> &mut CommandState;

    /// Builds the SQL text from the current state.
    fn to_sql(&self) -> Result<String>;

    fn has_parameters(&self) -> bool {
        self.state().has_parameters()
    }

    /// Whether executing this command can assign a new row id.
    fn returns_generated_key(&self) -> bool {
        false
    }

    fn set_quoting(&mut self, quoting: Quoting) {
        self.state_mut().quoting = quoting;
    }

    /// Renders the command and checks placeholders against bound parameters.
    fn render(&self) -> Result<Rendered> {
        let sql = self.to_sql()?;
        let params = self.state().ordered_params();
        let placeholders = count_placeholders(&sql);

        if placeholders != params.len() {
            return Err(QueryKitError::ParameterMismatch {
                sql,
                placeholders,
                parameters: params.len(),
            });
        }

        Ok(Rendered { sql, params })
    }
}

/// Counts `?` markers outside quoted literals and quoted identifiers.
pub fn count_placeholders(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;

    for c in sql.chars() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') => count += 1,
            _ => {}
        }
    }

    count
}

/// Renders an Insert/Update value slot: placeholder bare, null as `NULL`,
/// text quoted, everything else in its text form.
pub(crate) fn render_value(value: &Value) -> String {
    value.to_sql_literal()
}

/// Fluent setters shared by every command variant.
macro_rules! command_builder {
    ($ty:ty) => {
        impl $ty {
            /// Sets the target table.
            pub fn table(mut self, table: impl Into<String>) -> Self {
                self.state.set_table(table.into());
                self
            }

            /// Appends a bound parameter; order must follow the placeholders.
            pub fn param(mut self, value: impl Into<$crate::core::Value>) -> Self {
                self.state.push_param(value.into());
                self
            }

            /// Attaches the WHERE filter, replacing any previous one.
            pub fn filter(mut self, filter: $crate::command::Filter) -> Self {
                self.state.set_filter(filter);
                self
            }

            pub fn clear_params(&mut self) {
                self.state.clear_params();
            }

            pub fn table_name(&self) -> Option<&str> {
                self.state.table()
            }
        }
    };
}

/// Field/value setters for commands carrying a value map.
macro_rules! with_values {
    ($ty:ty) => {
        impl $ty {
            /// Sets `key` to an inline value.
            pub fn value(mut self, key: impl Into<String>, value: impl Into<$crate::core::Value>) -> Self {
                self.state.set_value(key.into(), value.into());
                self
            }

            /// Sets `key` to the placeholder marker.
            pub fn value_param(self, key: impl Into<String>) -> Self {
                self.value(key, $crate::core::Value::placeholder())
            }

            /// Sets `key` to a placeholder and binds `value` to that slot.
            ///
            /// The binding follows the slot, so re-binding a key keeps
            /// columns and parameters aligned.
            pub fn bind(mut self, key: impl Into<String>, value: impl Into<$crate::core::Value>) -> Self {
                self.state.bind_value(key.into(), value.into());
                self
            }
        }
    };
}

pub(crate) use command_builder;
pub(crate) use with_values;
