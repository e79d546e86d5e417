use super::dialect::{Dialect, Standard};
use super::{command_builder, Command, CommandState, Filter};
use crate::core::Result;
use std::fmt;
use std::sync::Arc;

/// Sort direction for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

impl Order {
    pub fn by(field: impl Into<String>, ascending: bool) -> Self {
        Order {
            field: field.into(),
            ascending,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Order::by(field, true)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Order::by(field, false)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, if self.ascending { "ASC" } else { "DESC" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Natural,
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Natural => "NATURAL",
            JoinType::Cross => "CROSS",
        };
        f.write_str(keyword)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub join_type: JoinType,
    pub on: String,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.join_type {
            JoinType::Natural | JoinType::Cross => write!(f, "{} JOIN {}", self.join_type, self.table),
            _ => write!(f, "{} JOIN {} ON {}", self.join_type, self.table, self.on),
        }
    }
}

/// A projection query.
///
/// ```text
/// SELECT <fields|*> FROM <table> [<joins>] [WHERE ..] [GROUP BY ..] [HAVING ..] [ORDER BY ..]
/// ```
///
/// Pagination (`count`/`offset`) is handed to the select's [`Dialect`] and only
/// applied when `count > 0`.
#[derive(Debug, Clone)]
pub struct Select {
    state: CommandState,
    fields: Vec<String>,
    joins: Vec<Join>,
    group_by: Option<String>,
    having: Option<Filter>,
    orders: Vec<Order>,
    offset: usize,
    count: usize,
    dialect: Arc<dyn Dialect>,
}

impl Default for Select {
    fn default() -> Self {
        Select::with_dialect(Arc::new(Standard))
    }
}

command_builder!(Select);

impl Select {
    /// A select without pagination overlay.
    pub fn new() -> Self {
        Select::default()
    }

    pub fn with_dialect(dialect: Arc<dyn Dialect>) -> Self {
        Select {
            state: CommandState::default(),
            fields: Vec::new(),
            joins: Vec::new(),
            group_by: None,
            having: None,
            orders: Vec::new(),
            offset: 0,
            count: 0,
            dialect,
        }
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Page size; zero disables pagination.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Ascending order on `field`.
    pub fn order(self, field: impl Into<String>) -> Self {
        self.order_by(Order::asc(field))
    }

    pub fn order_desc(self, field: impl Into<String>) -> Self {
        self.order_by(Order::desc(field))
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Inner join with an ON expression.
    pub fn join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.join_with(table, JoinType::Inner, on)
    }

    pub fn join_with(mut self, table: impl Into<String>, join_type: JoinType, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            table: table.into(),
            join_type,
            on: on.into(),
        });
        self
    }

    /// Join without an ON clause (natural and cross joins).
    pub fn join_type(self, table: impl Into<String>, join_type: JoinType) -> Self {
        self.join_with(table, join_type, "")
    }

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.group_by = Some(expression.into());
        self
    }

    pub fn having(mut self, filter: Filter) -> Self {
        self.having = Some(filter);
        self
    }

    /// The base rendering, before any dialect overlay.
    pub fn to_base_sql(&self) -> Result<String> {
        let table = self.state.require_table("SELECT")?;
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(",")
        };

        let mut sql = format!("SELECT {} FROM {}", fields, table);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_string());
        }

        sql.push_str(&self.state.where_clause()?);

        if let Some(group_by) = &self.group_by {
            sql.push_str(&format!(" GROUP BY {}", group_by));
        }

        if let Some(having) = &self.having {
            sql.push_str(&format!(" HAVING {}", having.to_sql()?));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self.orders.iter().map(Order::to_string).collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(",")));
        }

        Ok(sql)
    }
}

impl Command for Select {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn to_sql(&self) -> Result<String> {
        let sql = self.to_base_sql()?;
        if self.count > 0 {
            Ok(self.dialect.paginate(sql, self.count, self.offset))
        } else {
            Ok(sql)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Firebird, MySql, SqlServer};
    use crate::core::{QueryKitError, Value};
    use insta::assert_snapshot;

    #[test]
    fn test_default_projection_and_order() {
        let select = Select::new()
            .table("users")
            .filter(Filter::by("age", ">", 18))
            .order("name");
        assert_snapshot!(select.to_sql().unwrap(), @"SELECT * FROM users WHERE age > 18 ORDER BY name ASC");
    }

    #[test]
    fn test_full_clause_order() {
        let select = Select::new()
            .table("orders o")
            .fields(["o.user_id", "count(*) AS total"])
            .join("users u", "u.id = o.user_id")
            .join_with("coupons c", JoinType::Left, "c.order_id = o.id")
            .join_type("regions", JoinType::Natural)
            .filter(Filter::new().field("o.status").eq("paid"))
            .group_by("o.user_id")
            .having(Filter::expr("count(*) > 2"))
            .order_desc("total")
            .order("o.user_id");

        assert_snapshot!(
            select.to_sql().unwrap(),
            @"SELECT o.user_id,count(*) AS total FROM orders o INNER JOIN users u ON u.id = o.user_id LEFT JOIN coupons c ON c.order_id = o.id NATURAL JOIN regions WHERE o.status ='paid' GROUP BY o.user_id HAVING count(*) > 2 ORDER BY total DESC,o.user_id ASC"
        );
    }

    #[test]
    fn test_missing_table_is_incomplete() {
        match Select::new().field("1").to_sql() {
            Err(QueryKitError::CommandIncomplete(msg)) => assert!(msg.contains("SELECT")),
            other => panic!("Expected CommandIncomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_render_is_idempotent() {
        let select = Select::with_dialect(Arc::new(MySql))
            .table("users")
            .filter(Filter::by("id", ">", Value::placeholder()))
            .param(3)
            .count(2);
        let first = select.render().unwrap();
        let second = select.render().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sql, "SELECT * FROM users WHERE id > ? LIMIT 0,2");
    }

    #[test]
    fn test_dialect_pagination() {
        let page = |dialect: Arc<dyn Dialect>| {
            Select::with_dialect(dialect)
                .table("users")
                .count(10)
                .offset(5)
                .to_sql()
                .unwrap()
        };

        assert_eq!(page(Arc::new(Firebird)), "SELECT FIRST 10 SKIP 5 * FROM users");
        assert_eq!(page(Arc::new(MySql)), "SELECT * FROM users LIMIT 5,10");
        let top = page(Arc::new(SqlServer));
        assert_eq!(top, "SELECT TOP 10 * FROM users");
        assert!(!top.contains('5'));
        assert_eq!(page(Arc::new(Standard)), "SELECT * FROM users");
    }

    #[test]
    fn test_zero_count_skips_overlay() {
        let select = Select::with_dialect(Arc::new(Firebird)).table("users").offset(5);
        assert_eq!(select.to_sql().unwrap(), "SELECT * FROM users");
    }

    #[test]
    fn test_cross_join_has_no_on_clause() {
        let select = Select::new()
            .table("a")
            .join_with("b", JoinType::Cross, "ignored");
        assert_eq!(select.to_sql().unwrap(), "SELECT * FROM a CROSS JOIN b");
    }
}
