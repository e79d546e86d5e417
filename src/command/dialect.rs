/// Engine-specific pagination overlays for `Select`.
///
/// The base `Select` renderer never paginates. A [`Dialect`] receives the base
/// text and rewrites it for its engine, and only when a page size was set.
/// New engines implement the trait; the base renderer stays unchanged.

use crate::core::Value;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Pagination strategy for one database engine.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrites a base SELECT for `count` rows after skipping `offset`.
    /// Only called with `count > 0`.
    fn paginate(&self, sql: String, count: usize, offset: usize) -> String;
}

/// No pagination overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl Dialect for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn paginate(&self, sql: String, _count: usize, _offset: usize) -> String {
        sql
    }
}

/// `SELECT FIRST n SKIP m ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct Firebird;

impl Firebird {
    /// `CAST('<timestamp>' AS TIMESTAMP)` with the sub-second part dropped,
    /// which the engine rejects in literals.
    pub fn cast_timestamp(timestamp: NaiveDateTime) -> Value {
        Value::expr(format!(
            "CAST('{}' AS TIMESTAMP)",
            timestamp.format("%Y-%m-%d %H:%M:%S")
        ))
    }
}

impl Dialect for Firebird {
    fn name(&self) -> &'static str {
        "firebird"
    }

    fn paginate(&self, sql: String, count: usize, offset: usize) -> String {
        replace_leading_select(sql, &format!("SELECT FIRST {} SKIP {}", count, offset))
    }
}

/// `... LIMIT m,n` (also understood by SQLite)
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn paginate(&self, sql: String, count: usize, offset: usize) -> String {
        format!("{} LIMIT {},{}", sql, offset, count)
    }
}

/// `SELECT TOP n ...`; the engine has no offset in this form.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn paginate(&self, sql: String, count: usize, _offset: usize) -> String {
        replace_leading_select(sql, &format!("SELECT TOP {}", count))
    }
}

fn replace_leading_select(sql: String, replacement: &str) -> String {
    match sql.strip_prefix("SELECT") {
        Some(rest) => format!("{}{}", replacement, rest),
        None => sql,
    }
}

/// Dialect names accepted in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Standard,
    Firebird,
    Mysql,
    Sqlserver,
}

impl DialectKind {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Standard => Arc::new(Standard),
            DialectKind::Firebird => Arc::new(Firebird),
            DialectKind::Mysql => Arc::new(MySql),
            DialectKind::Sqlserver => Arc::new(SqlServer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BASE: &str = "SELECT * FROM users ORDER BY name ASC";

    #[test]
    fn test_overlays() {
        assert_eq!(
            Firebird.paginate(BASE.to_string(), 10, 5),
            "SELECT FIRST 10 SKIP 5 * FROM users ORDER BY name ASC"
        );
        assert_eq!(
            MySql.paginate(BASE.to_string(), 10, 5),
            "SELECT * FROM users ORDER BY name ASC LIMIT 5,10"
        );
        assert_eq!(
            SqlServer.paginate(BASE.to_string(), 10, 5),
            "SELECT TOP 10 * FROM users ORDER BY name ASC"
        );
        assert_eq!(Standard.paginate(BASE.to_string(), 10, 5), BASE);
    }

    #[test]
    fn test_only_leading_select_is_replaced() {
        let sql = "SELECT id FROM a WHERE id IN (SELECT a_id FROM b)".to_string();
        assert_eq!(
            SqlServer.paginate(sql, 3, 0),
            "SELECT TOP 3 id FROM a WHERE id IN (SELECT a_id FROM b)"
        );
    }

    #[test]
    fn test_cast_timestamp_drops_fraction() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 450)
            .unwrap();
        assert_eq!(
            Firebird::cast_timestamp(ts).to_sql_literal(),
            "CAST('2024-05-06 07:08:09' AS TIMESTAMP)"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(DialectKind::Mysql.dialect().name(), "mysql");
        assert_eq!(DialectKind::default().dialect().name(), "standard");
    }
}
