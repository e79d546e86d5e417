/// Raw Value Module
///
/// Heterogeneous values travel through the crate as [`Value`]: they are bound
/// as statement parameters, rendered as SQL literals, decoded from result rows
/// and coerced to typed record fields through [`FromValue`].
use crate::core::{QueryKitError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use std::fmt;

/// Marker standing in for a bound parameter in rendered SQL.
pub const PLACEHOLDER: &str = "?";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Declared type of a typed null parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Long,
    Float,
    Double,
    Text,
    Char,
    Timestamp,
    Boolean,
}

/// A single raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Null carrying the column type it stands for
    TypedNull(SqlType),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Blob(Vec<u8>),
    /// Raw SQL emitted verbatim (functions, casts, keywords)
    Expr(String),
}

impl Value {
    /// The placeholder marker as a value.
    pub fn placeholder() -> Self {
        Value::Text(PLACEHOLDER.to_string())
    }

    /// A raw SQL expression such as `CURRENT_TIMESTAMP`.
    pub fn expr(sql: impl Into<String>) -> Self {
        Value::Expr(sql.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::TypedNull(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Text(text) if text == PLACEHOLDER)
    }

    /// Renders the value as an inline SQL literal.
    ///
    /// Text is single-quoted unless it is the placeholder marker; numbers and
    /// booleans are emitted bare; date/time values become quoted ISO text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null | Value::TypedNull(_) => "NULL".to_string(),
            Value::Text(text) if text == PLACEHOLDER => PLACEHOLDER.to_string(),
            Value::Text(text) => quote(text),
            Value::Timestamp(_) | Value::Date(_) | Value::Time(_) => quote(&self.to_string()),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                format!("X'{}'", hex)
            }
            other => other.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null | Value::TypedNull(_) => "null",
            Value::Integer(_) => "integer",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Blob(_) => "blob",
            Value::Expr(_) => "expression",
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::TypedNull(_) => write!(f, "null"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Value::Time(v) => write!(f, "{}", v.format(TIME_FORMAT)),
            Value::Blob(v) => write!(f, "<BLOB: {} bytes>", v.len()),
            Value::Expr(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    String => Text,
    NaiveDateTime => Timestamp,
    NaiveDate => Date,
    NaiveTime => Time,
    Vec<u8> => Blob,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::Integer(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Long(i),
            ValueRef::Real(f) => Value::Double(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// Binds values by their declared type, in the engine's storage classes.
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Value::Null | Value::TypedNull(_) => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Long(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(f64::from(*v))),
            Value::Double(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Boolean(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Text(v) | Value::Expr(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Timestamp(_) | Value::Date(_) | Value::Time(_) => {
                ToSqlOutput::Owned(SqlValue::Text(self.to_string()))
            }
        };
        Ok(output)
    }
}

/// Coercion service: parse a raw value as `Self`, or fail.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn coercion_error(target: &'static str, value: &Value) -> QueryKitError {
    QueryKitError::Coercion {
        target,
        value: format!("{} `{}`", value.type_name(), value),
    }
}

/// Keeps the integral part of a decimal string (`"12.50"` and `"12,5"` become `"12"`).
fn integral_text(text: &str) -> &str {
    let text = text.trim();
    match text.find(['.', ',']) {
        Some(idx) if idx > 0 && idx + 1 < text.len() => {
            let head = &text[..idx];
            let digits = head.strip_prefix('-').unwrap_or(head);
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                head
            } else {
                text
            }
        }
        _ => text,
    }
}

macro_rules! integral_from_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let converted = match value {
                        Value::Integer(v) => <$ty>::try_from(*v).ok(),
                        Value::Long(v) => <$ty>::try_from(*v).ok(),
                        Value::Boolean(v) => Some(if *v { 1 } else { 0 }),
                        Value::Float(v) => truncate(f64::from(*v)).and_then(|v| <$ty>::try_from(v).ok()),
                        Value::Double(v) => truncate(*v).and_then(|v| <$ty>::try_from(v).ok()),
                        Value::Text(v) => integral_text(v).parse::<$ty>().ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| coercion_error($name, value))
                }
            }
        )*
    };
}

fn truncate(v: f64) -> Option<i64> {
    let t = v.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

integral_from_value! {
    i8 => "byte",
    i16 => "short",
    i32 => "integer",
    i64 => "long",
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        let converted = match value {
            Value::Integer(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Text(v) => v.trim().parse::<f64>().ok(),
            _ => None,
        };
        converted.ok_or_else(|| coercion_error("double", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Text(v) => v.trim().parse::<f32>().map_err(|_| coercion_error("float", value)),
            other => f64::from_value(other)
                .map(|v| v as f32)
                .map_err(|_| coercion_error("float", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        let converted = match value {
            Value::Boolean(v) => Some(*v),
            Value::Integer(v) => Some(*v != 0),
            Value::Long(v) => Some(*v != 0),
            Value::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        converted.ok_or_else(|| coercion_error("boolean", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(v) | Value::Expr(v) => Ok(v.clone()),
            Value::Blob(v) => String::from_utf8(v.clone()).map_err(|_| coercion_error("string", value)),
            Value::Null | Value::TypedNull(_) => Err(coercion_error("string", value)),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        let converted = match value {
            Value::Timestamp(v) => Some(*v),
            Value::Date(v) => v.and_hms_opt(0, 0, 0),
            Value::Long(v) => DateTime::<Utc>::from_timestamp(*v, 0).map(|dt| dt.naive_utc()),
            Value::Text(v) => parse_timestamp(v.trim()),
            _ => None,
        };
        converted.ok_or_else(|| coercion_error("timestamp", value))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        let converted = match value {
            Value::Date(v) => Some(*v),
            Value::Timestamp(v) => Some(v.date()),
            Value::Text(v) => NaiveDate::parse_from_str(v.trim(), DATE_FORMAT)
                .ok()
                .or_else(|| parse_timestamp(v.trim()).map(|ts| ts.date())),
            _ => None,
        };
        converted.ok_or_else(|| coercion_error("date", value))
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self> {
        let converted = match value {
            Value::Time(v) => Some(*v),
            Value::Timestamp(v) => Some(v.time()),
            Value::Text(v) => NaiveTime::parse_from_str(v.trim(), TIME_FORMAT)
                .ok()
                .or_else(|| parse_timestamp(v.trim()).map(|ts| ts.time())),
            _ => None,
        };
        converted.ok_or_else(|| coercion_error("time", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            Value::Text(v) => Ok(v.as_bytes().to_vec()),
            other => Err(coercion_error("blob", other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}
