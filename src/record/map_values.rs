/// Ordered value bag decoded from one result row.
///
/// Getters are lenient: a missing key or a null value yields the caller's
/// default, and a value that cannot be coerced yields `None` instead of an
/// error.

use crate::core::{FromValue, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValues {
    entries: Vec<(String, Value)>,
}

macro_rules! typed_getters {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&self, key: &str) -> Option<$ty> {
                self.get_or(key, None)
            }
        )*
    };
}

impl MapValues {
    pub fn new() -> Self {
        MapValues::default()
    }

    /// Copies every projected column of `row` under its display label.
    pub fn from_row(labels: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut map = MapValues::new();
        for (idx, label) in labels.iter().enumerate() {
            map.put(label.clone(), Value::from(row.get_ref(idx)?));
        }
        Ok(map)
    }

    /// Sets `key`; an existing key keeps its position.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Raw value for `key`, including nulls.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coerces the value under `key`.
    ///
    /// Returns `default` when the key is absent or null, and `None` when the
    /// value cannot be converted to `T`.
    pub fn get_or<T: FromValue>(&self, key: &str, default: Option<T>) -> Option<T> {
        match self.get(key) {
            None => default,
            Some(value) if value.is_null() => default,
            Some(value) => match T::from_value(value) {
                Ok(converted) => Some(converted),
                Err(e) => {
                    debug!(key, error = %e, "lenient getter returned none");
                    None
                }
            },
        }
    }

    typed_getters! {
        get_integer => i32,
        get_long => i64,
        get_short => i16,
        get_byte => i8,
        get_float => f32,
        get_double => f64,
        get_boolean => bool,
        get_string => String,
        get_timestamp => NaiveDateTime,
        get_date => NaiveDate,
        get_time => NaiveTime,
        get_bytes => Vec<u8>,
    }

    /// The raw value, with null treated as absent.
    pub fn get_object(&self, key: &str) -> Option<Value> {
        self.get_or(key, None)
    }
}

impl fmt::Display for MapValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MapValues::new();
        for (key, value) in iter {
            map.put(key, value);
        }
        map
    }
}
