use super::MapValues;
use crate::core::{QueryKitError, Result};

/// A record type mapped onto one table.
///
/// Implementors declare their table and primary-key fields and translate
/// themselves to and from a [`MapValues`] bag. Column keys are the names used
/// in SQL, so `write_to` followed by `read_from` on a fresh instance must
/// reproduce every mapped field.
///
/// ```ignore
/// #[derive(Default)]
/// struct User { id: i64, name: String }
///
/// impl Entity for User {
///     fn table() -> &'static str { "users" }
///     fn primary_key() -> &'static [&'static str] { &["id"] }
///
///     fn read_from(&mut self, values: &MapValues) {
///         self.id = values.get_or("id", Some(self.id)).unwrap_or_default();
///         self.name = values.get_string("name").unwrap_or_default();
///     }
///
///     fn write_to(&self, values: &mut MapValues) {
///         values.put("id", self.id);
///         values.put("name", &self.name);
///     }
/// }
/// ```
pub trait Entity: Sized {
    /// Table the record lives in.
    fn table() -> &'static str;

    /// Primary-key column names, in key order. Empty when the table has none.
    fn primary_key() -> &'static [&'static str] {
        &[]
    }

    fn has_primary_key() -> bool {
        !Self::primary_key().is_empty()
    }

    fn is_primary_key(field: &str) -> bool {
        Self::primary_key().contains(&field)
    }

    /// Populates fields from `values`. Missing keys leave fields untouched or
    /// defaulted, as the implementation chooses.
    fn read_from(&mut self, values: &MapValues);

    /// Writes every mapped field into `values`.
    fn write_to(&self, values: &mut MapValues);

    fn to_map_values(&self) -> MapValues {
        let mut values = MapValues::new();
        self.write_to(&mut values);
        values
    }

    /// A field-by-field copy through the value bag into a `factory` instance.
    fn copy_with(&self, factory: impl FnOnce() -> Self) -> Self {
        let mut copy = factory();
        copy.read_from(&self.to_map_values());
        copy
    }

    fn copy(&self) -> Self
    where
        Self: Default,
    {
        self.copy_with(Self::default)
    }
}

/// Checks that `E` declares a table.
pub fn validate_metadata<E: Entity>() -> Result<()> {
    if E::table().trim().is_empty() {
        return Err(QueryKitError::MetadataMissing(format!(
            "{} declares no table",
            std::any::type_name::<E>()
        )));
    }
    Ok(())
}

/// Checks that `E` declares primary-key fields, for key-based `operation`s.
pub(crate) fn require_primary_key<E: Entity>(operation: &str) -> Result<&'static [&'static str]> {
    let key = E::primary_key();
    if key.is_empty() {
        return Err(QueryKitError::MetadataMissing(format!(
            "{} on table '{}' needs primary key fields",
            operation,
            E::table()
        )));
    }
    Ok(key)
}
