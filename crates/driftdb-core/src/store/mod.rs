mod memory;

pub use memory::MemoryStore;

use crate::{error::InternalError, schema::TableDescriptor, value::Value};
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// RowValues
///
/// Partial or full row keyed by column name. Used for composite raw/value
/// views on entries, insert/update payloads, and store result rows. Absent
/// keys mean "not part of this row", distinct from a present `Value::Null`.
///

#[derive(
    Clone, Debug, Default, Deref, DerefMut, Deserialize, Eq, IntoIterator, PartialEq, Serialize,
)]
pub struct RowValues(BTreeMap<String, Value>);

impl RowValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable setter for fixture and payload construction.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }
}

impl<const N: usize> From<[(&str, Value); N]> for RowValues {
    fn from(entries: [(&str, Value); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(column, value)| (column.to_string(), value))
                .collect(),
        )
    }
}

///
/// ExecutionContext
///
/// Transactional store boundary consumed by the flush processor. All four
/// operations are scoped to one logical transaction and return the affected
/// or selected base-column rows.
///
/// Calls are strictly sequential (`&mut self`); the processor never issues a
/// second operation before the previous one returned. Failures must surface
/// as errors — the processor propagates them unmodified and aborts the
/// remaining flush phases, leaving transaction rollback to the caller.
///

pub trait ExecutionContext {
    /// Bulk delete keyed by identity values.
    fn delete_by_ids(
        &mut self,
        table: &TableDescriptor,
        ids: &[Value],
    ) -> Result<Vec<RowValues>, InternalError>;

    /// Bulk select keyed by identity values.
    fn select_by_ids(
        &mut self,
        table: &TableDescriptor,
        ids: &[Value],
    ) -> Result<Vec<RowValues>, InternalError>;

    /// Single-row insert; the returned row must carry all base columns,
    /// including store-generated ones.
    fn insert(
        &mut self,
        table: &TableDescriptor,
        values: &RowValues,
    ) -> Result<Vec<RowValues>, InternalError>;

    /// Single-row update keyed by one identity value.
    fn update(
        &mut self,
        table: &TableDescriptor,
        id: &Value,
        values: &RowValues,
    ) -> Result<Vec<RowValues>, InternalError>;
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_values_distinguish_absent_from_null() {
        let row = RowValues::new().with("key", "k").with("value", Value::Null);
        assert_eq!(row.get("key"), Some(&Value::Text("k".to_string())));
        assert_eq!(row.get("value"), Some(&Value::Null));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn row_values_from_array_literal() {
        let row = RowValues::from([("id", Value::Uint(1)), ("key", Value::from("k"))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Uint(1)));
    }
}
