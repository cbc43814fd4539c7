use crate::{
    error::InternalError,
    schema::TableDescriptor,
    store::{ExecutionContext, RowValues},
    value::Value,
};
use std::collections::BTreeMap;

///
/// MemoryStore
///
/// Embeddable in-memory [`ExecutionContext`]: one ordered row map per table,
/// serial `Uint` generation for generated identity columns, and result rows
/// that always carry every base column (absent payload columns are filled
/// with `Null`, as a relational store would report them).
///
/// Backs the integration suite in place of a SQL driver; also usable as a
/// scratch store for embedding callers.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<Value, RowValues>,
    serial: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row in a table, in identity order.
    #[must_use]
    pub fn rows(&self, table: &TableDescriptor) -> Vec<RowValues> {
        self.tables
            .get(table.name())
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Fetch one row by its raw identity value.
    #[must_use]
    pub fn row(&self, table: &TableDescriptor, id: &Value) -> Option<RowValues> {
        self.tables
            .get(table.name())
            .and_then(|t| t.rows.get(id))
            .cloned()
    }

    fn table_mut(&mut self, table: &TableDescriptor) -> &mut MemoryTable {
        self.tables.entry(table.name().to_string()).or_default()
    }

    /// Fill every base column of the table, defaulting absent ones to Null.
    fn complete_row(table: &TableDescriptor, values: &RowValues) -> RowValues {
        let mut row = RowValues::new();
        for column in table.columns() {
            let value = values.get(column.name()).cloned().unwrap_or(Value::Null);
            row.set(column.name(), value);
        }
        row
    }
}

impl ExecutionContext for MemoryStore {
    fn delete_by_ids(
        &mut self,
        table: &TableDescriptor,
        ids: &[Value],
    ) -> Result<Vec<RowValues>, InternalError> {
        let state = self.table_mut(table);
        let mut removed = Vec::new();
        for id in ids {
            if let Some(row) = state.rows.remove(id) {
                removed.push(row);
            }
        }
        Ok(removed)
    }

    fn select_by_ids(
        &mut self,
        table: &TableDescriptor,
        ids: &[Value],
    ) -> Result<Vec<RowValues>, InternalError> {
        let state = self.table_mut(table);
        Ok(ids
            .iter()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect())
    }

    fn insert(
        &mut self,
        table: &TableDescriptor,
        values: &RowValues,
    ) -> Result<Vec<RowValues>, InternalError> {
        let identity = table.identity_column();
        let mut row = Self::complete_row(table, values);

        let mut id = row.get(identity.name()).cloned().unwrap_or(Value::Null);
        if id.is_null() {
            if !identity.is_generated() {
                return Err(InternalError::store_invariant(format!(
                    "insert into \"{}\" requires a \"{}\" value",
                    table.name(),
                    identity.name()
                )));
            }
            let state = self.table_mut(table);
            state.serial += 1;
            id = Value::Uint(state.serial);
            row.set(identity.name(), id.clone());
        }

        let state = self.table_mut(table);
        if state.rows.contains_key(&id) {
            return Err(InternalError::store_conflict(format!(
                "row already exists in \"{}\": {id}",
                table.name()
            )));
        }
        state.rows.insert(id, row.clone());

        Ok(vec![row])
    }

    fn update(
        &mut self,
        table: &TableDescriptor,
        id: &Value,
        values: &RowValues,
    ) -> Result<Vec<RowValues>, InternalError> {
        let state = self.table_mut(table);
        let Some(row) = state.rows.get_mut(id) else {
            // no matching row: empty result, the caller owns the contract
            return Ok(Vec::new());
        };
        for (column, value) in values.iter() {
            row.set(column.clone(), value.clone());
        }
        Ok(vec![row.clone()])
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDescriptor;

    fn table() -> TableDescriptor {
        TableDescriptor::new(
            "things",
            vec![
                ColumnDescriptor::new("id").identity().generated(),
                ColumnDescriptor::new("key"),
                ColumnDescriptor::new("value").nullable(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn insert_generates_serial_identities_and_fills_base_columns() {
        let table = table();
        let mut store = MemoryStore::new();

        let rows = store
            .insert(&table, &RowValues::new().with("key", "k1"))
            .unwrap();
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&Value::Uint(1)));
        assert_eq!(row.get("key"), Some(&Value::Text("k1".to_string())));
        assert_eq!(row.get("value"), Some(&Value::Null));

        let rows = store
            .insert(&table, &RowValues::new().with("key", "k2"))
            .unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Uint(2)));
    }

    #[test]
    fn insert_rejects_duplicate_identity() {
        let table = table();
        let mut store = MemoryStore::new();
        let payload = RowValues::new().with("id", 7u64).with("key", "k");

        store.insert(&table, &payload).unwrap();
        let err = store.insert(&table, &payload).unwrap_err();
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn update_merges_columns_and_reports_missing_rows_as_empty() {
        let table = table();
        let mut store = MemoryStore::new();
        store
            .insert(&table, &RowValues::new().with("key", "k1").with("value", "v1"))
            .unwrap();

        let rows = store
            .update(&table, &Value::Uint(1), &RowValues::new().with("value", "v2"))
            .unwrap();
        assert_eq!(rows[0].get("key"), Some(&Value::Text("k1".to_string())));
        assert_eq!(rows[0].get("value"), Some(&Value::Text("v2".to_string())));

        let rows = store
            .update(&table, &Value::Uint(99), &RowValues::new().with("value", "v3"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn delete_returns_removed_rows_and_skips_missing_ids() {
        let table = table();
        let mut store = MemoryStore::new();
        store
            .insert(&table, &RowValues::new().with("key", "k1"))
            .unwrap();

        let removed = store
            .delete_by_ids(&table, &[Value::Uint(1), Value::Uint(2)])
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert!(store.rows(&table).is_empty());
    }

    #[test]
    fn select_returns_rows_in_request_order() {
        let table = table();
        let mut store = MemoryStore::new();
        store
            .insert(&table, &RowValues::new().with("key", "k1"))
            .unwrap();
        store
            .insert(&table, &RowValues::new().with("key", "k2"))
            .unwrap();

        let rows = store
            .select_by_ids(&table, &[Value::Uint(2), Value::Uint(1)])
            .unwrap();
        assert_eq!(rows[0].get("key"), Some(&Value::Text("k2".to_string())));
        assert_eq!(rows[1].get("key"), Some(&Value::Text("k1".to_string())));
    }
}
