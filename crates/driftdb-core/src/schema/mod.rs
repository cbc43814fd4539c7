mod codec;

pub use codec::{CodecError, PassthroughCodec, SchemaCodec};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// SchemaError
/// Table declaration errors, raised at descriptor construction.
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("\"{table}\" table schema must have an identity column")]
    MissingIdentity { table: String },

    #[error("\"{table}\" table schema declares more than one identity column")]
    MultipleIdentity { table: String },

    #[error("\"{table}\" table schema declares column \"{column}\" more than once")]
    DuplicateColumn { table: String, column: String },
}

///
/// ColumnId
///
/// Dense index of a column within its owning [`TableDescriptor`].
/// Only meaningful for the table that issued it.
///

#[derive(
    Clone, Copy, Debug, Display, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct ColumnId(usize);

impl ColumnId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

///
/// ColumnDescriptor
///
/// Read-only per-column fact: name plus the identity/generated/nullable/
/// collection flags. Declared with the chainable constructors:
///
/// ```text
/// ColumnDescriptor::new("id").identity().generated()
/// ```
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    name: String,
    identity: bool,
    generated: bool,
    nullable: bool,
    collection: bool,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: false,
            generated: false,
            nullable: false,
            collection: false,
        }
    }

    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.identity
    }

    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        self.collection
    }
}

///
/// TableDescriptor
///
/// Read-only relational fact table for one entity: ordered base columns,
/// exactly one of which is the identity column (validated at construction).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
    identity: ColumnId,
}

impl TableDescriptor {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name() == column.name()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: column.name().to_string(),
                });
            }
        }

        let mut identities = columns.iter().enumerate().filter(|(_, c)| c.is_identity());
        let identity = match identities.next() {
            Some((index, _)) => ColumnId::new(index),
            None => return Err(SchemaError::MissingIdentity { table: name }),
        };
        if identities.next().is_some() {
            return Err(SchemaError::MultipleIdentity { table: name });
        }

        Ok(Self {
            name,
            columns,
            identity,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Resolve a column by id.
    ///
    /// Panics if the id was issued by a different table.
    #[must_use]
    pub fn column(&self, id: ColumnId) -> &ColumnDescriptor {
        &self.columns[id.index()]
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        (0..self.columns.len()).map(ColumnId::new)
    }

    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .map(ColumnId::new)
    }

    #[must_use]
    pub const fn identity_id(&self) -> ColumnId {
        self.identity
    }

    #[must_use]
    pub fn identity_column(&self) -> &ColumnDescriptor {
        self.column(self.identity)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id").identity().generated(),
            ColumnDescriptor::new("key"),
            ColumnDescriptor::new("value").nullable(),
            ColumnDescriptor::new("tags").collection(),
        ]
    }

    #[test]
    fn table_resolves_columns_by_name_and_id() {
        let table = TableDescriptor::new("things", columns()).unwrap();
        assert_eq!(table.name(), "things");
        assert_eq!(table.identity_column().name(), "id");
        assert!(table.identity_column().is_generated());

        let key = table.column_named("key").unwrap();
        assert_eq!(table.column(key).name(), "key");
        assert!(table.column_named("missing").is_none());

        let tags = table.column_named("tags").unwrap();
        assert!(table.column(tags).is_collection());
    }

    #[test]
    fn table_requires_exactly_one_identity_column() {
        let err = TableDescriptor::new("things", vec![ColumnDescriptor::new("key")]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingIdentity { .. }));

        let err = TableDescriptor::new(
            "things",
            vec![
                ColumnDescriptor::new("a").identity(),
                ColumnDescriptor::new("b").identity(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::MultipleIdentity { .. }));
    }

    #[test]
    fn table_rejects_duplicate_column_names() {
        let err = TableDescriptor::new(
            "things",
            vec![
                ColumnDescriptor::new("id").identity(),
                ColumnDescriptor::new("key"),
                ColumnDescriptor::new("key"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { column, .. } if column == "key"));
    }
}
