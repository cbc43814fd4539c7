//! Core runtime for DriftDB: the storage-native value model, schema
//! descriptors and codec boundary, the change-tracked entry state machine
//! with its per-table unit-of-work registry, the flush processor, and the
//! transactional store contract it drains into.
#![warn(unreachable_pub)]

pub mod entry;
pub mod error;
pub mod obs;
pub mod schema;
pub mod store;
pub mod value;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No internal helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        entry::{Entry, EntryId, EntryMut, EntryProcessor, EntryRegistry, Property, PropertyMut},
        schema::{
            ColumnDescriptor, ColumnId, PassthroughCodec, SchemaCodec, TableDescriptor,
        },
        store::{ExecutionContext, MemoryStore, RowValues},
        value::{Float64, Value},
    };
}
