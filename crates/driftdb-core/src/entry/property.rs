use crate::{
    entry::registry::{EntryId, EntryRegistry},
    error::InternalError,
    schema::{ColumnDescriptor, ColumnId},
    value::Value,
};

///
/// Property
///
/// Read-only view of one column's change-tracking state within an entry:
/// the raw stored value plus the activation, initialization, and dirtiness
/// flags.
///

pub struct Property<'r> {
    pub(crate) registry: &'r EntryRegistry,
    pub(crate) entry: EntryId,
    pub(crate) column: ColumnId,
}

impl Property<'_> {
    #[must_use]
    pub fn column(&self) -> &ColumnDescriptor {
        self.registry.table().column(self.column)
    }

    /// Has this property ever been read, written, or explicitly activated?
    #[must_use]
    pub fn active(&self) -> bool {
        self.registry.property_state(self.entry, self.column).active
    }

    /// Has this property's value been confirmed as persisted?
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.registry
            .property_state(self.entry, self.column)
            .initialized
    }

    /// Does the in-memory value differ from the last known-persisted value?
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.registry.property_state(self.entry, self.column).dirty
    }

    /// Last known storage-native value; `None` when never written.
    #[must_use]
    pub fn raw(&self) -> Option<&Value> {
        self.registry
            .property_state(self.entry, self.column)
            .data
            .as_ref()
    }

    /// Decoded view of the raw value (an unset slot decodes as `Null`).
    pub fn value(&self) -> Result<Value, InternalError> {
        self.registry.property_value(self.entry, self.column)
    }
}

///
/// PropertyMut
///
/// Mutable view of one column's change-tracking state. Every mutator keeps
/// the owning entry's queue membership in sync:
///
/// - setting `dirty` or `initialized` forces `active = true`, then
///   re-evaluates the entry's insert/update intent on its aggregate state;
/// - writing a raw value marks the property dirty iff the value changed
///   (writing an identical value never clears an existing dirty flag), and
///   identity-column writes register the entry in the identity index.
///

pub struct PropertyMut<'r> {
    pub(crate) registry: &'r mut EntryRegistry,
    pub(crate) entry: EntryId,
    pub(crate) column: ColumnId,
}

impl PropertyMut<'_> {
    #[must_use]
    pub fn column(&self) -> &ColumnDescriptor {
        self.registry.table().column(self.column)
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.registry.property_state(self.entry, self.column).active
    }

    #[must_use]
    pub fn initialized(&self) -> bool {
        self.registry
            .property_state(self.entry, self.column)
            .initialized
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        self.registry.property_state(self.entry, self.column).dirty
    }

    #[must_use]
    pub fn raw(&self) -> Option<&Value> {
        self.registry
            .property_state(self.entry, self.column)
            .data
            .as_ref()
    }

    pub fn value(&self) -> Result<Value, InternalError> {
        self.registry.property_value(self.entry, self.column)
    }

    /// Mark the property as touched. Idempotent; activation never reverts
    /// within the entry's lifetime.
    pub fn activate(&mut self) {
        self.registry.activate_property(self.entry, self.column);
    }

    pub fn set_initialized(&mut self, value: bool) {
        self.registry
            .set_property_initialized(self.entry, self.column, value);
    }

    pub fn set_dirty(&mut self, value: bool) {
        self.registry
            .set_property_dirty(self.entry, self.column, value);
    }

    /// Write the raw storage-native value.
    ///
    /// Fails with a duplicate-identity conflict when this is the identity
    /// column and the decoded value is already bound to a different entry.
    pub fn set_raw(&mut self, value: Option<Value>) -> Result<(), InternalError> {
        self.registry.set_property_raw(self.entry, self.column, value)
    }

    /// Write through the decoded view: activates, encodes, then sets raw.
    pub fn set_value(&mut self, value: &Value) -> Result<(), InternalError> {
        self.registry
            .set_property_value(self.entry, self.column, value)
    }
}
