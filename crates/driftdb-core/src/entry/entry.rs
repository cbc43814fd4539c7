use crate::{
    entry::{
        property::{Property, PropertyMut},
        registry::{EntryId, EntryRegistry},
    },
    error::InternalError,
    schema::ColumnId,
    store::RowValues,
};

///
/// Entry
///
/// Read-only view of one change-tracked row: per-column properties plus the
/// composite state derived from them. Queue membership (load/insert/update/
/// delete) is owned by the registry; an entry only queries it.
///

pub struct Entry<'r> {
    pub(crate) registry: &'r EntryRegistry,
    pub(crate) id: EntryId,
}

impl<'r> Entry<'r> {
    #[must_use]
    pub const fn entry_id(&self) -> EntryId {
        self.id
    }

    /// The property for the given column, absent when the column does not
    /// belong to this entry's table.
    #[must_use]
    pub fn property(&self, column: ColumnId) -> Option<Property<'r>> {
        (column.index() < self.registry.table().columns().len()).then(|| Property {
            registry: self.registry,
            entry: self.id,
            column,
        })
    }

    /// The property for the table's identity column.
    #[must_use]
    pub fn id_property(&self) -> Property<'r> {
        Property {
            registry: self.registry,
            entry: self.id,
            column: self.registry.table().identity_id(),
        }
    }

    /// Any property touched.
    #[must_use]
    pub fn active(&self) -> bool {
        self.registry.entry_active(self.id)
    }

    /// Any property confirmed persisted.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.registry.entry_initialized(self.id)
    }

    /// Any property diverging from its last known-persisted value.
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.registry.entry_dirty(self.id)
    }

    /// Queued for loading (either preload or reload).
    #[must_use]
    pub fn load(&self) -> bool {
        self.registry.has_load(self.id)
    }

    #[must_use]
    pub fn preload(&self) -> bool {
        self.registry.entry_preload(self.id)
    }

    #[must_use]
    pub fn reload(&self) -> bool {
        self.registry.entry_reload(self.id)
    }

    #[must_use]
    pub fn delete(&self) -> bool {
        self.registry.has_delete(self.id)
    }

    /// Insert-queue membership; a side effect of dirty transitions, never set
    /// directly.
    #[must_use]
    pub fn insert(&self) -> bool {
        self.registry.has_insert(self.id)
    }

    /// Update-queue membership; a side effect of dirty transitions, never set
    /// directly.
    #[must_use]
    pub fn update(&self) -> bool {
        self.registry.has_update(self.id)
    }

    /// Composite raw view over the active properties.
    #[must_use]
    pub fn raw(&self) -> RowValues {
        self.registry.entry_raw(self.id)
    }

    /// Composite raw view filtered to active and dirty properties: the exact
    /// payload handed to an insert/update execution.
    #[must_use]
    pub fn dirty_raw(&self) -> RowValues {
        self.registry.entry_dirty_raw(self.id)
    }

    /// Composite decoded view over the active properties.
    pub fn value(&self) -> Result<RowValues, InternalError> {
        self.registry.entry_value(self.id)
    }

    /// Decode the full raw composite into an entity value, for handoff once
    /// the entry is confirmed persisted.
    pub fn new_entity(&self) -> Result<RowValues, InternalError> {
        self.registry.entry_value(self.id)
    }

    /// Write each active property's decoded value onto the matching field of
    /// a caller-owned mapping, leaving other fields untouched.
    pub fn hydrate(&self, target: &mut RowValues) -> Result<(), InternalError> {
        for (column, value) in self.registry.entry_value(self.id)? {
            target.set(column, value);
        }
        Ok(())
    }
}

///
/// EntryMut
///
/// Mutable view of one change-tracked row. Intent setters route through the
/// registry's queues; composite setters fan out to the per-column property
/// setters.
///

pub struct EntryMut<'r> {
    pub(crate) registry: &'r mut EntryRegistry,
    pub(crate) id: EntryId,
}

impl EntryMut<'_> {
    #[must_use]
    pub const fn entry_id(&self) -> EntryId {
        self.id
    }

    /// Read-only view of the same entry.
    #[must_use]
    pub fn as_view(&self) -> Entry<'_> {
        Entry {
            registry: &*self.registry,
            id: self.id,
        }
    }

    #[must_use]
    pub fn property_mut(&mut self, column: ColumnId) -> Option<PropertyMut<'_>> {
        if column.index() >= self.registry.table().columns().len() {
            return None;
        }
        Some(PropertyMut {
            registry: &mut *self.registry,
            entry: self.id,
            column,
        })
    }

    #[must_use]
    pub fn id_property_mut(&mut self) -> PropertyMut<'_> {
        let column = self.registry.table().identity_id();
        PropertyMut {
            registry: &mut *self.registry,
            entry: self.id,
            column,
        }
    }

    /// Set the initialized flag on every active property.
    pub fn set_initialized(&mut self, value: bool) {
        self.registry.set_entry_initialized(self.id, value);
    }

    /// Set the dirty flag on every active property.
    pub fn set_dirty(&mut self, value: bool) {
        self.registry.set_entry_dirty(self.id, value);
    }

    /// Queue for load-without-overwrite. `preload` and `reload` are views
    /// over one (queued, refresh) pair: setting either true enqueues and
    /// takes over the refresh flag; setting either false dequeues entirely.
    pub fn set_preload(&mut self, value: bool) {
        self.registry.set_preload(self.id, value);
    }

    /// Queue for load-with-overwrite. See [`Self::set_preload`].
    pub fn set_reload(&mut self, value: bool) {
        self.registry.set_reload(self.id, value);
    }

    /// Delete intent, independent of load and dirty state.
    pub fn set_delete(&mut self, value: bool) {
        self.registry.set_delete(self.id, value);
    }

    /// Forward each present key to the matching property's raw setter.
    pub fn set_raw(&mut self, values: &RowValues) -> Result<(), InternalError> {
        self.registry.set_entry_raw(self.id, values)
    }

    /// For every column present in the mapping: set the property's raw value,
    /// then invoke `post` on the property. Used by the processor to mark
    /// properties initialized and clean after a store round-trip.
    pub fn apply_raw(
        &mut self,
        values: &RowValues,
        mut post: impl FnMut(&mut PropertyMut<'_>),
    ) -> Result<(), InternalError> {
        for column in self.registry.columns_present(values) {
            let value = values.get(self.registry.table().column(column).name()).cloned();
            self.registry.set_property_raw(self.id, column, value)?;
            let mut property = PropertyMut {
                registry: &mut *self.registry,
                entry: self.id,
                column,
            };
            post(&mut property);
        }
        Ok(())
    }

    /// Forward each present key through the matching property's decoded
    /// setter.
    pub fn set_value(&mut self, values: &RowValues) -> Result<(), InternalError> {
        self.registry.set_entry_value(self.id, values)
    }
}
