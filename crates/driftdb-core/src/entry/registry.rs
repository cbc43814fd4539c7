use crate::{
    entry::{Entry, EntryMut},
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    schema::{ColumnId, SchemaCodec, TableDescriptor},
    store::RowValues,
    value::Value,
};
use derive_more::Display;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

///
/// EntryId
///
/// Arena handle for one entry within its owning [`EntryRegistry`]. Only
/// meaningful for the unit of work that issued it; `clear()` invalidates all
/// outstanding ids.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntryId(usize);

impl EntryId {
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

///
/// PropertyState
/// Change-tracking state for one column of one entry.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct PropertyState {
    pub(crate) data: Option<Value>,
    pub(crate) active: bool,
    pub(crate) initialized: bool,
    pub(crate) dirty: bool,
}

impl PropertyState {
    /// Raw value usable as a store key: present and non-null.
    pub(crate) fn usable_identity(&self) -> Option<&Value> {
        self.data.as_ref().filter(|raw| !raw.is_null())
    }
}

///
/// EntryState
///

#[derive(Debug)]
pub(crate) struct EntryState {
    pub(crate) properties: Vec<PropertyState>,
    /// Refresh sub-flag of the load intent: false = preload, true = reload.
    pub(crate) refresh: bool,
    /// Current identity-index binding, kept bijective with `identity`.
    identity_key: Option<Value>,
}

///
/// IntentQueue
/// Insertion-ordered membership set for one flush intent.
///

#[derive(Debug, Default)]
struct IntentQueue {
    order: Vec<EntryId>,
    members: HashSet<EntryId>,
}

impl IntentQueue {
    fn insert(&mut self, entry: EntryId) {
        if self.members.insert(entry) {
            self.order.push(entry);
        }
    }

    fn remove(&mut self, entry: EntryId) {
        if self.members.remove(&entry) {
            self.order.retain(|e| *e != entry);
        }
    }

    fn contains(&self, entry: EntryId) -> bool {
        self.members.contains(&entry)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn snapshot(&self) -> Vec<EntryId> {
        self.order.clone()
    }
}

///
/// EntryRegistry
///
/// Per-table unit of work: owns every entry created within it, indexes
/// entries by decoded identity value, and maintains the four intent queues
/// (load, insert, update, delete) that one flush drains.
///
/// Insert and update membership are mutually exclusive; registering into one
/// evicts from the other. Delete and load intent are orthogonal flags.
///
/// The registry is the lifetime owner of entry state. Callers hold [`EntryId`]
/// handles and borrow [`Entry`]/[`EntryMut`] views through it.
///

pub struct EntryRegistry {
    table: Arc<TableDescriptor>,
    codec: Arc<dyn SchemaCodec>,
    entries: Vec<EntryState>,
    identity: HashMap<Value, EntryId>,
    load: IntentQueue,
    insert: IntentQueue,
    update: IntentQueue,
    delete: IntentQueue,
}

impl EntryRegistry {
    #[must_use]
    pub fn new(table: Arc<TableDescriptor>, codec: Arc<dyn SchemaCodec>) -> Self {
        Self {
            table,
            codec,
            entries: Vec::new(),
            identity: HashMap::new(),
            load: IntentQueue::default(),
            insert: IntentQueue::default(),
            update: IntentQueue::default(),
            delete: IntentQueue::default(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    pub(crate) fn table_arc(&self) -> Arc<TableDescriptor> {
        Arc::clone(&self.table)
    }

    /// Create a fresh entry: all properties inactive, no queue membership.
    pub fn create(&mut self) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(EntryState {
            properties: vec![PropertyState::default(); self.table.columns().len()],
            refresh: false,
            identity_key: None,
        });
        id
    }

    /// Borrow a read-only view of one entry.
    ///
    /// Panics if the id does not belong to this registry's current unit of
    /// work.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> Entry<'_> {
        assert!(id.index() < self.entries.len(), "unknown entry id: {id}");
        Entry { registry: self, id }
    }

    /// Borrow a mutable view of one entry.
    ///
    /// Panics if the id does not belong to this registry's current unit of
    /// work.
    #[must_use]
    pub fn entry_mut(&mut self, id: EntryId) -> EntryMut<'_> {
        assert!(id.index() < self.entries.len(), "unknown entry id: {id}");
        EntryMut { registry: self, id }
    }

    /// Empty everything: entry arena, identity index, and all four queues.
    /// Outstanding [`EntryId`]s are invalidated.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.identity.clear();
        self.clear_load();
        self.clear_insert();
        self.clear_update();
        self.clear_delete();
    }

    // ======================================================================
    // Identity index
    // ======================================================================

    /// Bind the entry's decoded identity value in the identity index.
    ///
    /// An unset or null identity is a no-op. Rebinding the same entry under a
    /// new value releases the old binding; binding a value already held by a
    /// *different* entry fails with a duplicate-identity conflict.
    pub fn register(&mut self, entry: EntryId) -> Result<(), InternalError> {
        let identity = self.table.identity_id();
        let Some(raw) = self.entries[entry.index()].properties[identity.index()]
            .data
            .clone()
        else {
            return Ok(());
        };

        let key = self.codec.decode(&raw, self.table.identity_column())?;
        if key.is_null() {
            return Ok(());
        }

        if let Some(&bound) = self.identity.get(&key) {
            if bound != entry {
                sink::record(MetricsEvent::IdentityConflict);
                return Err(InternalError::duplicate_identity(
                    self.table.identity_column().name(),
                    &key,
                ));
            }
            return Ok(());
        }

        if let Some(previous) = self.entries[entry.index()].identity_key.take() {
            self.identity.remove(&previous);
        }
        self.identity.insert(key.clone(), entry);
        self.entries[entry.index()].identity_key = Some(key);

        Ok(())
    }

    /// Release the entry's identity binding, if any.
    pub fn unregister(&mut self, entry: EntryId) {
        if let Some(key) = self.entries[entry.index()].identity_key.take() {
            self.identity.remove(&key);
        }
    }

    /// Look up an entry by decoded identity value.
    #[must_use]
    pub fn find_by_id(&self, id: &Value) -> Option<EntryId> {
        self.identity.get(id).copied()
    }

    /// Iterate the identity-indexed entries.
    pub fn registered(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.identity.values().copied()
    }

    // ======================================================================
    // Intent queues
    // ======================================================================

    pub fn has_load(&self, entry: EntryId) -> bool {
        self.load.contains(entry)
    }

    pub fn register_load(&mut self, entry: EntryId) {
        self.load.insert(entry);
    }

    pub fn unregister_load(&mut self, entry: EntryId) {
        self.load.remove(entry);
    }

    #[must_use]
    pub fn load_queue(&self) -> Vec<EntryId> {
        self.load.snapshot()
    }

    pub fn clear_load(&mut self) {
        self.load.clear();
    }

    pub fn has_insert(&self, entry: EntryId) -> bool {
        self.insert.contains(entry)
    }

    pub fn register_insert(&mut self, entry: EntryId) {
        self.update.remove(entry);
        self.insert.insert(entry);
    }

    pub fn unregister_insert(&mut self, entry: EntryId) {
        self.insert.remove(entry);
    }

    #[must_use]
    pub fn insert_queue(&self) -> Vec<EntryId> {
        self.insert.snapshot()
    }

    pub fn clear_insert(&mut self) {
        self.insert.clear();
    }

    pub fn has_update(&self, entry: EntryId) -> bool {
        self.update.contains(entry)
    }

    pub fn register_update(&mut self, entry: EntryId) {
        self.insert.remove(entry);
        self.update.insert(entry);
    }

    pub fn unregister_update(&mut self, entry: EntryId) {
        self.update.remove(entry);
    }

    #[must_use]
    pub fn update_queue(&self) -> Vec<EntryId> {
        self.update.snapshot()
    }

    pub fn clear_update(&mut self) {
        self.update.clear();
    }

    pub fn has_delete(&self, entry: EntryId) -> bool {
        self.delete.contains(entry)
    }

    pub fn register_delete(&mut self, entry: EntryId) {
        self.delete.insert(entry);
    }

    pub fn unregister_delete(&mut self, entry: EntryId) {
        self.delete.remove(entry);
    }

    #[must_use]
    pub fn delete_queue(&self) -> Vec<EntryId> {
        self.delete.snapshot()
    }

    pub fn clear_delete(&mut self) {
        self.delete.clear();
    }

    // ======================================================================
    // Property state (internal; exposed through the handle types)
    // ======================================================================

    pub(crate) fn property_state(&self, entry: EntryId, column: ColumnId) -> &PropertyState {
        &self.entries[entry.index()].properties[column.index()]
    }

    fn property_state_mut(&mut self, entry: EntryId, column: ColumnId) -> &mut PropertyState {
        &mut self.entries[entry.index()].properties[column.index()]
    }

    pub(crate) fn activate_property(&mut self, entry: EntryId, column: ColumnId) {
        self.property_state_mut(entry, column).active = true;
    }

    pub(crate) fn set_property_initialized(
        &mut self,
        entry: EntryId,
        column: ColumnId,
        value: bool,
    ) {
        let prop = self.property_state_mut(entry, column);
        prop.active = true;
        prop.initialized = value;
        self.sync(entry);
    }

    pub(crate) fn set_property_dirty(&mut self, entry: EntryId, column: ColumnId, value: bool) {
        let prop = self.property_state_mut(entry, column);
        prop.active = true;
        prop.dirty = value;
        self.sync(entry);
    }

    pub(crate) fn set_property_raw(
        &mut self,
        entry: EntryId,
        column: ColumnId,
        value: Option<Value>,
    ) -> Result<(), InternalError> {
        let prop = self.property_state_mut(entry, column);
        let dirty = prop.dirty || prop.data != value;
        prop.data = value;
        self.set_property_dirty(entry, column, dirty);

        if self.table.column(column).is_identity() {
            self.register(entry)?;
        }

        Ok(())
    }

    pub(crate) fn property_value(
        &self,
        entry: EntryId,
        column: ColumnId,
    ) -> Result<Value, InternalError> {
        let raw = self
            .property_state(entry, column)
            .data
            .clone()
            .unwrap_or(Value::Null);
        Ok(self.codec.decode(&raw, self.table.column(column))?)
    }

    pub(crate) fn set_property_value(
        &mut self,
        entry: EntryId,
        column: ColumnId,
        value: &Value,
    ) -> Result<(), InternalError> {
        self.activate_property(entry, column);
        let raw = self.codec.encode(value, self.table.column(column))?;
        self.set_property_raw(entry, column, Some(raw))
    }

    pub(crate) fn decode_raw(
        &self,
        column: ColumnId,
        raw: &Value,
    ) -> Result<Value, InternalError> {
        Ok(self.codec.decode(raw, self.table.column(column))?)
    }

    /// Re-evaluate the entry's write intent after a property flag change.
    ///
    /// Decided on the entry's aggregate state: dirty entries register into
    /// update (initialized) or insert (not yet initialized); clean entries
    /// leave both queues.
    fn sync(&mut self, entry: EntryId) {
        let state = &self.entries[entry.index()];
        let dirty = state.properties.iter().any(|p| p.dirty);
        if dirty {
            let initialized = state.properties.iter().any(|p| p.initialized);
            if initialized {
                self.register_update(entry);
            } else {
                self.register_insert(entry);
            }
        } else {
            self.unregister_insert(entry);
            self.unregister_update(entry);
        }
    }

    // ======================================================================
    // Entry state (internal; exposed through the handle types)
    // ======================================================================

    pub(crate) fn entry_active(&self, entry: EntryId) -> bool {
        self.entries[entry.index()].properties.iter().any(|p| p.active)
    }

    pub(crate) fn entry_initialized(&self, entry: EntryId) -> bool {
        self.entries[entry.index()]
            .properties
            .iter()
            .any(|p| p.initialized)
    }

    pub(crate) fn entry_dirty(&self, entry: EntryId) -> bool {
        self.entries[entry.index()].properties.iter().any(|p| p.dirty)
    }

    fn active_columns(&self, entry: EntryId) -> Vec<ColumnId> {
        self.entries[entry.index()]
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .map(|(index, _)| ColumnId::new(index))
            .collect()
    }

    /// Set the initialized flag on every *active* property.
    /// A no-op on an entry with no active properties.
    pub(crate) fn set_entry_initialized(&mut self, entry: EntryId, value: bool) {
        for column in self.active_columns(entry) {
            self.set_property_initialized(entry, column, value);
        }
    }

    /// Set the dirty flag on every *active* property.
    /// A no-op on an entry with no active properties.
    pub(crate) fn set_entry_dirty(&mut self, entry: EntryId, value: bool) {
        for column in self.active_columns(entry) {
            self.set_property_dirty(entry, column, value);
        }
    }

    pub(crate) fn entry_preload(&self, entry: EntryId) -> bool {
        self.has_load(entry) && !self.entries[entry.index()].refresh
    }

    pub(crate) fn entry_reload(&self, entry: EntryId) -> bool {
        self.has_load(entry) && self.entries[entry.index()].refresh
    }

    pub(crate) fn set_preload(&mut self, entry: EntryId, value: bool) {
        if value {
            self.register_load(entry);
            self.entries[entry.index()].refresh = false;
        } else {
            self.unregister_load(entry);
        }
    }

    pub(crate) fn set_reload(&mut self, entry: EntryId, value: bool) {
        if value {
            self.register_load(entry);
            self.entries[entry.index()].refresh = true;
        } else {
            self.unregister_load(entry);
        }
    }

    pub(crate) fn set_delete(&mut self, entry: EntryId, value: bool) {
        if value {
            self.register_delete(entry);
        } else {
            self.unregister_delete(entry);
        }
    }

    /// Composite raw view: every active property carrying a value.
    pub(crate) fn entry_raw(&self, entry: EntryId) -> RowValues {
        let mut row = RowValues::new();
        for (index, prop) in self.entries[entry.index()].properties.iter().enumerate() {
            if !prop.active {
                continue;
            }
            if let Some(data) = &prop.data {
                row.set(self.table.column(ColumnId::new(index)).name(), data.clone());
            }
        }
        row
    }

    /// Composite raw view filtered to dirty properties: the exact payload for
    /// an insert or update execution.
    pub(crate) fn entry_dirty_raw(&self, entry: EntryId) -> RowValues {
        let mut row = RowValues::new();
        for (index, prop) in self.entries[entry.index()].properties.iter().enumerate() {
            if !prop.active || !prop.dirty {
                continue;
            }
            if let Some(data) = &prop.data {
                row.set(self.table.column(ColumnId::new(index)).name(), data.clone());
            }
        }
        row
    }

    /// Forward each present key to the matching property's raw setter,
    /// leaving absent properties untouched.
    pub(crate) fn set_entry_raw(
        &mut self,
        entry: EntryId,
        values: &RowValues,
    ) -> Result<(), InternalError> {
        for column in self.columns_present(values) {
            let value = values.get(self.table.column(column).name()).cloned();
            self.set_property_raw(entry, column, value)?;
        }
        Ok(())
    }

    /// Composite decoded view of every active property carrying a value.
    pub(crate) fn entry_value(&self, entry: EntryId) -> Result<RowValues, InternalError> {
        let mut row = RowValues::new();
        for (index, prop) in self.entries[entry.index()].properties.iter().enumerate() {
            if !prop.active {
                continue;
            }
            if let Some(data) = &prop.data {
                let column = ColumnId::new(index);
                row.set(
                    self.table.column(column).name(),
                    self.codec.decode(data, self.table.column(column))?,
                );
            }
        }
        Ok(row)
    }

    /// Forward each present key through the matching property's decoded
    /// setter.
    pub(crate) fn set_entry_value(
        &mut self,
        entry: EntryId,
        values: &RowValues,
    ) -> Result<(), InternalError> {
        for column in self.columns_present(values) {
            let value = values
                .get(self.table.column(column).name())
                .cloned()
                .unwrap_or(Value::Null);
            self.set_property_value(entry, column, &value)?;
        }
        Ok(())
    }

    /// Table columns present in the given mapping, in declaration order.
    pub(crate) fn columns_present(&self, values: &RowValues) -> Vec<ColumnId> {
        self.table
            .column_ids()
            .filter(|&column| values.contains_key(self.table.column(column).name()))
            .collect()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, PassthroughCodec};

    fn registry() -> EntryRegistry {
        let table = TableDescriptor::new(
            "things",
            vec![
                ColumnDescriptor::new("id").identity(),
                ColumnDescriptor::new("key"),
            ],
        )
        .unwrap();
        EntryRegistry::new(Arc::new(table), Arc::new(PassthroughCodec))
    }

    #[test]
    fn insert_and_update_queues_are_mutually_exclusive() {
        let mut registry = registry();
        let entry = registry.create();

        registry.register_insert(entry);
        assert!(registry.has_insert(entry));
        assert!(!registry.has_update(entry));

        registry.register_update(entry);
        assert!(!registry.has_insert(entry));
        assert!(registry.has_update(entry));

        registry.register_insert(entry);
        assert!(registry.has_insert(entry));
        assert!(!registry.has_update(entry));
    }

    #[test]
    fn queue_snapshots_preserve_insertion_order() {
        let mut registry = registry();
        let a = registry.create();
        let b = registry.create();
        let c = registry.create();

        registry.register_insert(b);
        registry.register_insert(a);
        registry.register_insert(c);
        registry.register_insert(b); // re-registration keeps original position
        assert_eq!(registry.insert_queue(), vec![b, a, c]);

        registry.unregister_insert(a);
        assert_eq!(registry.insert_queue(), vec![b, c]);
    }

    #[test]
    fn register_rejects_duplicate_identity_across_entries() {
        let mut registry = registry();
        let id = registry.table().identity_id();

        let first = registry.create();
        registry
            .set_property_raw(first, id, Some(Value::Uint(1)))
            .unwrap();

        // re-registering the same entry under the same value is a no-op
        registry.register(first).unwrap();
        assert_eq!(registry.find_by_id(&Value::Uint(1)), Some(first));

        let second = registry.create();
        let err = registry
            .set_property_raw(second, id, Some(Value::Uint(1)))
            .unwrap_err();
        assert!(err.is_duplicate_identity());
    }

    #[test]
    fn register_rebinds_an_entry_under_a_new_identity() {
        let mut registry = registry();
        let id = registry.table().identity_id();

        let entry = registry.create();
        registry
            .set_property_raw(entry, id, Some(Value::Uint(1)))
            .unwrap();
        registry
            .set_property_raw(entry, id, Some(Value::Uint(2)))
            .unwrap();

        assert_eq!(registry.find_by_id(&Value::Uint(1)), None);
        assert_eq!(registry.find_by_id(&Value::Uint(2)), Some(entry));
    }

    #[test]
    fn register_skips_unset_and_null_identities() {
        let mut registry = registry();
        let id = registry.table().identity_id();

        let entry = registry.create();
        registry.register(entry).unwrap();
        registry
            .set_property_raw(entry, id, Some(Value::Null))
            .unwrap();
        assert_eq!(registry.registered().count(), 0);
    }

    #[test]
    fn unregister_releases_the_identity_binding() {
        let mut registry = registry();
        let id = registry.table().identity_id();

        let entry = registry.create();
        registry
            .set_property_raw(entry, id, Some(Value::Uint(5)))
            .unwrap();
        registry.unregister(entry);
        assert_eq!(registry.find_by_id(&Value::Uint(5)), None);

        // the value is free for another entry now
        let other = registry.create();
        registry
            .set_property_raw(other, id, Some(Value::Uint(5)))
            .unwrap();
        assert_eq!(registry.find_by_id(&Value::Uint(5)), Some(other));
    }

    #[test]
    fn clear_empties_index_and_queues() {
        let mut registry = registry();
        let id = registry.table().identity_id();

        let entry = registry.create();
        registry
            .set_property_raw(entry, id, Some(Value::Uint(1)))
            .unwrap();
        registry.register_load(entry);
        registry.register_delete(entry);

        registry.clear();
        assert_eq!(registry.find_by_id(&Value::Uint(1)), None);
        assert!(registry.load_queue().is_empty());
        assert!(registry.insert_queue().is_empty());
        assert!(registry.update_queue().is_empty());
        assert!(registry.delete_queue().is_empty());
    }
}
