use crate::{
    entry::registry::{EntryId, EntryRegistry},
    error::InternalError,
    obs::sink::{FlushKind, FlushSpan},
    schema::TableDescriptor,
    store::{ExecutionContext, RowValues},
    value::Value,
};
use std::sync::Arc;

///
/// EntryProcessor
///
/// The flush state machine: drains one registry's intent queues against one
/// transactional execution context, in fixed referential order —
///
///   delete → resolve-missing-ids → load → insert → update
///
/// Each phase runs exactly once per `run()`. A store failure aborts the
/// remaining phases; the caller owns transaction rollback. The processor
/// retains no state across invocations — a second `run()` repeats the cycle
/// over whatever intent remains, and with drained queues it performs no
/// store operations at all.
///

pub struct EntryProcessor<'a, X: ExecutionContext> {
    context: &'a mut X,
    registry: &'a mut EntryRegistry,
    table: Arc<TableDescriptor>,
}

impl<'a, X: ExecutionContext> EntryProcessor<'a, X> {
    #[must_use]
    pub fn new(context: &'a mut X, registry: &'a mut EntryRegistry) -> Self {
        let table = registry.table_arc();
        Self {
            context,
            registry,
            table,
        }
    }

    pub fn run(&mut self) -> Result<(), InternalError> {
        self.flush_delete()?;

        self.resolve_generated_identities();
        self.flush_load()?;
        self.flush_insert()?;
        self.flush_update()
    }

    // ======================================================================
    // Delete phase
    // ======================================================================

    /// Bulk-delete every queued entry with a usable identity, then reset the
    /// survivors to pristine. The queue is cleared unconditionally: entries
    /// without a usable identity are dropped without a store round-trip —
    /// there is nothing to delete.
    fn flush_delete(&mut self) -> Result<(), InternalError> {
        let identity = self.table.identity_id();
        let targets: Vec<(EntryId, Value)> = self
            .registry
            .delete_queue()
            .into_iter()
            .filter_map(|entry| {
                let prop = self.registry.property_state(entry, identity);
                if !prop.active {
                    return None;
                }
                prop.usable_identity().map(|raw| (entry, raw.clone()))
            })
            .collect();

        if !targets.is_empty() {
            let ids: Vec<Value> = targets.iter().map(|(_, id)| id.clone()).collect();

            let mut span = FlushSpan::new(FlushKind::Delete);
            let rows = self.context.delete_by_ids(&self.table, &ids)?;
            span.set_rows(rows.len() as u64);
            drop(span);

            for (entry, _) in targets {
                self.registry.set_delete(entry, false);
                self.registry.set_entry_initialized(entry, false);
                self.registry.set_preload(entry, false);
                self.registry.set_reload(entry, false);
                self.registry.set_entry_dirty(entry, false);
            }
        }

        self.registry.clear_delete();
        Ok(())
    }

    // ======================================================================
    // Resolve-missing-ids phase
    // ======================================================================

    /// A generated-identity entry that already carries an identity value was
    /// not created by this unit of work: round-trip it through the load phase
    /// to confirm it pre-exists before inserting blindly.
    fn resolve_generated_identities(&mut self) {
        if !self.table.identity_column().is_generated() {
            return;
        }

        let identity = self.table.identity_id();
        let candidates: Vec<EntryId> = self
            .registry
            .insert_queue()
            .into_iter()
            .filter(|&entry| {
                self.registry
                    .property_state(entry, identity)
                    .usable_identity()
                    .is_some()
                    && !self.registry.has_load(entry)
            })
            .collect();

        for entry in candidates {
            self.registry.set_preload(entry, true);
        }
    }

    // ======================================================================
    // Load phase
    // ======================================================================

    fn flush_load(&mut self) -> Result<(), InternalError> {
        let queue = self.registry.load_queue();
        if queue.is_empty() {
            return Ok(());
        }

        let identity = self.table.identity_id();
        let ids: Vec<Value> = queue
            .iter()
            .filter_map(|&entry| {
                self.registry
                    .property_state(entry, identity)
                    .usable_identity()
                    .cloned()
            })
            .collect();

        let mut span = FlushSpan::new(FlushKind::Load);
        let rows = self.context.select_by_ids(&self.table, &ids)?;
        span.set_rows(rows.len() as u64);
        drop(span);

        for row in rows {
            let id = self.decode_row_identity(&row)?;
            let entry = match self.registry.find_by_id(&id) {
                Some(entry) => entry,
                None => self.registry.create(),
            };

            let captured = self.registry.entry_raw(entry);
            let preload = self.registry.entry_preload(entry);

            self.apply_row(entry, &row)?;
            if preload {
                // restore caller-set values clobbered by the load
                self.registry.set_entry_raw(entry, &captured)?;
            }
            self.registry.set_preload(entry, false);
            self.registry.set_reload(entry, false);
        }

        self.registry.clear_load();
        Ok(())
    }

    fn decode_row_identity(&self, row: &RowValues) -> Result<Value, InternalError> {
        let identity = self.table.identity_id();
        let decoded = match row.get(self.table.identity_column().name()) {
            Some(raw) if !raw.is_null() => self.registry.decode_raw(identity, raw)?,
            _ => Value::Null,
        };
        if decoded.is_null() {
            return Err(InternalError::executor_corruption(
                "row returned from store is missing its identity value",
            ));
        }
        Ok(decoded)
    }

    // ======================================================================
    // Insert phase
    // ======================================================================

    fn flush_insert(&mut self) -> Result<(), InternalError> {
        let queue = self.registry.insert_queue();
        if queue.is_empty() {
            return Ok(());
        }

        let mut span = FlushSpan::new(FlushKind::Insert);
        let mut applied = 0u64;

        // One entry at a time: a store-generated identity must be observed
        // before dependent logic for the next entry can proceed.
        for entry in queue {
            let payload = self.registry.entry_dirty_raw(entry);
            let returned = self.context.insert(&self.table, &payload)?;
            let Some(row) = returned.into_iter().next() else {
                return Err(InternalError::executor_internal(
                    "cannot get insert result from store",
                ));
            };

            self.apply_row(entry, &row)?;
            self.registry.set_preload(entry, false);
            self.registry.set_reload(entry, false);
            applied += 1;
        }

        span.set_rows(applied);
        self.registry.clear_insert();
        Ok(())
    }

    // ======================================================================
    // Update phase
    // ======================================================================

    fn flush_update(&mut self) -> Result<(), InternalError> {
        let queue = self.registry.update_queue();
        if queue.is_empty() {
            return Ok(());
        }

        let identity = self.table.identity_id();
        let mut span = FlushSpan::new(FlushKind::Update);
        let mut applied = 0u64;

        for entry in queue {
            let Some(id) = self
                .registry
                .property_state(entry, identity)
                .usable_identity()
                .cloned()
            else {
                return Err(InternalError::executor_invariant(
                    "update queued without a usable identity value",
                ));
            };

            let payload = self.registry.entry_dirty_raw(entry);
            let returned = self.context.update(&self.table, &id, &payload)?;
            let Some(row) = returned.into_iter().next() else {
                return Err(InternalError::executor_internal(
                    "cannot get update result from store",
                ));
            };

            self.apply_row(entry, &row)?;
            self.registry.set_preload(entry, false);
            self.registry.set_reload(entry, false);
            applied += 1;
        }

        span.set_rows(applied);
        self.registry.clear_update();
        Ok(())
    }

    // ======================================================================
    // Shared reconciliation
    // ======================================================================

    /// Apply a store row onto an entry, marking every touched property as
    /// confirmed persisted and clean.
    fn apply_row(&mut self, entry: EntryId, row: &RowValues) -> Result<(), InternalError> {
        self.registry.entry_mut(entry).apply_raw(row, |property| {
            property.set_initialized(true);
            property.set_dirty(false);
        })
    }
}
