//! Process-local flush counters.
//!
//! Flush logic MUST NOT write these directly; all instrumentation flows
//! through `obs::sink`.

use std::cell::RefCell;

///
/// FlushCounters
///
/// Cumulative per-thread counters for flush activity.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlushCounters {
    pub delete_calls: u64,
    pub load_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,

    pub rows_deleted: u64,
    pub rows_loaded: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,

    pub identity_conflicts: u64,
}

thread_local! {
    static STATE: RefCell<FlushCounters> = RefCell::new(FlushCounters::default());
}

pub(crate) fn with_state_mut<T>(f: impl FnOnce(&mut FlushCounters) -> T) -> T {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Snapshot the current counters for endpoint/test plumbing.
#[must_use]
pub fn report() -> FlushCounters {
    STATE.with(|state| *state.borrow())
}

/// Reset all counters.
pub fn reset() {
    STATE.with(|state| *state.borrow_mut() = FlushCounters::default());
}
