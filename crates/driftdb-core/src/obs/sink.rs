//! Metrics sink boundary.
//!
//! Flush logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the counter state.

use crate::obs::metrics;
use std::cell::Cell;

thread_local! {
    static SINK_OVERRIDE: Cell<Option<&'static dyn MetricsSink>> = const { Cell::new(None) };
}

///
/// FlushKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlushKind {
    Delete,
    Load,
    Insert,
    Update,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    FlushStart { kind: FlushKind },
    FlushFinish { kind: FlushKind, rows: u64 },
    IdentityConflict,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into the counter state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::FlushStart { kind } => {
                metrics::with_state_mut(|m| match kind {
                    FlushKind::Delete => m.delete_calls = m.delete_calls.saturating_add(1),
                    FlushKind::Load => m.load_calls = m.load_calls.saturating_add(1),
                    FlushKind::Insert => m.insert_calls = m.insert_calls.saturating_add(1),
                    FlushKind::Update => m.update_calls = m.update_calls.saturating_add(1),
                });
            }

            MetricsEvent::FlushFinish { kind, rows } => {
                metrics::with_state_mut(|m| match kind {
                    FlushKind::Delete => m.rows_deleted = m.rows_deleted.saturating_add(rows),
                    FlushKind::Load => m.rows_loaded = m.rows_loaded.saturating_add(rows),
                    FlushKind::Insert => m.rows_inserted = m.rows_inserted.saturating_add(rows),
                    FlushKind::Update => m.rows_updated = m.rows_updated.saturating_add(rows),
                });
            }

            MetricsEvent::IdentityConflict => {
                metrics::with_state_mut(|m| {
                    m.identity_conflicts = m.identity_conflicts.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    match SINK_OVERRIDE.with(Cell::get) {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous override is restored on all exits, including unwind.
pub fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<&'static dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| cell.set(self.0));
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.replace(Some(sink)));
    let _guard = Guard(prev);

    f()
}

/// FlushSpan
/// RAII guard that emits start/finish metrics events for one flush phase.
/// Ensures finish accounting happens even on unwind.

pub(crate) struct FlushSpan {
    kind: FlushKind,
    rows: u64,
}

impl FlushSpan {
    #[must_use]
    pub(crate) fn new(kind: FlushKind) -> Self {
        record(MetricsEvent::FlushStart { kind });

        Self { kind, rows: 0 }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for FlushSpan {
    fn drop(&mut self) {
        record(MetricsEvent::FlushFinish {
            kind: self.kind,
            rows: self.rows,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct CountingSink;

    impl MetricsSink for CountingSink {
        fn record(&self, _: MetricsEvent) {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }
    }

    static COUNTING_SINK: CountingSink = CountingSink;

    #[test]
    fn with_metrics_sink_routes_and_restores_override() {
        metrics::reset();
        CALLS.store(0, Ordering::SeqCst);

        record(MetricsEvent::IdentityConflict);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        assert_eq!(metrics::report().identity_conflicts, 1);

        with_metrics_sink(&COUNTING_SINK, || {
            record(MetricsEvent::IdentityConflict);
        });
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        // override routed past the counter state
        assert_eq!(metrics::report().identity_conflicts, 1);

        record(MetricsEvent::IdentityConflict);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(metrics::report().identity_conflicts, 2);
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        metrics::reset();

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(&COUNTING_SINK, || {
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();
        assert!(panicked);

        record(MetricsEvent::IdentityConflict);
        assert_eq!(metrics::report().identity_conflicts, 1);
    }

    #[test]
    fn flush_span_accumulates_rows_on_drop() {
        metrics::reset();

        let mut span = FlushSpan::new(FlushKind::Insert);
        span.set_rows(3);
        drop(span);

        let counters = metrics::report();
        assert_eq!(counters.insert_calls, 1);
        assert_eq!(counters.rows_inserted, 3);
    }
}
