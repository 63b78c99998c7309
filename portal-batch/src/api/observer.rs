//! Phase-boundary hooks for batch execution, traversal and mutations
//!
//! The engine never logs directly; it reports to a [`BatchObserver`].
//! [`LogObserver`] forwards everything to the `log` facade.

use log::{debug, error};
use std::time::Duration;

use super::mutation::MutationKind;
use super::strategy::PaginationMode;
use crate::error::BatchError;

/// Callbacks fired at each phase boundary. All methods default to no-ops.
pub trait BatchObserver: Send + Sync {
    fn batch_started(&self, _method: &str, _commands: usize) {}

    fn batch_finished(&self, _method: &str, _results: usize, _elapsed: Duration) {}

    fn single_call(&self, _method: &str) {}

    fn traversal_started(&self, _method: &str, _mode: PaginationMode, _limit: Option<usize>) {}

    fn total_known(&self, _method: &str, _total: usize) {}

    fn page_received(&self, _method: &str, _items: usize) {}

    fn traversal_finished(&self, _method: &str, _yielded: usize) {}

    fn mutation_started(&self, _kind: MutationKind, _method: &str, _items: usize) {}

    fn mutation_finished(&self, _kind: MutationKind, _method: &str, _results: usize) {}

    fn failed(&self, _stage: &str, _error: &BatchError) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl BatchObserver for LogObserver {
    fn batch_started(&self, method: &str, commands: usize) {
        debug!("batch.start: {} commands (first method {})", commands, method);
    }

    fn batch_finished(&self, method: &str, results: usize, elapsed: Duration) {
        debug!(
            "batch.finish: {} results for {} in {:.2}ms",
            results,
            method,
            elapsed.as_secs_f64() * 1000.0
        );
    }

    fn single_call(&self, method: &str) {
        debug!("call: {}", method);
    }

    fn traversal_started(&self, method: &str, mode: PaginationMode, limit: Option<usize>) {
        debug!(
            "traversal.start: {} ({:?} pagination, limit {:?})",
            method, mode, limit
        );
    }

    fn total_known(&self, method: &str, total: usize) {
        debug!("traversal.total: {} reports {} items", method, total);
    }

    fn page_received(&self, method: &str, items: usize) {
        debug!("traversal.page: {} returned {} items", method, items);
    }

    fn traversal_finished(&self, method: &str, yielded: usize) {
        debug!("traversal.finish: {} yielded {} items", method, yielded);
    }

    fn mutation_started(&self, kind: MutationKind, method: &str, items: usize) {
        debug!("{}EntityItems.start: {} with {} items", kind, method, items);
    }

    fn mutation_finished(&self, kind: MutationKind, method: &str, results: usize) {
        debug!("{}EntityItems.finish: {} with {} results", kind, method, results);
    }

    fn failed(&self, stage: &str, error: &BatchError) {
        error!("{}: {}", stage, error);
    }
}
