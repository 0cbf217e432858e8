//! Processing statistics tracking.
//!
//! Thread-safe failure counters, one per [`FailureKind`], shared by the stages
//! that observe outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;

use super::types::FailureKind;

/// Thread-safe processing statistics tracker.
///
/// Every failure kind is initialized to zero on creation, so lookups never miss.
/// Share across tasks with `Arc`.
pub struct ProcessingStats {
    failures: HashMap<FailureKind, AtomicUsize>,
    successes: AtomicUsize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        let mut failures = HashMap::new();
        for kind in FailureKind::iter() {
            failures.insert(kind, AtomicUsize::new(0));
        }

        ProcessingStats {
            failures,
            successes: AtomicUsize::new(0),
        }
    }

    /// Increment the counter for a failure kind.
    pub fn increment_failure(&self, kind: FailureKind) {
        if let Some(counter) = self.failures.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment failure counter for {:?} which is not in the map. \
                 This indicates a bug in ProcessingStats initialization.",
                kind
            );
        }
    }

    pub fn increment_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the count for a failure kind.
    pub fn get_failure_count(&self, kind: FailureKind) -> usize {
        self.failures
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.failures
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    pub fn total_successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}
