//! Progress reporting and cooperative cancellation for long builds.

use crate::error::IndexError;
use crate::types::Tag;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Receives build progress and signals cancellation
///
/// Polled once per protein during the scan and once per tag while splitting.
pub trait ProgressSink {
    fn set_total(&self, total: u64);
    fn increment(&self);
    fn is_cancelled(&self) -> bool;
}

/// Thread-safe counter with a cancellation flag
///
/// Can be shared behind an `Arc` so another thread may call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct ProgressCounter {
    label: String,
    total: AtomicU64,
    done: AtomicU64,
    cancelled: AtomicBool,
    /// Cancel automatically once `done` reaches this value
    cancel_at: Option<u64>,
}

impl ProgressCounter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            cancel_at: None,
        }
    }

    /// Counter that cancels itself after `steps` increments
    pub fn cancelling_after(label: impl Into<String>, steps: u64) -> Self {
        Self {
            cancel_at: Some(steps),
            ..Self::new(label)
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

impl ProgressSink for ProgressCounter {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        debug!(label = %self.label, total, "Progress phase started");
    }

    fn increment(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total();
        if total > 0 && (done == total || done % (total / 10).max(1) == 0) {
            info!(label = %self.label, done, total, "Progress");
        }
        if self.cancel_at.is_some_and(|limit| done >= limit) {
            self.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Coarse completion estimate for the split phase
///
/// The number of nodes to split is unknown up front, so progress advances once per
/// distinct 2-character tag prefix.
#[derive(Debug, Default)]
pub(crate) struct PrefixTable {
    expected: HashSet<String>,
    seen: HashSet<String>,
}

fn prefix(tag: &str) -> &str {
    &tag[..tag.len().min(2)]
}

impl PrefixTable {
    pub(crate) fn from_tags<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Self {
        Self {
            expected: tags.into_iter().map(|tag| prefix(tag).to_string()).collect(),
            seen: HashSet::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.expected.len()
    }

    /// Record a processed tag, advancing the sink the first time its prefix shows up
    pub(crate) fn observe(
        &mut self,
        tag: &str,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<(), IndexError> {
        let prefix = prefix(tag);
        if !self.expected.contains(prefix) {
            return Err(IndexError::Config(format!(
                "Tag prefix {} not found in the progress table",
                prefix
            )));
        }
        if self.seen.insert(prefix.to_string()) {
            if let Some(sink) = sink {
                sink.increment();
            }
        }
        Ok(())
    }
}
