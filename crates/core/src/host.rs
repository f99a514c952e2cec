//! Host-side collaborators the source reports through: log sink, result sink, abort signal.
//!
//! The host application owns scheduling and result aggregation. A source only
//! pushes into a [`ResultSink`], writes to a [`LogSink`] and polls an
//! [`AbortSignal`] at its checkpoints.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::metadata::BookMetadata;

/// Per-lookup log supplied by the host, so messages end up next to the lookup they belong to.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    /// An error with its cause attached.
    fn exception(&self, message: &str, error: &dyn std::error::Error);
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn exception(&self, message: &str, error: &dyn std::error::Error) {
        tracing::error!(error = %error, "{}", message);
    }
}

/// Something a source produced for the host.
#[derive(Debug, Clone)]
pub enum SourceResult {
    Metadata(BookMetadata),
    Cover { source: String, data: Vec<u8> },
}

pub trait ResultSink: Send + Sync {
    fn put(&self, result: SourceResult);
}

impl ResultSink for mpsc::Sender<SourceResult> {
    fn put(&self, result: SourceResult) {
        // A dropped receiver means the host stopped listening.
        let _ = self.send(result);
    }
}

/// Thread-safe FIFO of results, drained by whoever owns it.
#[derive(Debug, Default)]
pub struct ResultQueue {
    items: Mutex<VecDeque<SourceResult>>,
}

impl ResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take everything queued so far, in insertion order.
    pub fn drain(&self) -> Vec<SourceResult> {
        self.lock().drain(..).collect()
    }

    /// Take only the metadata records, discarding anything else.
    pub fn drain_metadata(&self) -> Vec<BookMetadata> {
        self.drain()
            .into_iter()
            .filter_map(|r| match r {
                SourceResult::Metadata(mi) => Some(mi),
                SourceResult::Cover { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SourceResult>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResultSink for ResultQueue {
    fn put(&self, result: SourceResult) {
        self.lock().push_back(result);
    }
}

/// Cooperative cancellation flag shared between the host and a running lookup.
///
/// Setting it never interrupts a fetch in flight; sources check it between
/// units of work.
#[derive(Debug, Default, Clone)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let q = ResultQueue::new();
        q.put(SourceResult::Metadata(BookMetadata::new("one", Vec::new())));
        q.put(SourceResult::Cover { source: "x".to_string(), data: vec![1, 2] });
        q.put(SourceResult::Metadata(BookMetadata::new("two", Vec::new())));
        assert_eq!(q.len(), 3);

        let titles: Vec<_> = q.drain_metadata().into_iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["one", "two"]);
        assert!(q.is_empty());
    }

    #[test]
    fn channel_sender_is_a_sink() {
        let (tx, rx) = mpsc::channel();
        tx.put(SourceResult::Cover { source: "bokelai".to_string(), data: vec![7] });
        match rx.recv().unwrap() {
            SourceResult::Cover { source, data } => {
                assert_eq!(source, "bokelai");
                assert_eq!(data, vec![7]);
            }
            _ => panic!("Expected cover result"),
        }
    }

    #[test]
    fn abort_signal_is_shared_between_clones() {
        let abort = AbortSignal::new();
        let other = abort.clone();
        assert!(!other.is_set());
        abort.set();
        assert!(other.is_set());
    }
}
