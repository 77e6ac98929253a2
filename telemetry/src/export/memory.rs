//! In-memory exporter for development and testing.

use super::{ExportError, Exporter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Scripted failure mode.
#[derive(Debug, Clone, Copy)]
struct Failure {
    remaining: usize,
    retryable: bool,
}

/// Exporter that keeps every delivered batch in memory.
///
/// Clones share the same storage, so a test can hand one clone to a provider
/// and inspect another. Failures can be scripted with [`fail_next`] and
/// [`fail_always`], and each export can be slowed with [`with_delay`].
///
/// [`fail_next`]: InMemoryExporter::fail_next
/// [`fail_always`]: InMemoryExporter::fail_always
/// [`with_delay`]: InMemoryExporter::with_delay
#[derive(Debug)]
pub struct InMemoryExporter<T> {
    batches: Arc<RwLock<Vec<Vec<T>>>>,
    attempts: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<Failure>>>,
    shutdowns: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl<T> Clone for InMemoryExporter<T> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
            attempts: Arc::clone(&self.attempts),
            failure: Arc::clone(&self.failure),
            shutdowns: Arc::clone(&self.shutdowns),
            delay: self.delay,
        }
    }
}

impl<T> Default for InMemoryExporter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryExporter<T> {
    /// Creates an empty exporter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: Arc::new(RwLock::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            failure: Arc::new(Mutex::new(None)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Sleeps for `delay` at the start of every export.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails the next `count` export attempts.
    pub fn fail_next(&self, count: usize, retryable: bool) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Failure {
            remaining: count,
            retryable,
        });
    }

    /// Fails every export attempt until [`recover`](Self::recover) is called.
    pub fn fail_always(&self, retryable: bool) {
        self.fail_next(usize::MAX, retryable);
    }

    /// Stops scripted failures.
    pub fn recover(&self) {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Number of export calls, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of times `shutdown` was called.
    #[must_use]
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Number of delivered batches.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sizes of the delivered batches, in delivery order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .collect()
    }

    /// Total number of delivered records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .sum()
    }

    /// Clears delivered batches and counters.
    pub fn reset(&self) {
        self.batches.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.attempts.store(0, Ordering::SeqCst);
        self.recover();
    }

    fn take_failure(&self) -> Option<ExportError> {
        let mut guard = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        let failure = guard.as_mut()?;
        if failure.remaining == 0 {
            *guard = None;
            return None;
        }
        if failure.remaining != usize::MAX {
            failure.remaining -= 1;
        }
        let status = if failure.retryable {
            tonic::Status::unavailable("scripted failure")
        } else {
            tonic::Status::invalid_argument("scripted failure")
        };
        Some(ExportError::Rpc(status))
    }
}

impl<T: Clone> InMemoryExporter<T> {
    /// All delivered batches.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<T>> {
        self.batches.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All delivered records, flattened in delivery order.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[tonic::async_trait]
impl<T> Exporter<T> for InMemoryExporter<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn export(&self, batch: &[T]) -> Result<(), ExportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
