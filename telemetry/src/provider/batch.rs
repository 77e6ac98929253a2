//! Generic batching provider.
//!
//! Producers push records into a bounded in-memory buffer. A background
//! worker task drains it in batches of at most `max_batch_size`, either as soon
//! as a full batch is available or once the oldest buffered record has waited
//! `max_delay`. Exports are retried with bounded backoff; a batch that still
//! fails is dropped and counted.

use crate::config::{BatchConfig, OverflowPolicy, RetryConfig, SignalKind};
use crate::export::Exporter;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::Instant;

/// Point-in-time counters for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    /// Records passed to `record`, including ones that were dropped.
    pub recorded: u64,
    /// Records delivered to the exporter.
    pub exported: u64,
    /// Records lost to queue overflow, export failure, late arrival, or
    /// failed validation.
    pub dropped: u64,
    /// Malformed records rejected by `record`. Also counted in `dropped`.
    pub invalid: u64,
    /// Batches delivered to the exporter.
    pub exported_batches: u64,
    /// Batches abandoned after their final failed attempt.
    pub failed_batches: u64,
    /// Records waiting in the buffer.
    pub buffered: usize,
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    exported: AtomicU64,
    dropped: AtomicU64,
    invalid: AtomicU64,
    exported_batches: AtomicU64,
    failed_batches: AtomicU64,
}

#[derive(Debug)]
struct Buffer<T> {
    /// Records with their arrival time, oldest first.
    items: VecDeque<(Instant, T)>,
    closed: bool,
}

#[derive(Debug)]
struct Shared<T> {
    config: BatchConfig,
    buffer: Mutex<Buffer<T>>,
    notify: Notify,
    counters: Counters,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Buffer<T>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kind(&self) -> SignalKind {
        self.config.kind
    }

    fn deadline(&self) -> Option<Instant> {
        self.lock()
            .items
            .front()
            .map(|(arrived, _)| *arrived + self.config.max_delay)
    }

    fn has_full_batch(&self) -> bool {
        self.lock().items.len() >= self.config.max_batch_size
    }

    /// Removes up to one batch from the front of the buffer.
    fn take_batch(&self) -> Vec<T> {
        let mut buffer = self.lock();
        let count = buffer.items.len().min(self.config.max_batch_size);
        buffer.items.drain(..count).map(|(_, item)| item).collect()
    }
}

fn bump(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

/// Checks a single record before it is buffered.
pub type Validator<T> = fn(&T) -> Result<(), String>;

enum Control {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Buffers records of type `T` and exports them in batches.
///
/// Cloning is not supported; wrap in an `Arc` to share. Dropping the provider
/// lets the worker flush what is buffered and exit.
pub struct BatchProvider<T> {
    shared: Arc<Shared<T>>,
    control: mpsc::UnboundedSender<Control>,
    validate: Option<Validator<T>>,
}

impl<T> std::fmt::Debug for BatchProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProvider")
            .field("kind", &self.shared.kind())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<T> BatchProvider<T>
where
    T: Send + Sync + 'static,
{
    /// Creates the provider and spawns its worker task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(mut config: BatchConfig, retry: RetryConfig, exporter: Arc<dyn Exporter<T>>) -> Self {
        // Unvalidated configs must not stall the worker.
        config.max_batch_size = config.max_batch_size.max(1);
        config.max_queue_size = config.max_queue_size.max(config.max_batch_size);

        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(config.max_batch_size),
                closed: false,
            }),
            config,
            notify: Notify::new(),
            counters: Counters::default(),
        });
        let (control, receiver) = mpsc::unbounded_channel();

        let worker = Worker {
            shared: Arc::clone(&shared),
            exporter,
            retry,
            control: receiver,
        };
        tokio::spawn(worker.run());

        Self {
            shared,
            control,
            validate: None,
        }
    }

    /// Rejects records failing `validate` in [`record`](Self::record), so a
    /// malformed record is dropped on its own instead of failing the batch
    /// it would have been exported with.
    #[must_use]
    pub fn with_validation(mut self, validate: Validator<T>) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Accepts a record without blocking on export.
    ///
    /// The record is dropped and counted if it fails validation, the provider
    /// is shut down, or the buffer is full under [`OverflowPolicy::DropNewest`].
    pub fn record(&self, item: T) {
        let shared = &self.shared;
        bump(&shared.counters.recorded, 1);

        if let Some(Err(error)) = self.validate.map(|validate| validate(&item)) {
            bump(&shared.counters.invalid, 1);
            bump(&shared.counters.dropped, 1);
            tracing::debug!(signal = %shared.kind(), %error, "Dropping malformed record");
            return;
        }

        let wake = {
            let mut buffer = shared.lock();
            if buffer.closed {
                bump(&shared.counters.dropped, 1);
                return;
            }
            if buffer.items.len() >= shared.config.max_queue_size {
                bump(&shared.counters.dropped, 1);
                match shared.config.overflow {
                    OverflowPolicy::DropNewest => {
                        drop(buffer);
                        tracing::debug!(signal = %shared.kind(), "Buffer full, dropping record");
                        return;
                    }
                    OverflowPolicy::DropOldest => {
                        buffer.items.pop_front();
                    }
                }
            }
            let first = buffer.items.is_empty();
            buffer.items.push_back((Instant::now(), item));
            first || buffer.items.len() >= shared.config.max_batch_size
        };

        if wake {
            shared.notify.notify_one();
        }
    }

    /// Exports everything buffered and waits up to `timeout` for it.
    ///
    /// Returns false if the timeout elapsed or the provider is shut down.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        if self.shared.lock().closed {
            return false;
        }
        let (ack, done) = oneshot::channel();
        if self.control.send(Control::Flush(ack)).is_err() {
            return false;
        }
        matches!(tokio::time::timeout(timeout, done).await, Ok(Ok(())))
    }

    /// Stops accepting records, exports what is buffered, shuts down the
    /// exporter and waits up to `timeout` for all of it.
    ///
    /// Returns false if the timeout elapsed or on any call after the first.
    /// When the timeout elapses the worker keeps draining in the background.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        {
            let mut buffer = self.shared.lock();
            if buffer.closed {
                return false;
            }
            buffer.closed = true;
        }
        let (ack, done) = oneshot::channel();
        if self.control.send(Control::Shutdown(ack)).is_err() {
            return false;
        }
        let completed = matches!(tokio::time::timeout(timeout, done).await, Ok(Ok(())));
        if !completed {
            tracing::warn!(signal = %self.shared.kind(), ?timeout, "Shutdown timed out before flush completed");
        }
        completed
    }

    /// Returns true once `shutdown` has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().closed
    }

    /// The signal this provider carries.
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        self.shared.kind()
    }
}

impl<T> BatchProvider<T> {
    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ProviderStats {
        let counters = &self.shared.counters;
        ProviderStats {
            recorded: counters.recorded.load(Ordering::Relaxed),
            exported: counters.exported.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            invalid: counters.invalid.load(Ordering::Relaxed),
            exported_batches: counters.exported_batches.load(Ordering::Relaxed),
            failed_batches: counters.failed_batches.load(Ordering::Relaxed),
            buffered: self.shared.lock().items.len(),
        }
    }
}

struct Worker<T> {
    shared: Arc<Shared<T>>,
    exporter: Arc<dyn Exporter<T>>,
    retry: RetryConfig,
    control: mpsc::UnboundedReceiver<Control>,
}

impl<T> Worker<T>
where
    T: Send + Sync + 'static,
{
    async fn run(mut self) {
        tracing::debug!(signal = %self.shared.kind(), "Batch worker started");
        loop {
            let deadline = self.shared.deadline();
            tokio::select! {
                biased;
                message = self.control.recv() => match message {
                    Some(Control::Flush(ack)) => {
                        self.export_all().await;
                        let _ = ack.send(());
                    }
                    Some(Control::Shutdown(ack)) => {
                        self.export_all().await;
                        self.exporter.shutdown().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.export_all().await;
                        break;
                    }
                },
                () = self.shared.notify.notified() => {
                    self.export_full_batches().await;
                }
                () = sleep_until(deadline) => {
                    let batch = self.shared.take_batch();
                    self.export(batch).await;
                    self.export_full_batches().await;
                }
            }
        }
        tracing::debug!(signal = %self.shared.kind(), "Batch worker stopped");
    }

    async fn export_full_batches(&self) {
        while self.shared.has_full_batch() {
            let batch = self.shared.take_batch();
            self.export(batch).await;
        }
    }

    async fn export_all(&self) {
        loop {
            let batch = self.shared.take_batch();
            if batch.is_empty() {
                break;
            }
            self.export(batch).await;
        }
    }

    async fn export(&self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let kind = self.shared.kind();
        let counters = &self.shared.counters;
        let mut attempt = 1;

        loop {
            match self.exporter.export(&batch).await {
                Ok(()) => {
                    bump(&counters.exported, batch.len());
                    bump(&counters.exported_batches, 1);
                    tracing::debug!(signal = %kind, size = batch.len(), attempt, "Exported batch");
                    return;
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff_for(attempt);
                    tracing::debug!(signal = %kind, attempt, error = %e, ?backoff, "Export failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    bump(&counters.dropped, batch.len());
                    bump(&counters.failed_batches, 1);
                    tracing::warn!(
                        signal = %kind,
                        size = batch.len(),
                        attempts = attempt,
                        error = %e,
                        "Dropping batch after export failure"
                    );
                    return;
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
