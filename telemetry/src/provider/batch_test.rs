//! Tests for the batching provider.

use super::*;
use crate::export::InMemoryExporter;

const LONG: Duration = Duration::from_secs(3600);

fn config(batch: usize, delay: Duration) -> BatchConfig {
    BatchConfig::new(SignalKind::Traces, delay).with_max_batch_size(batch)
}

fn provider(config: BatchConfig, exporter: &InMemoryExporter<u32>) -> BatchProvider<u32> {
    BatchProvider::new(config, RetryConfig::default(), Arc::new(exporter.clone()))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_partial_batch_waits_for_delay() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(10, Duration::from_secs(5)), &exporter);

    for i in 0..3 {
        provider.record(i);
    }

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(exporter.batch_count(), 0);
    assert_eq!(provider.stats().buffered, 3);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(exporter.batch_sizes(), vec![3]);
    assert_eq!(provider.stats().buffered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_exports_immediately() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(4, LONG), &exporter);

    for i in 0..4 {
        provider.record(i);
    }
    settle().await;

    assert_eq!(exporter.batch_sizes(), vec![4]);
    assert_eq!(exporter.records(), vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_batch_size_one() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(1, LONG), &exporter);

    for i in 0..3 {
        provider.record(i);
        settle().await;
    }

    assert_eq!(exporter.batch_sizes(), vec![1, 1, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_large_backlog_split_into_batches() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(4, LONG), &exporter);

    for i in 0..10 {
        provider.record(i);
    }
    assert!(provider.shutdown(Duration::from_secs(1)).await);

    assert_eq!(exporter.batch_sizes(), vec![4, 4, 2]);
    assert_eq!(exporter.records(), (0..10).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_force_flush_exports_partial_batch() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(100, LONG), &exporter);

    provider.record(7);
    assert!(provider.force_flush(Duration::from_secs(1)).await);

    assert_eq!(exporter.records(), vec![7]);
    assert!(!provider.is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_delivers_everything_once() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(100, LONG), &exporter);

    for i in 0..5 {
        provider.record(i);
    }

    assert!(provider.shutdown(Duration::from_secs(1)).await);
    assert_eq!(exporter.record_count(), 5);
    assert_eq!(exporter.shutdown_count(), 1);

    // Second shutdown reports failure and does nothing.
    assert!(!provider.shutdown(Duration::from_secs(1)).await);
    assert!(!provider.force_flush(Duration::from_secs(1)).await);
    assert_eq!(exporter.shutdown_count(), 1);

    provider.record(99);
    let stats = provider.stats();
    assert_eq!(stats.recorded, 6);
    assert_eq!(stats.exported, 5);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.buffered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_shutdown_returns_without_blocking() {
    let exporter = InMemoryExporter::new().with_delay(Duration::from_secs(1));
    let provider = provider(config(100, LONG), &exporter);

    provider.record(1);
    let start = Instant::now();
    assert!(!provider.shutdown(Duration::ZERO).await);
    assert!(start.elapsed() < Duration::from_secs(1));

    // The worker finishes in the background.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(exporter.record_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_newest_on_overflow() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(4, LONG).with_max_queue_size(4), &exporter);

    // The worker cannot run between these calls on a current-thread runtime.
    for i in 0..6 {
        provider.record(i);
    }
    assert_eq!(provider.stats().dropped, 2);

    assert!(provider.shutdown(Duration::from_secs(1)).await);
    assert_eq!(exporter.records(), vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_drop_oldest_on_overflow() {
    let exporter = InMemoryExporter::new();
    let config = config(4, LONG)
        .with_max_queue_size(4)
        .with_overflow(OverflowPolicy::DropOldest);
    let provider = provider(config, &exporter);

    for i in 0..6 {
        provider.record(i);
    }
    assert_eq!(provider.stats().dropped, 2);

    assert!(provider.shutdown(Duration::from_secs(1)).await);
    assert_eq!(exporter.records(), vec![2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_failure_is_retried() {
    let exporter = InMemoryExporter::new();
    exporter.fail_next(2, true);
    let provider = provider(config(1, LONG), &exporter);

    provider.record(1);
    assert!(provider.shutdown(Duration::from_secs(5)).await);

    assert_eq!(exporter.attempts(), 3);
    assert_eq!(exporter.records(), vec![1]);
    let stats = provider.stats();
    assert_eq!(stats.exported, 1);
    assert_eq!(stats.failed_batches, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_dropped_after_retries_exhausted() {
    let exporter = InMemoryExporter::new();
    exporter.fail_always(true);
    let provider = provider(config(2, LONG), &exporter);

    provider.record(1);
    provider.record(2);
    assert!(provider.shutdown(Duration::from_secs(5)).await);

    assert_eq!(exporter.attempts(), 3);
    let stats = provider.stats();
    assert_eq!(stats.exported, 0);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.failed_batches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_is_not_retried() {
    let exporter = InMemoryExporter::new();
    exporter.fail_next(1, false);
    let provider = provider(config(1, LONG), &exporter);

    provider.record(1);
    provider.record(2);
    assert!(provider.shutdown(Duration::from_secs(5)).await);

    // First batch fails once and is dropped, second goes through.
    assert_eq!(exporter.attempts(), 2);
    assert_eq!(exporter.records(), vec![2]);
    assert_eq!(provider.stats().failed_batches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_provider_flushes_buffer() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(100, LONG), &exporter);

    provider.record(42);
    drop(provider);
    settle().await;

    assert_eq!(exporter.records(), vec![42]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_are_not_lost() {
    let exporter = InMemoryExporter::new();
    let config = config(64, Duration::from_millis(10)).with_max_queue_size(100_000);
    let provider = Arc::new(provider(config, &exporter));

    let mut handles = Vec::new();
    for task in 0..8u32 {
        let provider = Arc::clone(&provider);
        handles.push(tokio::spawn(async move {
            for i in 0..1000 {
                provider.record(task * 1000 + i);
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(provider.shutdown(Duration::from_secs(10)).await);

    let mut records = exporter.records();
    records.sort_unstable();
    assert_eq!(records, (0..8000).collect::<Vec<_>>());
    assert!(exporter.batch_sizes().iter().all(|&size| size <= 64));

    let stats = provider.stats();
    assert_eq!(stats.recorded, 8000);
    assert_eq!(stats.exported, 8000);
    assert_eq!(stats.dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_leftover_keeps_its_arrival_deadline() {
    let exporter = InMemoryExporter::new().with_delay(Duration::from_millis(100));
    let provider = provider(config(2, Duration::from_millis(500)), &exporter);

    provider.record(1);
    provider.record(2);
    // The worker is busy exporting [1, 2] until t=100ms.
    tokio::time::sleep(Duration::from_millis(10)).await;
    for i in 3..=5 {
        provider.record(i);
    }

    tokio::time::sleep(Duration::from_millis(440)).await;
    assert_eq!(exporter.batch_sizes(), vec![2, 2]);

    // 5 arrived at t=10ms, so it is due at t=510ms and delivered by t=610ms.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(exporter.batch_sizes(), vec![2, 2, 1]);
    assert_eq!(exporter.records(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_record_dropped_individually() {
    let exporter = InMemoryExporter::new();
    let provider = provider(config(10, LONG), &exporter).with_validation(|n| {
        if n % 2 == 0 {
            Ok(())
        } else {
            Err(format!("{n} is odd"))
        }
    });

    for i in 0..6 {
        provider.record(i);
    }
    assert!(provider.shutdown(Duration::from_secs(1)).await);

    assert_eq!(exporter.batches(), vec![vec![0, 2, 4]]);
    let stats = provider.stats();
    assert_eq!(stats.recorded, 6);
    assert_eq!(stats.exported, 3);
    assert_eq!(stats.invalid, 3);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.failed_batches, 0);
}
