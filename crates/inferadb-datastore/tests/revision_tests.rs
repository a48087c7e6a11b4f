//! Consistency controller tests against the in-memory backend clock
//!
//! The property test builds one paused runtime per test function and reuses
//! it across cases; `tokio::time::advance` then moves the local clock the
//! controller caches against without sleeping.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use inferadb_datastore::{MemoryBackend, RemoteClockRevisions, Revision, RevisionConfig};
use inferadb_datastore_config::RevisionsConfig;
use inferadb_datastore_test_fixtures::{init_test_tracing, proptest_config::proptest_config};
use inferadb_datastore_types::InvalidRevisionReason;
use proptest::{prelude::*, test_runner::TestRunner};

fn create_paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("failed to create tokio runtime")
}

fn controller(backend: &MemoryBackend, config: RevisionConfig) -> RemoteClockRevisions {
    RemoteClockRevisions::new(config, Arc::new(backend.clone())).with_metrics(backend.metrics_handle())
}

fn nanos_config(quantization: u64, delay: u64, staleness: Duration) -> RevisionConfig {
    RevisionConfig::builder()
        .quantization_period(Duration::from_nanos(quantization))
        .follower_read_delay(Duration::from_nanos(delay))
        .max_revision_staleness(staleness)
        .gc_window(Duration::from_secs(3600))
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_optimized_revision_floors_to_bucket() {
    init_test_tracing();
    let backend = MemoryBackend::with_clock_nanos(10_050);
    let revisions = controller(&backend, nanos_config(1000, 100, Duration::ZERO));

    assert_eq!(revisions.optimized_revision().await.unwrap(), Revision::from_nanos(9000));
}

#[tokio::test(start_paused = true)]
async fn test_revision_reused_without_clock_read() {
    let backend = MemoryBackend::with_clock_nanos(10_050);
    let revisions = controller(&backend, nanos_config(1000, 100, Duration::from_millis(50)));

    let first = revisions.optimized_revision().await.unwrap();
    backend.advance_clock(Duration::from_secs(1));
    tokio::time::advance(Duration::from_millis(50)).await;
    let second = revisions.optimized_revision().await.unwrap();

    assert_eq!(first, Revision::from_nanos(9000));
    assert_eq!(second, first);
    assert_eq!(backend.metrics().clock_reads, 1);
    assert_eq!(backend.metrics().revision_cache_hits, 1);
}

#[tokio::test]
async fn test_check_revision_gc_boundary() {
    let backend = MemoryBackend::with_clock_nanos(10_000);
    let config = RevisionConfig::builder().gc_window(Duration::from_nanos(5000)).build();
    let revisions = controller(&backend, config);

    let err = revisions.check_revision(Revision::from_nanos(4999)).await.unwrap_err();
    assert_eq!(err.invalid_revision_reason(), Some(InvalidRevisionReason::Stale));
    assert!(err.is_expected());
    revisions.check_revision(Revision::from_nanos(5000)).await.unwrap();
}

#[tokio::test]
async fn test_check_revision_future_boundary() {
    let backend = MemoryBackend::with_clock_nanos(10_000);
    let config = RevisionConfig::builder().gc_window(Duration::from_nanos(5000)).build();
    let revisions = controller(&backend, config);

    let err = revisions.check_revision(Revision::from_nanos(10_001)).await.unwrap_err();
    assert_eq!(err.invalid_revision_reason(), Some(InvalidRevisionReason::InFuture));
    revisions.check_revision(Revision::from_nanos(10_000)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_optimized_revision_passes_check() {
    let backend = MemoryBackend::with_clock_nanos(1_700_000_000_000_000_000);
    let section = RevisionsConfig { follower_read_delay_ms: 200, ..Default::default() };
    let revisions = RemoteClockRevisions::from_config(&section, Arc::new(backend.clone()));

    let revision = revisions.optimized_revision().await.unwrap();
    revisions.check_revision(revision).await.unwrap();

    let head = revisions.head_revision().await.unwrap();
    assert!(revision < head);
}

#[tokio::test]
async fn test_unavailable_clock_is_retryable() {
    let backend = MemoryBackend::with_clock_nanos(10_000);
    let revisions = controller(&backend, RevisionConfig::default());
    backend.set_unavailable(true);

    assert!(revisions.optimized_revision().await.unwrap_err().is_retryable());
    assert!(revisions.check_revision(Revision::from_nanos(1)).await.unwrap_err().is_retryable());
    assert!(revisions.head_revision().await.unwrap_err().is_retryable());
}

/// Once the backend clock has moved by at least one bucket and the local
/// validity window has passed, the next revision is strictly newer
#[test]
fn fuzz_optimized_revisions_increase() {
    let rt = create_paused_runtime();
    let mut runner = TestRunner::new(proptest_config());

    let strategy = (1u64..100_000)
        .prop_flat_map(|quantization| {
            (
                Just(quantization),
                0..quantization * 3,
                0u64..5,
                0i64..1_000_000_000_000,
                prop::collection::vec(quantization..quantization * 10, 1..20),
            )
        });

    runner
        .run(&strategy, |(quantization, delay, staleness_ms, start, steps)| {
            rt.block_on(async {
                let staleness = Duration::from_millis(staleness_ms);
                let backend = MemoryBackend::with_clock_nanos(start);
                let revisions = controller(&backend, nanos_config(quantization, delay, staleness));

                let mut previous = revisions.optimized_revision().await.unwrap();
                for step in steps {
                    backend.advance_clock(Duration::from_nanos(step));
                    tokio::time::advance(Duration::from_nanos(quantization) + staleness + Duration::from_millis(1))
                        .await;

                    let next = revisions.optimized_revision().await.unwrap();
                    prop_assert!(next > previous, "{:#} did not advance past {:#}", next, previous);
                    previous = next;
                }
                Ok(())
            })
        })
        .expect("proptest failed");
}
