//! Revision selection for backends that expose their own clock
//!
//! [`RemoteClockRevisions`] hands out quantized revisions so that concurrent
//! readers land on the same snapshot, which keeps per-revision caches
//! downstream warm. The remote clock is only consulted when the cached
//! revision's validity window has passed.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use inferadb_datastore_config::RevisionsConfig;
use inferadb_datastore_types::{
    DatastoreError, DatastoreResult, InvalidRevisionReason, ResultExt, Revision,
};
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

use crate::metrics::{MetricsSnapshot, StoreMetrics};

/// Reads the backend's current time as a [`Revision::Timestamp`]
///
/// Successive calls against the same backend must never go backwards.
#[async_trait]
pub trait RemoteClock: Send + Sync {
    async fn now(&self) -> DatastoreResult<Revision>;
}

/// Adapts an async closure into a [`RemoteClock`]
pub struct ClockFn<F>(pub F);

#[async_trait]
impl<F, Fut> RemoteClock for ClockFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = DatastoreResult<Revision>> + Send,
{
    async fn now(&self) -> DatastoreResult<Revision> {
        (self.0)().await
    }
}

/// Windows used to quantize and validate revisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bon::Builder)]
pub struct RevisionConfig {
    /// Bucket width; zero disables quantization
    #[builder(default)]
    pub quantization_period: Duration,
    /// Oldest revision age accepted by [`RemoteClockRevisions::check_revision`]
    #[builder(default)]
    pub gc_window: Duration,
    /// Subtracted from the clock so replicas have caught up
    #[builder(default)]
    pub follower_read_delay: Duration,
    /// Extra reuse time layered on top of the quantization window
    #[builder(default)]
    pub max_revision_staleness: Duration,
}

impl From<&RevisionsConfig> for RevisionConfig {
    fn from(config: &RevisionsConfig) -> Self {
        Self {
            quantization_period: config.quantization_period(),
            gc_window: config.gc_window(),
            follower_read_delay: config.follower_read_delay(),
            max_revision_staleness: config.max_revision_staleness(),
        }
    }
}

fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// The last quantized revision and the instant until which it may be reused.
/// Both fields always come from the same clock read.
#[derive(Debug, Clone, Copy)]
struct CachedRevision {
    revision: Revision,
    valid_through: Instant,
}

impl CachedRevision {
    fn valid_at(&self, local_now: Instant) -> bool {
        local_now < self.valid_through
    }
}

/// Consistency controller for remote-clock backends
///
/// One instance is shared by every request against a backend connection.
/// The cached revision is guarded by a single lock, so concurrent callers
/// never observe a revision paired with another read's deadline, and a
/// cache miss issues at most one clock read at a time.
pub struct RemoteClockRevisions {
    quantization_nanos: i64,
    gc_window_nanos: i64,
    follower_read_delay_nanos: i64,
    max_revision_staleness: Duration,
    clock: Arc<dyn RemoteClock>,
    cached: RwLock<Option<CachedRevision>>,
    metrics: Arc<StoreMetrics>,
}

impl RemoteClockRevisions {
    pub fn new(config: RevisionConfig, clock: Arc<dyn RemoteClock>) -> Self {
        Self {
            quantization_nanos: duration_nanos(config.quantization_period),
            gc_window_nanos: duration_nanos(config.gc_window),
            follower_read_delay_nanos: duration_nanos(config.follower_read_delay),
            max_revision_staleness: config.max_revision_staleness,
            clock,
            cached: RwLock::new(None),
            metrics: Arc::new(StoreMetrics::new()),
        }
    }

    /// Build a controller from the `revisions` configuration section
    pub fn from_config(config: &RevisionsConfig, clock: Arc<dyn RemoteClock>) -> Self {
        Self::new(RevisionConfig::from(config), clock)
    }

    /// Record into a shared metrics instance instead of a private one
    pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Pick a revision that is valid for new reads and most likely to have
    /// cached subproblems
    pub async fn optimized_revision(&self) -> DatastoreResult<Revision> {
        self.optimized_revision_at(Instant::now()).await
    }

    /// [`Self::optimized_revision`] evaluated at the given local instant
    #[tracing::instrument(skip(self))]
    pub async fn optimized_revision_at(&self, local_now: Instant) -> DatastoreResult<Revision> {
        if let Some(cached) = *self.cached.read().await {
            if cached.valid_at(local_now) {
                debug!(now = ?local_now, valid = ?cached.valid_through, "returning cached revision");
                self.metrics.record_revision_lookup(true);
                return Ok(cached.revision);
            }
        }

        let mut cached = self.cached.write().await;
        let previous = *cached;

        // Another caller may have refreshed the revision while we waited
        if let Some(current) = previous {
            if current.valid_at(local_now) {
                self.metrics.record_revision_lookup(true);
                return Ok(current.revision);
            }
        }

        self.metrics.record_revision_lookup(false);
        debug!(now = ?local_now, valid = ?previous.map(|c| c.valid_through), "computing new revision");

        let now = self.read_clock().await.context("unable to compute optimized revision")?;
        let clock_nanos = timestamp_nanos(now)?;

        let effective_now = clock_nanos.saturating_sub(self.follower_read_delay_nanos);
        let quantized = if self.quantization_nanos > 0 {
            effective_now.checked_sub(effective_now.rem_euclid(self.quantization_nanos)).ok_or_else(
                || DatastoreError::Decode(format!("clock reading {clock_nanos} cannot be quantized")),
            )?
        } else {
            effective_now
        };
        debug!(
            read_skew = self.follower_read_delay_nanos,
            total_skew = clock_nanos.saturating_sub(quantized),
            "revision skews"
        );

        let valid_for_nanos = quantized.saturating_add(self.quantization_nanos) - effective_now;
        let valid_through = local_now
            .checked_add(Duration::from_nanos(valid_for_nanos.max(0) as u64))
            .and_then(|t| t.checked_add(self.max_revision_staleness))
            .unwrap_or(local_now);
        debug!(now = ?local_now, valid = ?valid_through, valid_for_nanos, "setting valid through");

        let revision = Revision::from_nanos(quantized);
        *cached = Some(CachedRevision { revision, valid_through });

        Ok(revision)
    }

    /// Check that a caller-supplied revision can be served
    ///
    /// Fails with [`InvalidRevisionReason::Stale`] when the revision is older
    /// than the GC window (a revision exactly `gc_window` old still passes) and
    /// with [`InvalidRevisionReason::InFuture`] when it is ahead of the backend
    /// clock.
    #[tracing::instrument(skip_all, fields(revision = %revision))]
    pub async fn check_revision(&self, revision: Revision) -> DatastoreResult<()> {
        let now = self.read_clock().await.context("unable to check revision")?;
        let now_nanos = timestamp_nanos(now)?;

        // Only timestamps can be placed against the clock
        let Some(revision_nanos) = revision.as_nanos() else {
            debug!(now = %now, "revision is not a timestamp");
            return Err(DatastoreError::invalid_revision(revision, InvalidRevisionReason::Stale));
        };

        if revision_nanos < now_nanos.saturating_sub(self.gc_window_nanos) {
            debug!(now = %now, "stale revision");
            return Err(DatastoreError::invalid_revision(revision, InvalidRevisionReason::Stale));
        }

        if revision_nanos > now_nanos {
            debug!(now = %now, "future revision");
            return Err(DatastoreError::invalid_revision(revision, InvalidRevisionReason::InFuture));
        }

        Ok(())
    }

    /// The backend's current time, without quantization or follower delay
    pub async fn head_revision(&self) -> DatastoreResult<Revision> {
        let now = self.read_clock().await.context("unable to read head revision")?;
        timestamp_nanos(now).map(Revision::from_nanos)
    }

    async fn read_clock(&self) -> DatastoreResult<Revision> {
        self.metrics.record_clock_read();
        self.clock.now().await
    }
}

fn timestamp_nanos(revision: Revision) -> DatastoreResult<i64> {
    revision.as_nanos().ok_or_else(|| {
        DatastoreError::Decode(format!("remote clock returned {:#}, expected a timestamp", revision))
    })
}
