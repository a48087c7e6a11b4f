//! In-memory backend for testing and development
//!
//! Rows are versioned by the transaction that created them and, once
//! removed, the transaction that deleted them. Nothing is ever overwritten in
//! place, so any past transaction id remains a readable snapshot.

use std::{
    cmp::Ordering as CmpOrdering,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use futures::stream;
use inferadb_datastore_types::{
    DatastoreError, DatastoreResult, NamespaceDefinition, ObjectAndRelation, QueryOptions,
    Relationship, Revision, SortOrder,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    codec::{JsonNamespaceCodec, NamespaceCodec},
    executor::{QueryExecutor, RelationshipIterator},
    metrics::{MetricsSnapshot, StoreMetrics},
    query::{Column, Predicate, Query, QueryRow, Table},
    revisions::RemoteClock,
    transaction::{NamespaceRow, NamespaceRows, ReadTransaction, ScopedTransaction, TransactionSource},
};

/// The transaction that created a row and, once removed, the one that
/// deleted it
#[derive(Debug, Clone, Copy)]
struct Version {
    created: u64,
    deleted: Option<u64>,
}

impl Version {
    fn new(created: u64) -> Self {
        Self { created, deleted: None }
    }

    /// The version as a transaction pinned at `snapshot` sees it, if the row
    /// existed by then
    fn as_of(self, snapshot: u64) -> Option<Self> {
        (self.created <= snapshot)
            .then(|| Self { created: self.created, deleted: self.deleted.filter(|d| *d <= snapshot) })
    }

    fn alive_at(self, transaction_id: u64) -> bool {
        self.created <= transaction_id && self.deleted.is_none_or(|d| d > transaction_id)
    }
}

/// Column access for stored values
trait Columns {
    fn column(&self, column: Column) -> Option<&str>;
}

impl Columns for Relationship {
    fn column(&self, column: Column) -> Option<&str> {
        match column {
            Column::Namespace => Some(&self.resource.namespace),
            Column::ObjectId => Some(&self.resource.object_id),
            Column::Relation => Some(&self.resource.relation),
            Column::SubjectNamespace => Some(&self.subject.namespace),
            Column::SubjectObjectId => Some(&self.subject.object_id),
            Column::SubjectRelation => Some(&self.subject.relation),
            Column::CaveatName => self.caveat_name(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredNamespace {
    name: String,
    config: Vec<u8>,
}

impl Columns for StoredNamespace {
    fn column(&self, column: Column) -> Option<&str> {
        match column {
            Column::Namespace => Some(&self.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: Version,
}

impl<T> Versioned<T> {
    fn new(value: T, created: u64) -> Self {
        Self { value, version: Version::new(created) }
    }

    fn is_live(&self) -> bool {
        self.version.deleted.is_none()
    }

    fn as_of(&self, snapshot: u64) -> Option<SnapshotRow<'_, T>> {
        self.version.as_of(snapshot).map(|version| SnapshotRow { value: &self.value, version })
    }
}

/// A stored row as seen from a snapshot
struct SnapshotRow<'a, T> {
    value: &'a T,
    version: Version,
}

impl<T: Columns> QueryRow for SnapshotRow<'_, T> {
    fn column(&self, column: Column) -> Option<&str> {
        self.value.column(column)
    }

    fn alive_at(&self, transaction_id: u64) -> bool {
        self.version.alive_at(transaction_id)
    }
}

/// Queries that do not name a transaction read the snapshot itself
fn pin_to(query: &Query, snapshot: u64) -> Query {
    if query.predicates().iter().any(|p| matches!(p, Predicate::AliveAt(_))) {
        query.clone()
    } else {
        query.filter(Predicate::AliveAt(snapshot))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Last committed transaction
    head: u64,
    relationships: Vec<Versioned<Relationship>>,
    namespaces: Vec<Versioned<StoredNamespace>>,
}

impl MemoryState {
    fn next_transaction(&mut self) -> u64 {
        self.head += 1;
        self.head
    }

    fn live_namespace_mut(&mut self, name: &str) -> Option<&mut Versioned<StoredNamespace>> {
        self.namespaces.iter_mut().find(|ns| ns.value.name == name && ns.is_live())
    }

    /// Namespace rows matching `query` in the snapshot, ordered by name
    fn select_namespaces(&self, query: &Query, snapshot: u64) -> Vec<NamespaceRow> {
        let query = pin_to(query, snapshot);
        let mut matched: Vec<SnapshotRow<'_, StoredNamespace>> = self
            .namespaces
            .iter()
            .filter_map(|ns| ns.as_of(snapshot))
            .filter(|row| query.matches(row))
            .collect();
        matched.sort_by(|a, b| a.value.name.cmp(&b.value.name));
        matched
            .into_iter()
            .map(|row| NamespaceRow { config: row.value.config.clone(), transaction_id: row.version.created })
            .collect()
    }

    fn select_relationships(&self, query: &Query, snapshot: u64) -> Vec<Relationship> {
        let query = pin_to(query, snapshot);
        self.relationships
            .iter()
            .filter_map(|r| r.as_of(snapshot))
            .filter(|row| query.matches(row))
            .map(|row| row.value.clone())
            .collect()
    }
}

struct Shared {
    state: RwLock<MemoryState>,
    clock_nanos: AtomicI64,
    unavailable: AtomicBool,
    fail_cleanup: AtomicBool,
    metrics: Arc<StoreMetrics>,
}

impl Shared {
    fn check_available(&self) -> DatastoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatastoreError::Unavailable("memory backend is unavailable".to_string()));
        }
        Ok(())
    }
}

/// In-memory datastore backend
///
/// Cloning is cheap; clones share the same rows, clock and counters.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// A backend whose clock starts at the current wall time
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        Self::with_clock_nanos(now)
    }

    pub fn with_clock_nanos(nanos: i64) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(MemoryState::default()),
                clock_nanos: AtomicI64::new(nanos),
                unavailable: AtomicBool::new(false),
                fail_cleanup: AtomicBool::new(false),
                metrics: Arc::new(StoreMetrics::new()),
            }),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store a namespace definition, replacing any live definition of the
    /// same name
    pub async fn write_namespace(&self, definition: &NamespaceDefinition) -> DatastoreResult<Revision> {
        let config = JsonNamespaceCodec.encode(definition)?;
        Ok(self.write_raw_namespace(&definition.name, config).await)
    }

    /// Store an already encoded namespace config as-is
    pub async fn write_raw_namespace(&self, name: &str, config: Vec<u8>) -> Revision {
        let mut state = self.shared.state.write().await;
        let tx = state.next_transaction();

        if let Some(existing) = state.live_namespace_mut(name) {
            existing.version.deleted = Some(tx);
        }
        state.namespaces.push(Versioned::new(StoredNamespace { name: name.to_string(), config }, tx));

        debug!(name, transaction_id = tx, "wrote namespace");
        Revision::for_transaction_id(tx)
    }

    pub async fn delete_namespace(&self, name: &str) -> DatastoreResult<Revision> {
        let mut state = self.shared.state.write().await;
        if state.live_namespace_mut(name).is_none() {
            return Err(DatastoreError::namespace_not_found(name));
        }

        let tx = state.next_transaction();
        if let Some(existing) = state.live_namespace_mut(name) {
            existing.version.deleted = Some(tx);
        }
        Ok(Revision::for_transaction_id(tx))
    }

    /// Touch relationships: each replaces any live relationship between the
    /// same resource and subject
    pub async fn write_relationships(&self, relationships: Vec<Relationship>) -> Revision {
        let mut state = self.shared.state.write().await;
        let tx = state.next_transaction();

        for relationship in relationships {
            for existing in state.relationships.iter_mut().filter(|r| {
                r.is_live()
                    && r.value.resource == relationship.resource
                    && r.value.subject == relationship.subject
            }) {
                existing.version.deleted = Some(tx);
            }
            state.relationships.push(Versioned::new(relationship, tx));
        }

        Revision::for_transaction_id(tx)
    }

    /// Delete live relationships between the given resources and subjects
    pub async fn delete_relationships(&self, relationships: &[Relationship]) -> Revision {
        let mut state = self.shared.state.write().await;
        let tx = state.next_transaction();

        for existing in state.relationships.iter_mut().filter(|r| r.is_live()) {
            if relationships
                .iter()
                .any(|d| d.resource == existing.value.resource && d.subject == existing.value.subject)
            {
                existing.version.deleted = Some(tx);
            }
        }

        Revision::for_transaction_id(tx)
    }

    /// The last committed transaction id
    pub async fn head_transaction(&self) -> u64 {
        self.shared.state.read().await.head
    }

    // ========================================================================
    // Clock and fault injection
    // ========================================================================

    pub fn set_clock_nanos(&self, nanos: i64) {
        self.shared.clock_nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance_clock(&self, by: Duration) {
        let nanos = i64::try_from(by.as_nanos()).unwrap_or(i64::MAX);
        self.shared.clock_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Fail clock reads, transaction begins and queries while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail transaction cleanup while set
    pub fn fail_cleanup(&self, fail: bool) {
        self.shared.fail_cleanup.store(fail, Ordering::SeqCst);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// The counters this backend records into, for sharing with a controller
    pub fn metrics_handle(&self) -> Arc<StoreMetrics> {
        Arc::clone(&self.shared.metrics)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteClock for MemoryBackend {
    async fn now(&self) -> DatastoreResult<Revision> {
        self.shared.check_available()?;
        Ok(Revision::from_nanos(self.shared.clock_nanos.load(Ordering::SeqCst)))
    }
}

/// A read transaction pinned to the head at begin time
struct MemoryTransaction {
    shared: Arc<Shared>,
    snapshot: u64,
}

#[async_trait]
impl ReadTransaction for MemoryTransaction {
    async fn query_namespace(&self, query: &Query) -> DatastoreResult<Option<NamespaceRow>> {
        let state = self.shared.state.read().await;
        let row = state.select_namespaces(query, self.snapshot).into_iter().next();
        self.shared.metrics.record_query(false);
        Ok(row)
    }

    async fn query_namespaces(&self, query: &Query) -> DatastoreResult<NamespaceRows> {
        let state = self.shared.state.read().await;
        let rows = state.select_namespaces(query, self.snapshot);
        self.shared.metrics.record_query(false);
        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }
}

#[async_trait]
impl TransactionSource for MemoryBackend {
    async fn begin(&self) -> DatastoreResult<ScopedTransaction> {
        self.shared.check_available()?;

        let snapshot = self.shared.state.read().await.head;
        self.shared.metrics.record_transaction_begun();

        let shared = Arc::clone(&self.shared);
        let transaction = MemoryTransaction { shared: Arc::clone(&self.shared), snapshot };
        Ok(ScopedTransaction::new(Box::new(transaction), move || {
            let failed = shared.fail_cleanup.load(Ordering::SeqCst);
            shared.metrics.record_transaction_released(failed);
            if failed {
                return Err(DatastoreError::Unavailable("failed to roll back transaction".to_string()));
            }
            Ok(())
        }))
    }
}

fn sort_key(relationship: &Relationship, sort: SortOrder) -> (&ObjectAndRelation, &ObjectAndRelation) {
    match sort {
        SortOrder::BySubject => (&relationship.subject, &relationship.resource),
        SortOrder::ByResource | SortOrder::Unsorted => (&relationship.resource, &relationship.subject),
    }
}

#[async_trait]
impl QueryExecutor for MemoryBackend {
    async fn execute_query(
        &self,
        query: Query,
        options: QueryOptions,
    ) -> DatastoreResult<RelationshipIterator> {
        if let Err(e) = self.shared.check_available() {
            self.shared.metrics.record_query(true);
            return Err(e);
        }
        if query.table() != Table::Relationships {
            return Err(DatastoreError::QueryBuild(
                "relationship queries must select from the relationships table".to_string(),
            ));
        }
        if options.after.is_some() && options.sort == SortOrder::Unsorted {
            return Err(DatastoreError::QueryBuild("a cursor requires a sort order".to_string()));
        }

        self.shared.metrics.record_query(false);

        let shared = Arc::clone(&self.shared);
        let limit = options.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        // Rows are selected on first poll, against the head at that moment
        let stream = async_stream::stream! {
            let mut matched = {
                let state = shared.state.read().await;
                state.select_relationships(&query, state.head)
            };
            if options.sort != SortOrder::Unsorted {
                matched.sort_by(|a, b| sort_key(a, options.sort).cmp(&sort_key(b, options.sort)));
            }

            let after = options.after.as_ref().map(|a| sort_key(a, options.sort));
            let remaining = matched
                .iter()
                .filter(|r| after.is_none_or(|a| sort_key(r, options.sort).cmp(&a) == CmpOrdering::Greater))
                .take(limit);

            for relationship in remaining {
                yield Ok::<_, DatastoreError>(relationship.clone());
            }
        };

        Ok(RelationshipIterator::new(stream))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    fn viewer(doc: &str, user: &str) -> Relationship {
        Relationship::new(
            ObjectAndRelation::new("document", doc, "viewer"),
            ObjectAndRelation::subject("user", user),
        )
    }

    async fn run(backend: &MemoryBackend, query: Query, options: QueryOptions) -> Vec<Relationship> {
        backend.execute_query(query, options).await.unwrap().collect_all().await.unwrap()
    }

    #[tokio::test]
    async fn test_writes_advance_head() {
        let backend = MemoryBackend::with_clock_nanos(0);
        assert_eq!(backend.head_transaction().await, 0);

        let rev = backend.write_relationships(vec![viewer("a", "alice")]).await;
        assert_eq!(rev, Revision::for_transaction_id(1));
        backend.write_namespace(&NamespaceDefinition::new("document")).await.unwrap();
        assert_eq!(backend.head_transaction().await, 2);
    }

    #[tokio::test]
    async fn test_delete_hides_from_head_but_not_snapshot() {
        let backend = MemoryBackend::with_clock_nanos(0);
        let written = backend.write_relationships(vec![viewer("a", "alice")]).await;
        backend.delete_relationships(&[viewer("a", "alice")]).await;

        assert!(run(&backend, Query::relationships(), QueryOptions::default()).await.is_empty());

        let tx = written.transaction_id().unwrap();
        let at_write = Query::relationships().filter(Predicate::AliveAt(tx));
        assert_eq!(run(&backend, at_write, QueryOptions::default()).await, vec![viewer("a", "alice")]);
    }

    #[tokio::test]
    async fn test_sort_cursor_and_limit() {
        let backend = MemoryBackend::with_clock_nanos(0);
        backend
            .write_relationships(vec![viewer("c", "alice"), viewer("a", "bob"), viewer("b", "carol")])
            .await;

        let page = QueryOptions::builder().sort(SortOrder::ByResource).limit(2).build();
        let first = run(&backend, Query::relationships(), page).await;
        assert_eq!(first, vec![viewer("a", "bob"), viewer("b", "carol")]);

        let next = QueryOptions::builder()
            .sort(SortOrder::ByResource)
            .after(first[1].clone())
            .build();
        assert_eq!(run(&backend, Query::relationships(), next).await, vec![viewer("c", "alice")]);

        let by_subject = QueryOptions::builder().sort(SortOrder::BySubject).build();
        let subjects: Vec<_> = run(&backend, Query::relationships(), by_subject)
            .await
            .into_iter()
            .map(|r| r.subject.object_id)
            .collect();
        assert_eq!(subjects, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_cursor_without_sort_is_rejected() {
        let backend = MemoryBackend::with_clock_nanos(0);
        let options = QueryOptions::builder().after(viewer("a", "alice")).build();
        let err = backend.execute_query(Query::relationships(), options).await.unwrap_err();
        assert!(matches!(err, DatastoreError::QueryBuild(_)));
    }

    #[tokio::test]
    async fn test_touch_replaces_caveat() {
        let backend = MemoryBackend::with_clock_nanos(0);
        backend.write_relationships(vec![viewer("a", "alice")]).await;
        let caveated = viewer("a", "alice")
            .with_caveat(inferadb_datastore_types::ContextualizedCaveat::named("only_weekdays"));
        backend.write_relationships(vec![caveated.clone()]).await;

        assert_eq!(run(&backend, Query::relationships(), QueryOptions::default()).await, vec![caveated]);
    }

    #[tokio::test]
    async fn test_transaction_snapshot_is_fixed_at_begin() {
        let backend = MemoryBackend::with_clock_nanos(0);
        backend.write_namespace(&NamespaceDefinition::new("document")).await.unwrap();

        let tx = backend.begin().await.unwrap();
        backend.write_namespace(&NamespaceDefinition::new("folder")).await.unwrap();

        let rows: Vec<_> = tx.query_namespaces(&Query::namespaces()).await.unwrap().try_collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        tx.release();

        let metrics = backend.metrics();
        assert_eq!(metrics.transactions_begun, 1);
        assert_eq!(metrics.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_namespace() {
        let backend = MemoryBackend::with_clock_nanos(0);
        assert!(backend.delete_namespace("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_clock_and_unavailability() {
        let backend = MemoryBackend::with_clock_nanos(1_000);
        backend.advance_clock(Duration::from_nanos(500));
        assert_eq!(backend.now().await.unwrap(), Revision::from_nanos(1_500));

        backend.set_unavailable(true);
        assert!(backend.now().await.unwrap_err().is_retryable());
        assert!(backend.begin().await.is_err());
        assert!(backend.execute_query(Query::relationships(), QueryOptions::default()).await.is_err());
        assert_eq!(backend.metrics().query_errors, 1);
    }
}
