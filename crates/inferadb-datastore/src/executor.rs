//! Relationship query execution

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt, stream::BoxStream};
use inferadb_datastore_types::{DatastoreResult, QueryOptions, Relationship};
use tracing::debug;

use crate::query::Query;

/// Runs relationship queries against a backend
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a composed query, honoring the limit, cursor and sort order
    async fn execute_query(
        &self,
        query: Query,
        options: QueryOptions,
    ) -> DatastoreResult<RelationshipIterator>;
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Lazy, single-pass stream of relationships
///
/// Holds whatever backend resources the query needs until it is closed.
/// `close()` releases them; an iterator dropped without being closed releases
/// them as well.
pub struct RelationshipIterator {
    stream: Option<BoxStream<'static, DatastoreResult<Relationship>>>,
    on_release: Option<ReleaseHook>,
}

impl RelationshipIterator {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DatastoreResult<Relationship>> + Send + 'static,
    {
        Self { stream: Some(stream.boxed()), on_release: None }
    }

    /// An iterator over already materialized relationships
    pub fn from_vec(relationships: Vec<Relationship>) -> Self {
        Self::new(futures::stream::iter(relationships.into_iter().map(Ok)))
    }

    /// Run `hook` once when the iterator is closed or dropped
    pub fn with_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Stop producing items and release backend resources
    pub fn close(&mut self) {
        self.stream = None;
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Drain the remaining relationships, then close
    pub async fn collect_all(mut self) -> DatastoreResult<Vec<Relationship>> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.try_collect().await,
            None => Ok(Vec::new()),
        };
        self.close();
        result
    }
}

impl Stream for RelationshipIterator {
    type Item = DatastoreResult<Relationship>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.stream.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for RelationshipIterator {
    fn drop(&mut self) {
        if self.on_release.is_some() {
            debug!("relationship iterator dropped without close");
            self.close();
        }
    }
}

impl fmt::Debug for RelationshipIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipIterator").field("closed", &self.is_closed()).finish()
    }
}
