//! Revisioned read path
//!
//! [`RevisionedReader`] serves relationship and namespace reads at one
//! snapshot. Relationship reads are handed to a [`QueryExecutor`]; namespace
//! reads run inside a [`ScopedTransaction`] that is released on every exit
//! path, including errors and cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use inferadb_datastore_types::{
    DatastoreError, DatastoreResult, NamespaceDefinition, QueryOptions, RelationshipsFilter,
    ResultExt, Revision, RevisionedNamespace, ReverseQueryOptions, SubjectsFilter,
};
use tracing::debug;

use crate::{
    codec::{JsonNamespaceCodec, NamespaceCodec},
    executor::{QueryExecutor, RelationshipIterator},
    query::{Column, Predicate, Query, QueryFilterer, snapshot_filterer, unfiltered},
    transaction::{ScopedTransaction, TransactionSource},
};

const READ_NAMESPACE_FAILED: &str = "unable to read namespace config";
const LIST_NAMESPACES_FAILED: &str = "unable to list namespaces";
const QUERY_TUPLES_FAILED: &str = "unable to query tuples";

/// Read operations available at a single revision
#[async_trait]
pub trait DatastoreReader: Send + Sync {
    /// Relationships matching a filter
    async fn query_relationships(
        &self,
        filter: RelationshipsFilter,
        options: QueryOptions,
    ) -> DatastoreResult<RelationshipIterator>;

    /// Relationships whose subject matches a filter
    async fn reverse_query_relationships(
        &self,
        subjects_filter: SubjectsFilter,
        options: ReverseQueryOptions,
    ) -> DatastoreResult<RelationshipIterator>;

    /// A namespace definition and the revision at which it was last written
    async fn read_namespace_by_name(
        &self,
        name: &str,
    ) -> DatastoreResult<(NamespaceDefinition, Revision)>;

    async fn list_all_namespaces(&self) -> DatastoreResult<Vec<RevisionedNamespace>>;

    /// The definitions for the given names; names with no definition are
    /// omitted
    async fn lookup_namespaces_with_names(
        &self,
        names: &[String],
    ) -> DatastoreResult<Vec<RevisionedNamespace>>;
}

/// Reader over a transaction source and query executor
///
/// The filterer is applied to every base query before it is narrowed; use
/// [`RevisionedReader::at`] to pin a reader to a revision.
#[derive(Clone, bon::Builder)]
pub struct RevisionedReader {
    tx_source: Arc<dyn TransactionSource>,
    executor: Arc<dyn QueryExecutor>,
    #[builder(default = Arc::new(JsonNamespaceCodec) as Arc<dyn NamespaceCodec>)]
    codec: Arc<dyn NamespaceCodec>,
    #[builder(default = unfiltered())]
    filterer: QueryFilterer,
    /// Limit for relationship queries that do not set one
    default_query_limit: Option<u64>,
}

impl RevisionedReader {
    /// The same reader restricted to the snapshot at `revision`
    pub fn at(&self, revision: Revision) -> DatastoreResult<Self> {
        Ok(Self { filterer: snapshot_filterer(revision)?, ..self.clone() })
    }

    fn base_query(&self, base: Query) -> Query {
        (self.filterer)(base)
    }

    async fn execute(
        &self,
        query: Query,
        mut options: QueryOptions,
    ) -> DatastoreResult<RelationshipIterator> {
        if options.limit.is_none() {
            options.limit = self.default_query_limit;
        }
        self.executor.execute_query(query, options).await.context(QUERY_TUPLES_FAILED)
    }

    async fn load_namespaces(
        &self,
        tx: &ScopedTransaction,
        query: &Query,
    ) -> DatastoreResult<Vec<RevisionedNamespace>> {
        let mut rows = tx.query_namespaces(query).await?;

        let mut namespaces = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let definition = self.codec.decode(&row.config).context(READ_NAMESPACE_FAILED)?;
            namespaces.push(RevisionedNamespace {
                definition,
                last_written_revision: Revision::for_transaction_id(row.transaction_id),
            });
        }

        Ok(namespaces)
    }
}

#[async_trait]
impl DatastoreReader for RevisionedReader {
    #[tracing::instrument(skip(self, options), fields(resource_type = %filter.resource_type))]
    async fn query_relationships(
        &self,
        filter: RelationshipsFilter,
        options: QueryOptions,
    ) -> DatastoreResult<RelationshipIterator> {
        let query = self.base_query(Query::relationships()).filter_with_relationships_filter(&filter)?;
        self.execute(query, options).await
    }

    #[tracing::instrument(skip(self, options), fields(subject_type = %subjects_filter.subject_type))]
    async fn reverse_query_relationships(
        &self,
        subjects_filter: SubjectsFilter,
        options: ReverseQueryOptions,
    ) -> DatastoreResult<RelationshipIterator> {
        let mut query = self
            .base_query(Query::relationships())
            .filter_with_subjects_selectors(&[subjects_filter.as_selector()])?;

        if let Some(res_relation) = &options.res_relation {
            query = query
                .filter_to_resource_type(&res_relation.namespace)
                .filter_to_relation(&res_relation.relation);
        }

        self.execute(query, options.to_query_options()).await
    }

    #[tracing::instrument(skip(self))]
    async fn read_namespace_by_name(
        &self,
        name: &str,
    ) -> DatastoreResult<(NamespaceDefinition, Revision)> {
        let tx = self.tx_source.begin().await.context(READ_NAMESPACE_FAILED)?;

        let query = self
            .base_query(Query::namespaces())
            .filter(Predicate::Eq(Column::Namespace, name.to_string()));

        let Some(row) = tx.query_namespace(&query).await.context(READ_NAMESPACE_FAILED)? else {
            debug!(name, "namespace not found");
            return Err(DatastoreError::namespace_not_found(name));
        };

        let definition = self.codec.decode(&row.config).context(READ_NAMESPACE_FAILED)?;
        tx.release();

        Ok((definition, Revision::for_transaction_id(row.transaction_id)))
    }

    #[tracing::instrument(skip(self))]
    async fn list_all_namespaces(&self) -> DatastoreResult<Vec<RevisionedNamespace>> {
        let tx = self.tx_source.begin().await.context(LIST_NAMESPACES_FAILED)?;

        let query = self.base_query(Query::namespaces());
        let namespaces = self.load_namespaces(&tx, &query).await.context(LIST_NAMESPACES_FAILED)?;
        tx.release();

        Ok(namespaces)
    }

    #[tracing::instrument(skip(self), fields(count = names.len()))]
    async fn lookup_namespaces_with_names(
        &self,
        names: &[String],
    ) -> DatastoreResult<Vec<RevisionedNamespace>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.tx_source.begin().await.context(LIST_NAMESPACES_FAILED)?;

        let query = self.base_query(Query::namespaces()).filter_any_of(
            names.iter().map(|name| Predicate::Eq(Column::Namespace, name.clone())).collect(),
        );
        let namespaces = self.load_namespaces(&tx, &query).await.context(LIST_NAMESPACES_FAILED)?;
        tx.release();

        Ok(namespaces)
    }
}
