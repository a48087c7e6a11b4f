//! Scoped read transactions

use std::{fmt, ops::Deref};

use async_trait::async_trait;
use futures::stream::BoxStream;
use inferadb_datastore_types::DatastoreResult;
use tracing::warn;

use crate::query::Query;

/// A stored namespace definition as the backend returns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRow {
    /// Encoded definition
    pub config: Vec<u8>,
    /// Transaction that last wrote the definition
    pub transaction_id: u64,
}

pub type NamespaceRows = BoxStream<'static, DatastoreResult<NamespaceRow>>;

/// A read-only transaction; every statement observes the same snapshot
#[async_trait]
pub trait ReadTransaction: Send + Sync {
    /// The first namespace row matching `query`, if any
    async fn query_namespace(&self, query: &Query) -> DatastoreResult<Option<NamespaceRow>>;

    /// Every namespace row matching `query`
    async fn query_namespaces(&self, query: &Query) -> DatastoreResult<NamespaceRows>;
}

/// Opens read transactions
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn begin(&self) -> DatastoreResult<ScopedTransaction>;
}

type Cleanup = Box<dyn FnOnce() -> DatastoreResult<()> + Send + Sync>;

/// A read transaction paired with its cleanup
///
/// Cleanup runs exactly once: on [`ScopedTransaction::release`] or when the
/// value is dropped, whichever comes first. That covers early returns, `?`,
/// panics and cancelled futures. A failed cleanup is logged and discarded so
/// it never masks the operation's own result.
pub struct ScopedTransaction {
    transaction: Box<dyn ReadTransaction>,
    cleanup: Option<Cleanup>,
}

impl ScopedTransaction {
    pub fn new(
        transaction: Box<dyn ReadTransaction>,
        cleanup: impl FnOnce() -> DatastoreResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self { transaction, cleanup: Some(Box::new(cleanup)) }
    }

    pub fn release(mut self) {
        self.run_cleanup();
    }

    fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Err(e) = cleanup() {
                warn!(error = %e, "failed to clean up read transaction");
            }
        }
    }
}

impl Deref for ScopedTransaction {
    type Target = dyn ReadTransaction;

    fn deref(&self) -> &Self::Target {
        self.transaction.as_ref()
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

impl fmt::Debug for ScopedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedTransaction").field("released", &self.cleanup.is_none()).finish()
    }
}
