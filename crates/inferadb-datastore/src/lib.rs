//! Revisioned read path for the InferaDB datastore.
//!
//! This crate picks the revision a request reads at and serves relationship
//! and namespace reads at that revision, on top of backend seams that a
//! concrete store implements.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 RemoteClockRevisions                  │
//! │  optimized_revision │ check_revision │ head_revision  │
//! │     (quantized, cached revisions per connection)      │
//! ├───────────────────────────────────────────────────────┤
//! │                   RevisionedReader                    │
//! │   query_relationships │ reverse_query_relationships   │
//! │   read_namespace_by_name │ list / lookup namespaces   │
//! ├───────────────────────────────────────────────────────┤
//! │                     Backend seams                     │
//! │    RemoteClock │ TransactionSource │ QueryExecutor    │
//! │                    NamespaceCodec                     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! [`MemoryBackend`] implements every seam in process and is what the test
//! suites run against.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use inferadb_datastore::{DatastoreReader, MemoryBackend, RemoteClockRevisions, RevisionedReader};
//!
//! let backend = MemoryBackend::new();
//! let config = inferadb_datastore_config::load_or_default("config.yaml");
//! let revisions = RemoteClockRevisions::from_config(&config.revisions, Arc::new(backend.clone()));
//!
//! let reader = RevisionedReader::builder()
//!     .tx_source(Arc::new(backend.clone()))
//!     .executor(Arc::new(backend))
//!     .maybe_default_query_limit(config.reader.default_query_limit)
//!     .build();
//!
//! let revision = revisions.optimized_revision().await?;
//! let (definition, written_at) = reader.read_namespace_by_name("document").await?;
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod executor;
pub mod memory;
pub mod metrics;
pub mod query;
pub mod reader;
pub mod revisions;
pub mod transaction;

pub use codec::{JsonNamespaceCodec, NamespaceCodec};
pub use executor::{QueryExecutor, RelationshipIterator};
pub use inferadb_datastore_types::{DatastoreError, DatastoreResult, Revision};
pub use memory::MemoryBackend;
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use query::{Query, QueryFilterer, snapshot_filterer, unfiltered};
pub use reader::{DatastoreReader, RevisionedReader};
pub use revisions::{ClockFn, RemoteClock, RemoteClockRevisions, RevisionConfig};
pub use transaction::{NamespaceRow, NamespaceRows, ReadTransaction, ScopedTransaction, TransactionSource};
