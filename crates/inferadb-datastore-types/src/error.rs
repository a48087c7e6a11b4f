//! Datastore error taxonomy
//!
//! Errors fall in two groups. Expected outcomes ([`DatastoreError::NamespaceNotFound`],
//! [`DatastoreError::InvalidRevision`]) are part of normal operation and must not be
//! logged as errors by callers. Faults ([`DatastoreError::Unavailable`],
//! [`DatastoreError::Decode`], [`DatastoreError::QueryBuild`]) are wrapped with the
//! failing operation's name via [`DatastoreError::Context`] before they leave a
//! component.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Revision;

/// Why a caller-supplied revision was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRevisionReason {
    /// Older than the garbage collection window; data may already be gone
    Stale,
    /// Newer than the backend's current clock
    InFuture,
}

impl fmt::Display for InvalidRevisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => write!(f, "revision is stale"),
            Self::InFuture => write!(f, "revision is in the future"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("namespace `{name}` not found")]
    NamespaceNotFound { name: String },

    #[error("invalid revision {revision}: {reason}")]
    InvalidRevision { revision: Revision, reason: InvalidRevisionReason },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid query: {0}")]
    QueryBuild(String),

    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<DatastoreError>,
    },
}

pub type DatastoreResult<T> = std::result::Result<T, DatastoreError>;

impl DatastoreError {
    pub fn namespace_not_found(name: impl Into<String>) -> Self {
        Self::NamespaceNotFound { name: name.into() }
    }

    pub fn invalid_revision(revision: Revision, reason: InvalidRevisionReason) -> Self {
        Self::InvalidRevision { revision, reason }
    }

    /// Wrap this error with the name of the operation that produced it
    pub fn context(self, context: &'static str) -> Self {
        Self::Context { context, source: Box::new(self) }
    }

    /// The innermost error, with all context wrappers removed
    pub fn root(&self) -> &DatastoreError {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NamespaceNotFound { .. })
    }

    /// Transient failures that a caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), Self::Unavailable(_))
    }

    /// Outcomes that are part of normal operation rather than faults
    pub fn is_expected(&self) -> bool {
        matches!(self.root(), Self::NamespaceNotFound { .. } | Self::InvalidRevision { .. })
    }

    /// The rejection reason, if this is an invalid revision error
    pub fn invalid_revision_reason(&self) -> Option<InvalidRevisionReason> {
        match self.root() {
            Self::InvalidRevision { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Attach operation context to the error side of a result
pub trait ResultExt<T> {
    fn context(self, context: &'static str) -> DatastoreResult<T>;
}

impl<T> ResultExt<T> for DatastoreResult<T> {
    fn context(self, context: &'static str) -> DatastoreResult<T> {
        self.map_err(|e| e.context(context))
    }
}

impl From<serde_json::Error> for DatastoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
