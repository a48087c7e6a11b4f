//! Snapshot revisions
//!
//! A [`Revision`] marks the point in a backend's history from which reads are
//! consistent. Backends with their own clock (hybrid-logical or wall-clock)
//! hand out [`Revision::Timestamp`] values in nanoseconds; transactional
//! backends hand out [`Revision::Transaction`] identifiers. A single backend
//! integration always uses one encoding.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// An opaque, totally ordered snapshot identifier
///
/// Ordering: [`Revision::NoRevision`] sorts below every real revision.
/// Values of the same encoding compare numerically. Mixed encodings order
/// timestamps before transaction ids, which only matters if a caller mixes
/// revisions from two different backends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    /// No revision has been computed. Never valid for reads.
    #[default]
    NoRevision,
    /// Nanoseconds since the Unix epoch, as reported by a remote clock
    Timestamp(i64),
    /// Backend transaction identifier
    Transaction(u64),
}

impl Revision {
    /// Create a time-based revision from a nanosecond count
    pub const fn from_nanos(nanos: i64) -> Self {
        Self::Timestamp(nanos)
    }

    /// Create a revision for the given backend transaction identifier
    pub const fn for_transaction_id(txid: u64) -> Self {
        Self::Transaction(txid)
    }

    /// Whether this revision may be used for a read
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::NoRevision)
    }

    /// Nanosecond value of a time-based revision
    pub const fn as_nanos(&self) -> Option<i64> {
        match self {
            Self::Timestamp(nanos) => Some(*nanos),
            _ => None,
        }
    }

    /// Transaction identifier of a transaction-based revision
    pub const fn transaction_id(&self) -> Option<u64> {
        match self {
            Self::Transaction(txid) => Some(*txid),
            _ => None,
        }
    }
}

/// `{}` renders the bare decimal value, `{:#}` renders a token that
/// [`Revision::from_str`] parses back (`ts:<n>`, `tx:<n>`, `none`).
impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, f.alternate()) {
            (Self::NoRevision, _) => write!(f, "none"),
            (Self::Timestamp(nanos), false) => write!(f, "{}", nanos),
            (Self::Timestamp(nanos), true) => write!(f, "ts:{}", nanos),
            (Self::Transaction(txid), false) => write!(f, "{}", txid),
            (Self::Transaction(txid), true) => write!(f, "tx:{}", txid),
        }
    }
}

/// Error returned when a revision token cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed revision token: {0:?}")]
pub struct ParseRevisionError(pub String);

impl FromStr for Revision {
    type Err = ParseRevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(Self::NoRevision);
        }

        let malformed = || ParseRevisionError(s.to_string());
        match s.split_once(':') {
            Some(("ts", value)) => value.parse().map(Self::Timestamp).map_err(|_| malformed()),
            Some(("tx", value)) => value.parse().map(Self::Transaction).map_err(|_| malformed()),
            _ => Err(malformed()),
        }
    }
}
