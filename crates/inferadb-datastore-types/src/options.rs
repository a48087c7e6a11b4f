//! Read options for relationship queries

use serde::{Deserialize, Serialize};

use crate::Relationship;

/// Result ordering for relationship queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Backend order; cursors are not supported
    #[default]
    Unsorted,
    /// Resource first, then subject
    ByResource,
    /// Subject first, then resource
    BySubject,
}

/// Options for forward relationship queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct QueryOptions {
    /// Maximum number of relationships to return
    pub limit: Option<u64>,
    /// Resume after this relationship (exclusive); requires a sort order
    pub after: Option<Relationship>,
    #[builder(default)]
    #[serde(default)]
    pub sort: SortOrder,
}

/// A resource type and relation pair used to narrow reverse queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRelation {
    pub namespace: String,
    pub relation: String,
}

impl ResourceRelation {
    pub fn new(namespace: impl Into<String>, relation: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), relation: relation.into() }
    }
}

/// Options for reverse (subject-first) relationship queries
///
/// Kept separate from [`QueryOptions`] because reverse lookups page and sort
/// by subject by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct ReverseQueryOptions {
    /// Only relationships on this resource type and relation
    pub res_relation: Option<ResourceRelation>,
    pub limit_for_reverse: Option<u64>,
    pub after_for_reverse: Option<Relationship>,
    #[builder(default = SortOrder::BySubject)]
    #[serde(default = "default_reverse_sort")]
    pub sort_for_reverse: SortOrder,
}

fn default_reverse_sort() -> SortOrder {
    SortOrder::BySubject
}

impl Default for ReverseQueryOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReverseQueryOptions {
    /// The forward options the executor runs a reverse query with
    pub fn to_query_options(&self) -> QueryOptions {
        QueryOptions {
            limit: self.limit_for_reverse,
            after: self.after_for_reverse.clone(),
            sort: self.sort_for_reverse,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ObjectAndRelation;

    #[test]
    fn test_query_options_defaults() {
        let opts = QueryOptions::default();
        assert_eq!(opts.limit, None);
        assert_eq!(opts.after, None);
        assert_eq!(opts.sort, SortOrder::Unsorted);
    }

    #[test]
    fn test_reverse_options_default_to_subject_order() {
        let opts = ReverseQueryOptions::default();
        assert_eq!(opts.sort_for_reverse, SortOrder::BySubject);
        assert!(opts.res_relation.is_none());

        let deserialized: ReverseQueryOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(deserialized, opts);
    }

    #[test]
    fn test_reverse_options_convert_to_query_options() {
        let after = Relationship::new(
            ObjectAndRelation::new("document", "a", "viewer"),
            ObjectAndRelation::subject("user", "alice"),
        );
        let opts = ReverseQueryOptions::builder()
            .limit_for_reverse(10)
            .after_for_reverse(after.clone())
            .res_relation(ResourceRelation::new("document", "viewer"))
            .build();

        let forward = opts.to_query_options();
        assert_eq!(forward.limit, Some(10));
        assert_eq!(forward.after, Some(after));
        assert_eq!(forward.sort, SortOrder::BySubject);
    }
}
