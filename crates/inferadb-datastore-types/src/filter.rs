//! Relationship selectors
//!
//! These are plain descriptions of what to select. The query composer in
//! `inferadb-datastore` turns them into predicates; nothing here interprets
//! them beyond simple emptiness checks.

use serde::{Deserialize, Serialize};

/// Which subject relations a selector accepts
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectRelationFilter {
    /// Any relation, ellipsis included
    #[default]
    Any,
    /// Only direct subjects (`...`)
    Ellipsis,
    /// Only userset subjects (anything but `...`)
    NonEllipsis,
    /// Exactly this relation
    Relation(String),
}

impl SubjectRelationFilter {
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Selects subjects by type, ids and relation
///
/// At least one field must be set; an empty selector would match every
/// subject and is rejected when the query is composed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct SubjectsSelector {
    pub optional_subject_type: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub optional_subject_ids: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub relation_filter: SubjectRelationFilter,
}

impl SubjectsSelector {
    /// Returns true if no field is set
    pub fn is_empty(&self) -> bool {
        self.optional_subject_type.is_none()
            && self.optional_subject_ids.is_empty()
            && self.relation_filter.is_any()
    }
}

/// Filter for forward relationship queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct RelationshipsFilter {
    /// Resource type (e.g., "document"); required
    pub resource_type: String,
    /// Resource object ids; empty means any
    #[builder(default)]
    #[serde(default)]
    pub optional_resource_ids: Vec<String>,
    /// Resource relation (e.g., "viewer")
    pub optional_relation: Option<String>,
    /// Subject selectors, combined with OR; empty means any subject
    #[builder(default)]
    #[serde(default)]
    pub optional_subjects_selectors: Vec<SubjectsSelector>,
    /// Only relationships carrying this caveat
    pub optional_caveat_name: Option<String>,
}

impl RelationshipsFilter {
    /// Filter for every relationship on a resource type
    pub fn for_resource_type(resource_type: impl Into<String>) -> Self {
        Self::builder().resource_type(resource_type).build()
    }
}

/// Filter for reverse (subject-first) relationship queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct SubjectsFilter {
    /// Subject type (e.g., "user"); required
    pub subject_type: String,
    #[builder(default)]
    #[serde(default)]
    pub optional_subject_ids: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub relation_filter: SubjectRelationFilter,
}

impl SubjectsFilter {
    /// The equivalent subjects selector
    pub fn as_selector(&self) -> SubjectsSelector {
        SubjectsSelector {
            optional_subject_type: Some(self.subject_type.clone()),
            optional_subject_ids: self.optional_subject_ids.clone(),
            relation_filter: self.relation_filter.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_relationships_filter_builder() {
        let filter = RelationshipsFilter::builder()
            .resource_type("document")
            .optional_resource_ids(vec!["readme".to_string()])
            .optional_relation("viewer")
            .build();
        assert_eq!(filter.resource_type, "document");
        assert_eq!(filter.optional_resource_ids, vec!["readme".to_string()]);
        assert_eq!(filter.optional_relation, Some("viewer".to_string()));
        assert!(filter.optional_subjects_selectors.is_empty());
        assert!(filter.optional_caveat_name.is_none());
    }

    #[test]
    fn test_empty_selector_detection() {
        assert!(SubjectsSelector::default().is_empty());
        assert!(!SubjectsSelector::builder().optional_subject_type("user").build().is_empty());
        assert!(
            !SubjectsSelector::builder()
                .relation_filter(SubjectRelationFilter::Ellipsis)
                .build()
                .is_empty()
        );
    }

    #[test]
    fn test_subjects_filter_as_selector() {
        let filter = SubjectsFilter::builder()
            .subject_type("user")
            .optional_subject_ids(vec!["alice".to_string()])
            .relation_filter(SubjectRelationFilter::Ellipsis)
            .build();

        let selector = filter.as_selector();
        assert_eq!(selector.optional_subject_type.as_deref(), Some("user"));
        assert_eq!(selector.optional_subject_ids, vec!["alice".to_string()]);
        assert_eq!(selector.relation_filter, SubjectRelationFilter::Ellipsis);
    }
}
