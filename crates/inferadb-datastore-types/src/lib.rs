//! # InferaDB Datastore Types
//!
//! Shared type definitions for the InferaDB revisioned datastore.
//!
//! This crate holds the value types that cross the boundary between the
//! consistency controller, the revisioned reader and the backends that plug
//! into them, so none of those crates depend on each other for their data model.

#![deny(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Revisions and Errors
// ============================================================================

pub mod error;
pub mod revision;

pub use error::{DatastoreError, DatastoreResult, InvalidRevisionReason, ResultExt};
pub use revision::{ParseRevisionError, Revision};

// ============================================================================
// Filters and Query Options
// ============================================================================

pub mod filter;
pub mod options;

pub use filter::{RelationshipsFilter, SubjectRelationFilter, SubjectsFilter, SubjectsSelector};
pub use options::{QueryOptions, ResourceRelation, ReverseQueryOptions, SortOrder};

// ============================================================================
// Relationship Types
// ============================================================================

/// Relation name used on a subject that refers to the object itself rather
/// than to a userset
pub const ELLIPSIS: &str = "...";

/// Object id denoting every object of a type
pub const WILDCARD: &str = "*";

/// An object reference with a relation, e.g. `document:readme#viewer`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectAndRelation {
    pub namespace: String,
    pub object_id: String,
    pub relation: String,
}

impl ObjectAndRelation {
    pub fn new(
        namespace: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self { namespace: namespace.into(), object_id: object_id.into(), relation: relation.into() }
    }

    /// A direct subject reference (`user:alice`), using the ellipsis relation
    pub fn subject(namespace: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::new(namespace, object_id, ELLIPSIS)
    }

    pub fn is_ellipsis(&self) -> bool {
        self.relation == ELLIPSIS
    }
}

impl fmt::Display for ObjectAndRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.object_id)?;
        if !self.is_ellipsis() {
            write!(f, "#{}", self.relation)?;
        }
        Ok(())
    }
}

/// A caveat attached to a relationship, with optional partial context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualizedCaveat {
    pub caveat_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ContextualizedCaveat {
    pub fn named(caveat_name: impl Into<String>) -> Self {
        Self { caveat_name: caveat_name.into(), context: None }
    }
}

/// An edge connecting a resource to a subject, optionally guarded by a caveat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub resource: ObjectAndRelation,
    pub subject: ObjectAndRelation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat: Option<ContextualizedCaveat>,
}

impl Relationship {
    pub fn new(resource: ObjectAndRelation, subject: ObjectAndRelation) -> Self {
        Self { resource, subject, caveat: None }
    }

    pub fn with_caveat(mut self, caveat: ContextualizedCaveat) -> Self {
        self.caveat = Some(caveat);
        self
    }

    /// Check if the subject is a wildcard (e.g., `user:*`)
    pub fn is_wildcard_subject(&self) -> bool {
        self.subject.object_id == WILDCARD
    }

    /// The caveat name, if the relationship is caveated
    pub fn caveat_name(&self) -> Option<&str> {
        self.caveat.as_ref().map(|c| c.caveat_name.as_str())
    }
}

/// Canonical tuple form: `document:readme#viewer@user:alice[only_weekdays]`
impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.resource.namespace, self.resource.object_id, self.resource.relation, self.subject
        )?;
        if let Some(name) = self.caveat_name() {
            write!(f, "[{}]", name)?;
        }
        Ok(())
    }
}

// ============================================================================
// Namespace Types
// ============================================================================

/// A relation declared on a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,
    /// Subject types allowed on this relation (e.g. `user`, `group#member`)
    #[serde(default)]
    pub allowed_subject_types: Vec<String>,
}

/// A named schema definition describing an object type and its relations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDefinition {
    pub name: String,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

impl NamespaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), relations: Vec::new() }
    }

    pub fn with_relation<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        allowed_subject_types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.relations.push(RelationDefinition {
            name: name.into(),
            allowed_subject_types: allowed_subject_types.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// A namespace definition paired with the revision at which it was last written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionedNamespace {
    pub definition: NamespaceDefinition,
    pub last_written_revision: Revision,
}
