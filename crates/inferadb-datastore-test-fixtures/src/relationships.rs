//! Relationship builders

use inferadb_datastore_types::{ContextualizedCaveat, ObjectAndRelation, Relationship};

/// Build a direct relationship, e.g. `document:readme#viewer@user:alice`
///
/// ```
/// use inferadb_datastore_test_fixtures::test_relationship;
///
/// let rel = test_relationship("document:readme", "viewer", "user:alice");
/// assert_eq!(rel.to_string(), "document:readme#viewer@user:alice");
/// ```
pub fn test_relationship(resource: &str, relation: &str, subject: &str) -> Relationship {
    let (namespace, object_id) = split_object(resource);
    let (subject_namespace, subject_id) = split_object(subject);
    Relationship::new(
        ObjectAndRelation::new(namespace, object_id, relation),
        ObjectAndRelation::subject(subject_namespace, subject_id),
    )
}

/// Build a relationship to a userset subject, e.g. `group:eng#member`
pub fn test_userset_relationship(
    resource: &str,
    relation: &str,
    subject: &str,
    subject_relation: &str,
) -> Relationship {
    let mut rel = test_relationship(resource, relation, subject);
    rel.subject.relation = subject_relation.to_string();
    rel
}

/// Build a direct relationship guarded by a caveat
pub fn test_caveated_relationship(
    resource: &str,
    relation: &str,
    subject: &str,
    caveat_name: &str,
) -> Relationship {
    test_relationship(resource, relation, subject).with_caveat(ContextualizedCaveat::named(caveat_name))
}

fn split_object(object: &str) -> (&str, &str) {
    object.split_once(':').expect("object must be written as type:id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userset_subject() {
        let rel = test_userset_relationship("document:readme", "viewer", "group:eng", "member");
        assert_eq!(rel.to_string(), "document:readme#viewer@group:eng#member");
    }

    #[test]
    fn test_caveated() {
        let rel = test_caveated_relationship("document:readme", "viewer", "user:*", "only_weekdays");
        assert!(rel.is_wildcard_subject());
        assert_eq!(rel.caveat_name(), Some("only_weekdays"));
    }
}
