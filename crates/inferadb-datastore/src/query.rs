//! Query composition
//!
//! A [`Query`] is an immutable description of a row selection: a table plus a
//! conjunction of [`Predicate`]s. Every `filter_*` method returns a new query
//! and leaves the receiver untouched, so a base query can be shared and
//! narrowed independently by concurrent callers. Backends translate the
//! descriptor into their own statement language; the in-memory backend
//! evaluates it directly through [`Query::matches`].

use std::sync::Arc;

use inferadb_datastore_types::{
    DatastoreError, DatastoreResult, ELLIPSIS, RelationshipsFilter, Revision,
    SubjectRelationFilter, SubjectsSelector,
};

/// The row set a query selects from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Relationships,
    Namespaces,
}

/// Addressable columns. Namespace rows expose their name as
/// [`Column::Namespace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Namespace,
    ObjectId,
    Relation,
    SubjectNamespace,
    SubjectObjectId,
    SubjectRelation,
    CaveatName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(Column, String),
    In(Column, Vec<String>),
    NotEq(Column, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Row was created at or before the transaction and not deleted at or
    /// before it
    AliveAt(u64),
}

/// A row a [`Query`] can be evaluated against
pub trait QueryRow {
    /// The column's value, or `None` if the row has no value for it
    fn column(&self, column: Column) -> Option<&str>;

    /// Whether the row is visible to a snapshot at `transaction_id`
    fn alive_at(&self, transaction_id: u64) -> bool;
}

impl Predicate {
    pub fn matches<R: QueryRow + ?Sized>(&self, row: &R) -> bool {
        match self {
            Predicate::Eq(column, value) => row.column(*column) == Some(value.as_str()),
            Predicate::In(column, values) => {
                row.column(*column).is_some_and(|v| values.iter().any(|candidate| candidate == v))
            },
            Predicate::NotEq(column, value) => row.column(*column) != Some(value.as_str()),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(row)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(row)),
            Predicate::AliveAt(transaction_id) => row.alive_at(*transaction_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: Table,
    predicates: Vec<Predicate>,
}

impl Query {
    pub fn relationships() -> Self {
        Self { table: Table::Relationships, predicates: Vec::new() }
    }

    pub fn namespaces() -> Self {
        Self { table: Table::Namespaces, predicates: Vec::new() }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Add a predicate to the conjunction
    pub fn filter(&self, predicate: Predicate) -> Self {
        let mut predicates = self.predicates.clone();
        predicates.push(predicate);
        Self { table: self.table, predicates }
    }

    /// Add a disjunction of predicates
    pub fn filter_any_of(&self, predicates: Vec<Predicate>) -> Self {
        self.filter(Predicate::Or(predicates))
    }

    pub fn filter_to_resource_type(&self, resource_type: &str) -> Self {
        self.filter(Predicate::Eq(Column::Namespace, resource_type.to_string()))
    }

    pub fn filter_to_resource_ids(&self, resource_ids: &[String]) -> Self {
        self.filter(id_predicate(Column::ObjectId, resource_ids))
    }

    pub fn filter_to_relation(&self, relation: &str) -> Self {
        self.filter(Predicate::Eq(Column::Relation, relation.to_string()))
    }

    pub fn filter_to_subject_type(&self, subject_type: &str) -> Self {
        self.filter(Predicate::Eq(Column::SubjectNamespace, subject_type.to_string()))
    }

    pub fn filter_to_subject_ids(&self, subject_ids: &[String]) -> Self {
        self.filter(id_predicate(Column::SubjectObjectId, subject_ids))
    }

    /// [`SubjectRelationFilter::Any`] leaves the query unchanged
    pub fn filter_to_subject_relation(&self, relation_filter: &SubjectRelationFilter) -> Self {
        match relation_predicate(relation_filter) {
            Some(predicate) => self.filter(predicate),
            None => self.clone(),
        }
    }

    pub fn filter_to_caveat_name(&self, caveat_name: &str) -> Self {
        self.filter(Predicate::Eq(Column::CaveatName, caveat_name.to_string()))
    }

    /// Narrow the query by every field set on a relationships filter
    pub fn filter_with_relationships_filter(
        &self,
        filter: &RelationshipsFilter,
    ) -> DatastoreResult<Self> {
        if filter.resource_type.is_empty() {
            return Err(DatastoreError::QueryBuild("resource type must not be empty".to_string()));
        }
        check_ids("resource", &filter.optional_resource_ids)?;

        let mut query = self.filter_to_resource_type(&filter.resource_type);

        if !filter.optional_resource_ids.is_empty() {
            query = query.filter_to_resource_ids(&filter.optional_resource_ids);
        }

        if let Some(relation) = &filter.optional_relation {
            if relation.is_empty() {
                return Err(DatastoreError::QueryBuild("relation must not be empty".to_string()));
            }
            query = query.filter_to_relation(relation);
        }

        if let Some(caveat_name) = &filter.optional_caveat_name {
            if caveat_name.is_empty() {
                return Err(DatastoreError::QueryBuild(
                    "caveat name must not be empty".to_string(),
                ));
            }
            query = query.filter_to_caveat_name(caveat_name);
        }

        if !filter.optional_subjects_selectors.is_empty() {
            query = query.filter_with_subjects_selectors(&filter.optional_subjects_selectors)?;
        }

        Ok(query)
    }

    /// Match any of the given subject selectors
    pub fn filter_with_subjects_selectors(
        &self,
        selectors: &[SubjectsSelector],
    ) -> DatastoreResult<Self> {
        if selectors.is_empty() {
            return Err(DatastoreError::QueryBuild(
                "at least one subjects selector is required".to_string(),
            ));
        }

        let mut alternatives = Vec::with_capacity(selectors.len());
        for selector in selectors {
            if selector.is_empty() {
                return Err(DatastoreError::QueryBuild(
                    "subjects selector must set at least one field".to_string(),
                ));
            }
            check_ids("subject", &selector.optional_subject_ids)?;

            let mut conjunction = Vec::new();
            if let Some(subject_type) = &selector.optional_subject_type {
                if subject_type.is_empty() {
                    return Err(DatastoreError::QueryBuild(
                        "subject type must not be empty".to_string(),
                    ));
                }
                conjunction.push(Predicate::Eq(Column::SubjectNamespace, subject_type.clone()));
            }
            if !selector.optional_subject_ids.is_empty() {
                conjunction.push(id_predicate(Column::SubjectObjectId, &selector.optional_subject_ids));
            }
            conjunction.extend(relation_predicate(&selector.relation_filter));

            alternatives.push(Predicate::And(conjunction));
        }

        Ok(self.filter_any_of(alternatives))
    }

    /// Evaluate the query against a row
    pub fn matches<R: QueryRow + ?Sized>(&self, row: &R) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

fn id_predicate(column: Column, ids: &[String]) -> Predicate {
    match ids {
        [single] => Predicate::Eq(column, single.clone()),
        _ => Predicate::In(column, ids.to_vec()),
    }
}

fn relation_predicate(relation_filter: &SubjectRelationFilter) -> Option<Predicate> {
    match relation_filter {
        SubjectRelationFilter::Any => None,
        SubjectRelationFilter::Ellipsis => {
            Some(Predicate::Eq(Column::SubjectRelation, ELLIPSIS.to_string()))
        },
        SubjectRelationFilter::NonEllipsis => {
            Some(Predicate::NotEq(Column::SubjectRelation, ELLIPSIS.to_string()))
        },
        SubjectRelationFilter::Relation(relation) => {
            Some(Predicate::Eq(Column::SubjectRelation, relation.clone()))
        },
    }
}

fn check_ids(kind: &str, ids: &[String]) -> DatastoreResult<()> {
    if ids.iter().any(String::is_empty) {
        return Err(DatastoreError::QueryBuild(format!("{} ids must not be empty strings", kind)));
    }
    Ok(())
}

/// Rewrites a base query before it is narrowed, e.g. to restrict it to a
/// snapshot
pub type QueryFilterer = Arc<dyn Fn(Query) -> Query + Send + Sync>;

/// A filterer that returns the query unchanged
pub fn unfiltered() -> QueryFilterer {
    Arc::new(|query| query)
}

/// The filterer restricting queries to the snapshot at `revision`
///
/// Transaction revisions select rows alive at that transaction. Timestamp
/// revisions are left to the backend, which reads them `AS OF` the
/// timestamp.
pub fn snapshot_filterer(revision: Revision) -> DatastoreResult<QueryFilterer> {
    match revision {
        Revision::Transaction(transaction_id) => {
            Ok(Arc::new(move |query: Query| query.filter(Predicate::AliveAt(transaction_id))))
        },
        Revision::Timestamp(_) => Ok(unfiltered()),
        Revision::NoRevision => {
            Err(DatastoreError::QueryBuild("cannot read at an unset revision".to_string()))
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Row {
        columns: HashMap<Column, &'static str>,
        created: u64,
        deleted: Option<u64>,
    }

    impl Row {
        fn relationship(tuple: [&'static str; 6]) -> Self {
            let columns = [
                Column::Namespace,
                Column::ObjectId,
                Column::Relation,
                Column::SubjectNamespace,
                Column::SubjectObjectId,
                Column::SubjectRelation,
            ]
            .into_iter()
            .zip(tuple)
            .collect();
            Self { columns, created: 1, deleted: None }
        }
    }

    impl QueryRow for Row {
        fn column(&self, column: Column) -> Option<&str> {
            self.columns.get(&column).copied()
        }

        fn alive_at(&self, transaction_id: u64) -> bool {
            self.created <= transaction_id && self.deleted.is_none_or(|d| d > transaction_id)
        }
    }

    fn alice_views_readme() -> Row {
        Row::relationship(["document", "readme", "viewer", "user", "alice", "..."])
    }

    fn eng_members_edit_readme() -> Row {
        Row::relationship(["document", "readme", "editor", "group", "eng", "member"])
    }

    #[test]
    fn test_filters_do_not_mutate_base_query() {
        let base = Query::relationships();
        let narrowed = base.filter_to_resource_type("document");

        assert!(base.predicates().is_empty());
        assert_eq!(narrowed.predicates().len(), 1);
        assert_eq!(narrowed.table(), Table::Relationships);
    }

    #[test]
    fn test_relationships_filter_matches_fields() {
        let filter = RelationshipsFilter::builder()
            .resource_type("document")
            .optional_resource_ids(vec!["readme".to_string(), "guide".to_string()])
            .optional_relation("viewer")
            .build();
        let query = Query::relationships().filter_with_relationships_filter(&filter).unwrap();

        assert!(query.matches(&alice_views_readme()));
        assert!(!query.matches(&eng_members_edit_readme()));
    }

    #[test]
    fn test_subject_selectors_are_alternatives() {
        let selectors = vec![
            SubjectsSelector::builder()
                .optional_subject_type("user")
                .optional_subject_ids(vec!["bob".to_string()])
                .build(),
            SubjectsSelector::builder().relation_filter(SubjectRelationFilter::NonEllipsis).build(),
        ];
        let query = Query::relationships().filter_with_subjects_selectors(&selectors).unwrap();

        assert!(!query.matches(&alice_views_readme()));
        assert!(query.matches(&eng_members_edit_readme()));
    }

    #[test]
    fn test_subject_relation_filters() {
        let direct = Query::relationships().filter_to_subject_relation(&SubjectRelationFilter::Ellipsis);
        assert!(direct.matches(&alice_views_readme()));
        assert!(!direct.matches(&eng_members_edit_readme()));

        let member = Query::relationships()
            .filter_to_subject_relation(&SubjectRelationFilter::Relation("member".to_string()));
        assert!(member.matches(&eng_members_edit_readme()));

        let any = Query::relationships().filter_to_subject_relation(&SubjectRelationFilter::Any);
        assert_eq!(any, Query::relationships());
    }

    #[test]
    fn test_caveat_filter_requires_caveat() {
        let query = Query::relationships().filter_to_caveat_name("only_weekdays");
        assert!(!query.matches(&alice_views_readme()));

        let mut caveated = alice_views_readme();
        caveated.columns.insert(Column::CaveatName, "only_weekdays");
        assert!(query.matches(&caveated));
    }

    #[test]
    fn test_invalid_compositions_fail() {
        let empty_type = RelationshipsFilter::for_resource_type("");
        assert!(matches!(
            Query::relationships().filter_with_relationships_filter(&empty_type),
            Err(DatastoreError::QueryBuild(_))
        ));

        let empty_id = RelationshipsFilter::builder()
            .resource_type("document")
            .optional_resource_ids(vec![String::new()])
            .build();
        assert!(Query::relationships().filter_with_relationships_filter(&empty_id).is_err());

        assert!(Query::relationships().filter_with_subjects_selectors(&[]).is_err());
        assert!(
            Query::relationships()
                .filter_with_subjects_selectors(&[SubjectsSelector::default()])
                .is_err()
        );
    }

    #[test]
    fn test_snapshot_filterer() {
        let mut row = alice_views_readme();
        row.created = 5;
        row.deleted = Some(8);

        let at = |tx: u64| snapshot_filterer(Revision::for_transaction_id(tx)).unwrap()(Query::relationships());
        assert!(!at(4).matches(&row));
        assert!(at(5).matches(&row));
        assert!(at(7).matches(&row));
        assert!(!at(8).matches(&row));

        let timestamp = snapshot_filterer(Revision::from_nanos(100)).unwrap();
        assert_eq!(timestamp(Query::relationships()), Query::relationships());

        assert!(matches!(
            snapshot_filterer(Revision::NoRevision),
            Err(DatastoreError::QueryBuild(_))
        ));
    }

    #[test]
    fn test_namespace_name_alternatives() {
        let mut row = Row { columns: HashMap::new(), created: 1, deleted: None };
        row.columns.insert(Column::Namespace, "folder");

        let query = Query::namespaces().filter_any_of(vec![
            Predicate::Eq(Column::Namespace, "document".to_string()),
            Predicate::Eq(Column::Namespace, "folder".to_string()),
        ]);
        assert!(query.matches(&row));
        assert!(!Query::namespaces().filter_to_resource_type("user").matches(&row));
    }
}
