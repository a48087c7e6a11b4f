//! Shared namespace definitions
//!
//! Definitions are immutable, so they are built once and shared across tests.
//! Backends are not: every test that writes needs its own.

use std::sync::OnceLock;

use inferadb_datastore_types::NamespaceDefinition;

/// `user` with no relations
pub fn user_namespace() -> &'static NamespaceDefinition {
    static USER: OnceLock<NamespaceDefinition> = OnceLock::new();
    USER.get_or_init(|| NamespaceDefinition::new("user"))
}

/// `folder` with `owner` and `viewer`
pub fn folder_namespace() -> &'static NamespaceDefinition {
    static FOLDER: OnceLock<NamespaceDefinition> = OnceLock::new();
    FOLDER.get_or_init(|| {
        NamespaceDefinition::new("folder")
            .with_relation("owner", ["user"])
            .with_relation("viewer", ["user", "user:*", "group#member"])
    })
}

/// `document` with `parent`, `editor` and `viewer`
pub fn document_namespace() -> &'static NamespaceDefinition {
    static DOCUMENT: OnceLock<NamespaceDefinition> = OnceLock::new();
    DOCUMENT.get_or_init(|| {
        NamespaceDefinition::new("document")
            .with_relation("parent", ["folder"])
            .with_relation("editor", ["user", "group#member"])
            .with_relation("viewer", ["user", "user:*", "group#member"])
    })
}
