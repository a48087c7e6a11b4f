//! Test fixtures for InferaDB datastore test suites
//!
//! Relationship and namespace builders, shared schema definitions and the
//! tiered proptest configuration used across the datastore crates.

#![deny(unsafe_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod proptest_config;
pub mod relationships;
pub mod schemas;

pub use relationships::{test_caveated_relationship, test_relationship, test_userset_relationship};
pub use schemas::{document_namespace, folder_namespace, user_namespace};

/// Install a test-writer tracing subscriber
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
