//! Namespace definition encoding

use inferadb_datastore_types::{DatastoreResult, NamespaceDefinition};

/// Converts stored namespace configs to and from definitions
pub trait NamespaceCodec: Send + Sync {
    fn decode(&self, config: &[u8]) -> DatastoreResult<NamespaceDefinition>;

    fn encode(&self, definition: &NamespaceDefinition) -> DatastoreResult<Vec<u8>>;
}

/// JSON encoding of namespace definitions
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonNamespaceCodec;

impl NamespaceCodec for JsonNamespaceCodec {
    fn decode(&self, config: &[u8]) -> DatastoreResult<NamespaceDefinition> {
        Ok(serde_json::from_slice(config)?)
    }

    fn encode(&self, definition: &NamespaceDefinition) -> DatastoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(definition)?)
    }
}
