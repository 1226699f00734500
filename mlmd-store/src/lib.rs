//! The metadata store the benchmark drives.
//!
//! The store keeps schemas ([`Type`]s), entities ([`Node`]s) and the edges between them. It is
//! accessed exclusively through the [`MetadataStore`] trait, so the benchmark engine never depends
//! on a concrete backend. Connections are opened from a [`ConnectionConfig`] with [`connect`].
//!
//! The only backend shipped with this crate keeps all data in memory. Named in-memory databases
//! are shared by every connection opened with the same name for the lifetime of the process.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod backend;
mod error;
mod types;

use serde::{Deserialize, Serialize};

pub use crate::backend::{BoxedStore, InMemoryStore, MetadataStore, drop_database};
pub use crate::error::{Result, StoreError};
pub use crate::types::*;

/// Describes how to reach a metadata store.
///
/// The `type` field in YAML determines which variant is used.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// A named in-memory database shared by all connections with the same name.
    ///
    /// # Example
    ///
    /// ```yaml
    /// mlmd_config:
    ///   type: in_memory
    ///   name: bench
    /// ```
    InMemory {
        /// Name of the database within this process.
        name: String,
    },

    /// A private, empty in-memory database for every connection.
    ///
    /// Data written through one connection is never visible to another one.
    FakeDatabase,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::InMemory {
            name: "mlmd-bench".into(),
        }
    }
}

/// Opens a new connection to the store described by `config`.
pub fn connect(config: &ConnectionConfig) -> Result<BoxedStore> {
    let store = match config {
        ConnectionConfig::InMemory { name } => InMemoryStore::shared(name)?,
        ConnectionConfig::FakeDatabase => InMemoryStore::new(),
    };
    Ok(Box::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_connections_share_data() {
        let config = ConnectionConfig::InMemory {
            name: "lib-tests-shared".into(),
        };
        let first = connect(&config).unwrap();
        let second = connect(&config).unwrap();

        first
            .put_type(TypeKind::Artifact, &Type::new("a"), Default::default())
            .unwrap();

        assert_eq!(second.get_types(TypeKind::Artifact).unwrap().len(), 1);
        drop_database("lib-tests-shared");
    }

    #[test]
    fn fake_connections_are_isolated() {
        let first = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let second = connect(&ConnectionConfig::FakeDatabase).unwrap();

        first
            .put_type(TypeKind::Execution, &Type::new("e"), Default::default())
            .unwrap();

        assert!(second.get_types(TypeKind::Execution).unwrap().is_empty());
    }

    #[test]
    fn connection_config_from_yaml_shape() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"type": "in_memory", "name": "bench"}"#).unwrap();
        assert_eq!(
            config,
            ConnectionConfig::InMemory {
                name: "bench".into()
            }
        );
    }
}
