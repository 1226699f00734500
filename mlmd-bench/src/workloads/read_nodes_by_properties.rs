use std::collections::HashMap;

use mlmd_store::{Id, MetadataStore, Node, NodeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::{ReadNodesByPropertiesConfig, ReadNodesByPropertiesSpecification};
use crate::util::{existing_nodes, existing_types, node_bytes};
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// A read of nodes by id, type or name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadNodesRequest {
    /// The node of a kind with the given id.
    ById(NodeKind, Id),
    /// All nodes of a kind whose type has the given name.
    ByType(NodeKind, String),
    /// The node of a kind with the given type name and node name.
    ByTypeAndName(NodeKind, String, String),
}

/// Reads a random node by id, all nodes of a random type, or a random node by type and name.
#[derive(Debug)]
pub struct ReadNodesByProperties {
    config: ReadNodesByPropertiesConfig,
}

impl ReadNodesByProperties {
    /// Creates the generator.
    pub fn new(config: &ReadNodesByPropertiesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn kind(&self) -> NodeKind {
        use ReadNodesByPropertiesSpecification::*;
        match self.config.specification {
            ArtifactsById | ArtifactsByType | ArtifactByTypeAndName => NodeKind::Artifact,
            ExecutionsById | ExecutionsByType | ExecutionByTypeAndName => NodeKind::Execution,
            ContextsById | ContextsByType | ContextByTypeAndName => NodeKind::Context,
        }
    }

    fn pick<'a>(&self, nodes: &'a [Node], rng: &mut SmallRng) -> Result<&'a Node> {
        if nodes.is_empty() {
            return Err(Error::FailedPrecondition(format!(
                "no {}s to read",
                self.kind()
            )));
        }
        Ok(&nodes[rng.random_range(0..nodes.len())])
    }
}

impl Generator for ReadNodesByProperties {
    type Request = ReadNodesRequest;

    fn name(&self) -> String {
        use ReadNodesByPropertiesSpecification::*;
        let kind = self.kind();
        match self.config.specification {
            ArtifactsById | ExecutionsById | ContextsById => format!("read_{kind}s_by_id"),
            ArtifactsByType | ExecutionsByType | ContextsByType => format!("read_{kind}s_by_type"),
            ArtifactByTypeAndName | ExecutionByTypeAndName | ContextByTypeAndName => {
                format!("read_{kind}_by_type_and_name")
            }
        }
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<ReadNodesRequest>>> {
        use ReadNodesByPropertiesSpecification::*;

        let kind = self.kind();
        let nodes = existing_nodes(kind, store)?;
        let mut work_items = Vec::with_capacity(num_operations);

        match self.config.specification {
            ArtifactsById | ExecutionsById | ContextsById => {
                for _ in 0..num_operations {
                    let node = self.pick(&nodes, rng)?;
                    let id = node.id.ok_or_else(|| {
                        Error::InvalidArgument(format!("{kind} without id"))
                    })?;
                    work_items.push(WorkItem::new(
                        ReadNodesRequest::ById(kind, id),
                        node_bytes(node),
                    ));
                }
            }
            ArtifactsByType | ExecutionsByType | ContextsByType => {
                let types = existing_types(kind.type_kind(), store)?;
                if types.is_empty() {
                    return Err(Error::FailedPrecondition(format!(
                        "no {}s to read {kind}s of",
                        kind.type_kind()
                    )));
                }
                let mut bytes_by_type: HashMap<&str, u64> = HashMap::new();
                for node in &nodes {
                    *bytes_by_type.entry(node.type_name.as_str()).or_default() += node_bytes(node);
                }

                for _ in 0..num_operations {
                    let ty = &types[rng.random_range(0..types.len())];
                    let bytes = bytes_by_type.get(ty.name.as_str()).copied().unwrap_or(0);
                    work_items.push(WorkItem::new(
                        ReadNodesRequest::ByType(kind, ty.name.clone()),
                        bytes,
                    ));
                }
            }
            ArtifactByTypeAndName | ExecutionByTypeAndName | ContextByTypeAndName => {
                let named: Vec<Node> = nodes.into_iter().filter(|n| n.name.is_some()).collect();
                for _ in 0..num_operations {
                    let node = self.pick(&named, rng)?;
                    let request = ReadNodesRequest::ByTypeAndName(
                        kind,
                        node.type_name.clone(),
                        node.name.clone().unwrap_or_default(),
                    );
                    work_items.push(WorkItem::new(request, node_bytes(node)));
                }
            }
        }

        Ok(work_items)
    }

    fn execute(&self, request: &ReadNodesRequest, store: &dyn MetadataStore) -> Result<()> {
        match request {
            ReadNodesRequest::ById(kind, id) => {
                store.get_nodes_by_id(*kind, &[*id])?;
            }
            ReadNodesRequest::ByType(kind, type_name) => {
                store.get_nodes_by_type(*kind, type_name)?;
            }
            ReadNodesRequest::ByTypeAndName(kind, type_name, name) => {
                store.get_node_by_type_and_name(*kind, type_name, name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mlmd_store::{ConnectionConfig, connect};

    use super::*;
    use crate::util::{insert_nodes_in_db, insert_types_in_db};
    use crate::workload::{GeneratedWorkload, Workload};

    fn workload(
        specification: ReadNodesByPropertiesSpecification,
        n: usize,
    ) -> GeneratedWorkload<ReadNodesByProperties> {
        let generator = ReadNodesByProperties::new(&ReadNodesByPropertiesConfig { specification });
        GeneratedWorkload::new(generator, n, 41)
    }

    #[test]
    fn names() {
        use ReadNodesByPropertiesSpecification::*;
        assert_eq!(workload(ArtifactsById, 1).name(), "read_artifacts_by_id");
        assert_eq!(workload(ExecutionsByType, 1).name(), "read_executions_by_type");
        assert_eq!(
            workload(ContextByTypeAndName, 1).name(),
            "read_context_by_type_and_name"
        );
    }

    #[test]
    fn requires_nodes() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(1, 0, 0, store.as_ref()).unwrap();
        let mut workload = workload(ReadNodesByPropertiesSpecification::ArtifactsById, 1);
        assert!(matches!(
            workload.prepare(store.as_ref()),
            Err(Error::FailedPrecondition(_))
        ));
    }

    #[test]
    fn reads_every_shape() {
        use ReadNodesByPropertiesSpecification::*;

        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(2, 2, 2, store.as_ref()).unwrap();
        insert_nodes_in_db(10, 10, 10, store.as_ref()).unwrap();

        for specification in [
            ArtifactsById,
            ExecutionsById,
            ContextsById,
            ArtifactsByType,
            ExecutionsByType,
            ContextsByType,
            ArtifactByTypeAndName,
            ExecutionByTypeAndName,
            ContextByTypeAndName,
        ] {
            let mut workload = workload(specification, 10);
            workload.prepare(store.as_ref()).unwrap();
            for index in 0..10 {
                workload.execute(index, store.as_ref()).unwrap();
            }
            workload.teardown();
        }
    }

    #[test]
    fn by_type_counts_nodes_of_that_type() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(1, 0, 0, store.as_ref()).unwrap();
        insert_nodes_in_db(4, 0, 0, store.as_ref()).unwrap();
        let expected: u64 = store
            .get_nodes(NodeKind::Artifact)
            .unwrap()
            .iter()
            .map(node_bytes)
            .sum();

        let mut workload = workload(ReadNodesByPropertiesSpecification::ArtifactsByType, 3);
        workload.prepare(store.as_ref()).unwrap();
        for index in 0..3 {
            let op = workload.execute(index, store.as_ref()).unwrap();
            assert_eq!(op.transferred_bytes, expected);
        }
    }
}
