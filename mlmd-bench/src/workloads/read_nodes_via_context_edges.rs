use std::collections::HashMap;

use mlmd_store::{Id, MetadataStore, Node, NodeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::{ReadNodesViaContextEdgesConfig, ReadNodesViaContextEdgesSpecification};
use crate::util::{existing_nodes, node_bytes};
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// Reads the nodes linked to a random node by attributions or associations.
///
/// Requests are the id of the node whose neighbours are read.
#[derive(Debug)]
pub struct ReadNodesViaContextEdges {
    config: ReadNodesViaContextEdgesConfig,
}

impl ReadNodesViaContextEdges {
    /// Creates the generator.
    pub fn new(config: &ReadNodesViaContextEdgesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// The kind of node the read starts from.
    fn source_kind(&self) -> NodeKind {
        match self.config.specification {
            ReadNodesViaContextEdgesSpecification::ArtifactsByContext
            | ReadNodesViaContextEdgesSpecification::ExecutionsByContext => NodeKind::Context,
            ReadNodesViaContextEdgesSpecification::ContextsByArtifact => NodeKind::Artifact,
            ReadNodesViaContextEdgesSpecification::ContextsByExecution => NodeKind::Execution,
        }
    }

    fn read(&self, id: Id, store: &dyn MetadataStore) -> Result<Vec<Node>> {
        let nodes = match self.config.specification {
            ReadNodesViaContextEdgesSpecification::ArtifactsByContext => {
                store.get_artifacts_by_context(id)?
            }
            ReadNodesViaContextEdgesSpecification::ExecutionsByContext => {
                store.get_executions_by_context(id)?
            }
            ReadNodesViaContextEdgesSpecification::ContextsByArtifact => {
                store.get_contexts_by_artifact(id)?
            }
            ReadNodesViaContextEdgesSpecification::ContextsByExecution => {
                store.get_contexts_by_execution(id)?
            }
        };
        Ok(nodes)
    }
}

impl Generator for ReadNodesViaContextEdges {
    type Request = Id;

    fn name(&self) -> String {
        let name = match self.config.specification {
            ReadNodesViaContextEdgesSpecification::ArtifactsByContext => "artifacts_by_context",
            ReadNodesViaContextEdgesSpecification::ExecutionsByContext => "executions_by_context",
            ReadNodesViaContextEdgesSpecification::ContextsByArtifact => "contexts_by_artifact",
            ReadNodesViaContextEdgesSpecification::ContextsByExecution => "contexts_by_execution",
        };
        format!("read_{name}")
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<Id>>> {
        let ids: Vec<Id> = existing_nodes(self.source_kind(), store)?
            .into_iter()
            .filter_map(|node| node.id)
            .collect();
        if ids.is_empty() {
            return Err(Error::FailedPrecondition(format!(
                "no {}s to read from",
                self.source_kind()
            )));
        }

        let mut bytes_by_id = HashMap::new();
        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let id = ids[rng.random_range(0..ids.len())];
            let bytes = match bytes_by_id.get(&id) {
                Some(&bytes) => bytes,
                None => {
                    let bytes = self.read(id, store)?.iter().map(node_bytes).sum::<u64>();
                    bytes_by_id.insert(id, bytes);
                    bytes
                }
            };
            work_items.push(WorkItem::new(id, bytes));
        }

        Ok(work_items)
    }

    fn execute(&self, request: &Id, store: &dyn MetadataStore) -> Result<()> {
        self.read(*request, store)?;
        Ok(())
    }
}
