use std::collections::HashSet;

use mlmd_store::{Association, Attribution, Id, MetadataStore, NodeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::{FillContextEdgesConfig, FillContextEdgesSpecification};
use crate::util::existing_nodes;
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// Size of a context edge: the ids of both endpoints.
const EDGE_BYTES: u64 = 8;

/// A single attribution or association.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextEdge {
    /// Attributes an artifact to a context.
    Attribution(Attribution),
    /// Associates an execution with a context.
    Association(Association),
}

/// Creates attributions or associations between existing nodes and contexts.
///
/// Every generated edge is new: it is neither stored yet nor generated twice.
#[derive(Debug)]
pub struct FillContextEdges {
    config: FillContextEdgesConfig,
}

impl FillContextEdges {
    /// Creates the generator.
    pub fn new(config: &FillContextEdgesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn kind(&self) -> NodeKind {
        self.config.specification.kind()
    }

    /// Returns the `(node, context)` pairs already linked in `store`.
    fn existing_edges(&self, contexts: &[Id], store: &dyn MetadataStore) -> Result<HashSet<(Id, Id)>> {
        let mut edges = HashSet::new();
        for &context_id in contexts {
            let nodes = match self.config.specification {
                FillContextEdgesSpecification::Attribution => {
                    store.get_artifacts_by_context(context_id)?
                }
                FillContextEdgesSpecification::Association => {
                    store.get_executions_by_context(context_id)?
                }
            };
            edges.extend(nodes.into_iter().filter_map(|node| Some((node.id?, context_id))));
        }
        Ok(edges)
    }
}

impl Generator for FillContextEdges {
    type Request = ContextEdge;

    fn name(&self) -> String {
        match self.config.specification {
            FillContextEdgesSpecification::Attribution => "fill_attribution".into(),
            FillContextEdgesSpecification::Association => "fill_association".into(),
        }
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<ContextEdge>>> {
        let ids = |kind| -> Result<Vec<Id>> {
            Ok(existing_nodes(kind, store)?
                .into_iter()
                .filter_map(|node| node.id)
                .collect())
        };
        let nodes = ids(self.kind())?;
        let contexts = ids(NodeKind::Context)?;

        let mut edges = self.existing_edges(&contexts, store)?;
        let free = (nodes.len() * contexts.len()).saturating_sub(edges.len());
        if free < num_operations {
            return Err(Error::FailedPrecondition(format!(
                "{free} unlinked pairs of {} and context, {num_operations} needed",
                self.kind()
            )));
        }

        let mut work_items = Vec::with_capacity(num_operations);
        while work_items.len() < num_operations {
            let node_id = nodes[rng.random_range(0..nodes.len())];
            let context_id = contexts[rng.random_range(0..contexts.len())];
            if !edges.insert((node_id, context_id)) {
                continue;
            }

            let edge = match self.config.specification {
                FillContextEdgesSpecification::Attribution => {
                    ContextEdge::Attribution(Attribution {
                        artifact_id: node_id,
                        context_id,
                    })
                }
                FillContextEdgesSpecification::Association => {
                    ContextEdge::Association(Association {
                        execution_id: node_id,
                        context_id,
                    })
                }
            };
            work_items.push(WorkItem::new(edge, EDGE_BYTES));
        }

        Ok(work_items)
    }

    fn execute(&self, request: &ContextEdge, store: &dyn MetadataStore) -> Result<()> {
        match request {
            ContextEdge::Attribution(attribution) => {
                store.put_attributions_and_associations(std::slice::from_ref(attribution), &[])?
            }
            ContextEdge::Association(association) => {
                store.put_attributions_and_associations(&[], std::slice::from_ref(association))?
            }
        }
        Ok(())
    }
}
