use std::collections::HashSet;

use mlmd_store::{Event, EventType, Id, MetadataStore, NodeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::FillEventsConfig;
use crate::util::existing_nodes;
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// Size of an event: the ids of both endpoints.
const EVENT_BYTES: u64 = 16;

/// Creates input or output events between existing artifacts and executions.
///
/// An artifact is the output of at most one execution. Output events therefore only pick artifacts
/// that have no output event yet, neither in the store nor among the generated requests.
#[derive(Debug)]
pub struct FillEvents {
    config: FillEventsConfig,
}

impl FillEvents {
    /// Creates the generator.
    pub fn new(config: &FillEventsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn event_type(&self) -> EventType {
        self.config.specification.event_type()
    }
}

fn node_ids(kind: NodeKind, store: &dyn MetadataStore) -> Result<Vec<Id>> {
    Ok(existing_nodes(kind, store)?
        .into_iter()
        .filter_map(|node| node.id)
        .collect())
}

impl Generator for FillEvents {
    type Request = Event;

    fn name(&self) -> String {
        let event_type = match self.event_type() {
            EventType::Input => "input",
            EventType::Output => "output",
        };
        format!("fill_{event_type}_event")
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<Event>>> {
        let mut artifacts = node_ids(NodeKind::Artifact, store)?;
        let executions = node_ids(NodeKind::Execution, store)?;
        if artifacts.is_empty() || executions.is_empty() {
            return Err(Error::FailedPrecondition(
                "events need at least one artifact and one execution".into(),
            ));
        }

        if self.event_type() == EventType::Output {
            let outputs: HashSet<Id> = store
                .get_events_by_artifact_ids(&artifacts)?
                .into_iter()
                .filter(|event| event.event_type == EventType::Output)
                .map(|event| event.artifact_id)
                .collect();
            artifacts.retain(|id| !outputs.contains(id));
            if artifacts.len() < num_operations {
                return Err(Error::FailedPrecondition(format!(
                    "{} artifacts without an output event, {num_operations} needed",
                    artifacts.len()
                )));
            }
        }

        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let artifact_id = match self.event_type() {
                EventType::Input => artifacts[rng.random_range(0..artifacts.len())],
                EventType::Output => artifacts.swap_remove(rng.random_range(0..artifacts.len())),
            };
            let execution_id = executions[rng.random_range(0..executions.len())];

            let event = Event {
                artifact_id,
                execution_id,
                event_type: self.event_type(),
            };
            work_items.push(WorkItem::new(event, EVENT_BYTES));
        }

        Ok(work_items)
    }

    fn execute(&self, request: &Event, store: &dyn MetadataStore) -> Result<()> {
        store.put_events(std::slice::from_ref(request))?;
        Ok(())
    }
}
