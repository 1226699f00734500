use std::collections::HashMap;

use mlmd_store::{Id, MetadataStore, NodeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::{ReadEventsConfig, ReadEventsSpecification};
use crate::util::existing_nodes;
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// Size of an event: the ids of both endpoints.
const EVENT_BYTES: u64 = 16;

/// Reads the events of a random artifact or execution.
#[derive(Debug)]
pub struct ReadEvents {
    config: ReadEventsConfig,
}

impl ReadEvents {
    /// Creates the generator.
    pub fn new(config: &ReadEventsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn kind(&self) -> NodeKind {
        match self.config.specification {
            ReadEventsSpecification::EventsByArtifactIds => NodeKind::Artifact,
            ReadEventsSpecification::EventsByExecutionIds => NodeKind::Execution,
        }
    }

    fn read(&self, ids: &[Id], store: &dyn MetadataStore) -> Result<usize> {
        let events = match self.config.specification {
            ReadEventsSpecification::EventsByArtifactIds => store.get_events_by_artifact_ids(ids)?,
            ReadEventsSpecification::EventsByExecutionIds => {
                store.get_events_by_execution_ids(ids)?
            }
        };
        Ok(events.len())
    }
}

impl Generator for ReadEvents {
    type Request = Id;

    fn name(&self) -> String {
        format!("read_events_by_{}_ids", self.kind())
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<Id>>> {
        let ids: Vec<Id> = existing_nodes(self.kind(), store)?
            .into_iter()
            .filter_map(|node| node.id)
            .collect();
        if ids.is_empty() {
            return Err(Error::FailedPrecondition(format!(
                "no {}s to read events of",
                self.kind()
            )));
        }

        let mut events_by_id = HashMap::new();
        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let id = ids[rng.random_range(0..ids.len())];
            let events = match events_by_id.get(&id) {
                Some(&events) => events,
                None => {
                    let events = self.read(&[id], store)?;
                    events_by_id.insert(id, events);
                    events
                }
            };
            work_items.push(WorkItem::new(id, events as u64 * EVENT_BYTES));
        }

        Ok(work_items)
    }

    fn execute(&self, request: &Id, store: &dyn MetadataStore) -> Result<()> {
        self.read(std::slice::from_ref(request), store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mlmd_store::{ConnectionConfig, Event, EventType, connect};

    use super::*;
    use crate::util::{insert_nodes_in_db, insert_types_in_db};
    use crate::workload::{GeneratedWorkload, Workload};

    fn workload(specification: ReadEventsSpecification, n: usize) -> GeneratedWorkload<ReadEvents> {
        GeneratedWorkload::new(ReadEvents::new(&ReadEventsConfig { specification }), n, 61)
    }

    #[test]
    fn names() {
        assert_eq!(
            workload(ReadEventsSpecification::EventsByArtifactIds, 1).name(),
            "read_events_by_artifact_ids"
        );
        assert_eq!(
            workload(ReadEventsSpecification::EventsByExecutionIds, 1).name(),
            "read_events_by_execution_ids"
        );
    }

    #[test]
    fn estimates_returned_events() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(1, 1, 0, store.as_ref()).unwrap();
        insert_nodes_in_db(1, 3, 0, store.as_ref()).unwrap();

        let artifact_id = store.get_nodes(NodeKind::Artifact).unwrap()[0].id.unwrap();
        let events: Vec<_> = store
            .get_nodes(NodeKind::Execution)
            .unwrap()
            .into_iter()
            .map(|execution| Event {
                artifact_id,
                execution_id: execution.id.unwrap(),
                event_type: EventType::Input,
            })
            .collect();
        store.put_events(&events).unwrap();

        let mut by_artifact = workload(ReadEventsSpecification::EventsByArtifactIds, 4);
        by_artifact.prepare(store.as_ref()).unwrap();
        for index in 0..4 {
            let op = by_artifact.execute(index, store.as_ref()).unwrap();
            assert_eq!(op.transferred_bytes, 3 * EVENT_BYTES);
        }

        let mut by_execution = workload(ReadEventsSpecification::EventsByExecutionIds, 4);
        by_execution.prepare(store.as_ref()).unwrap();
        for index in 0..4 {
            let op = by_execution.execute(index, store.as_ref()).unwrap();
            assert_eq!(op.transferred_bytes, EVENT_BYTES);
        }
    }

    #[test]
    fn requires_nodes() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let mut workload = workload(ReadEventsSpecification::EventsByExecutionIds, 1);
        assert!(matches!(
            workload.prepare(store.as_ref()),
            Err(Error::FailedPrecondition(_))
        ));
    }
}
