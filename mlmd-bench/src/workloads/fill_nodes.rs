use std::collections::HashSet;

use mlmd_store::{Id, MetadataStore, Node, NodeKind, PropertyType, Type, Value};
use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::Uniform;

use crate::config::FillNodesConfig;
use crate::util::{existing_nodes, existing_types, node_bytes, random_string, sample_count};
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// Nodes to write with [`MetadataStore::put_nodes`].
#[derive(Clone, Debug)]
pub struct PutNodesRequest {
    /// The kind of the nodes.
    pub kind: NodeKind,
    /// The nodes. Nodes with an id replace the stored node.
    pub nodes: Vec<Node>,
}

/// Creates new artifacts, executions or contexts, or adds properties to existing ones.
#[derive(Debug)]
pub struct FillNodes {
    config: FillNodesConfig,
    num_properties: Uniform<u64>,
    string_value_bytes: Uniform<u64>,
}

impl FillNodes {
    /// Creates the generator, validating the configured ranges.
    pub fn new(config: &FillNodesConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            num_properties: config.num_properties.sampler()?,
            string_value_bytes: config.string_value_bytes.sampler()?,
        })
    }

    fn kind(&self) -> NodeKind {
        self.config.specification.kind()
    }

    fn random_value(&self, property_type: PropertyType, rng: &mut SmallRng) -> Value {
        match property_type {
            PropertyType::Int => Value::Int(rng.random()),
            PropertyType::Double => Value::Double(rng.random()),
            PropertyType::String => {
                let len = sample_count(&self.string_value_bytes, rng);
                Value::String(random_string(len, rng))
            }
        }
    }

    fn generate_inserts(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutNodesRequest>>> {
        let types: Vec<(Id, Type)> = existing_types(self.kind().type_kind(), store)?
            .into_iter()
            .filter_map(|ty| Some((ty.id?, ty)))
            .collect();
        if types.is_empty() {
            return Err(Error::FailedPrecondition(format!(
                "no {} to create {}s of",
                self.kind().type_kind(),
                self.kind()
            )));
        }

        let existing = existing_nodes(self.kind(), store)?;
        let mut next = existing.len();
        let mut taken: HashSet<(Id, String)> = existing
            .into_iter()
            .filter_map(|node| Some((node.type_id, node.name?)))
            .collect();

        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let (type_id, ty) = &types[rng.random_range(0..types.len())];
            let name = loop {
                let name = format!("node_{next}");
                next += 1;
                if taken.insert((*type_id, name.clone())) {
                    break name;
                }
            };

            let mut node = Node::new(*type_id).with_name(name);
            node.type_name = ty.name.clone();

            let num_properties = sample_count(&self.num_properties, rng);
            for (name, property_type) in ty.properties.iter().take(num_properties) {
                let value = self.random_value(*property_type, rng);
                node.properties.insert(name.clone(), value);
            }
            for i in node.properties.len()..num_properties {
                let value = self.random_value(PropertyType::String, rng);
                node.custom_properties.insert(format!("custom_p-{i}"), value);
            }

            let bytes = node_bytes(&node);
            let request = PutNodesRequest {
                kind: self.kind(),
                nodes: vec![node],
            };
            work_items.push(WorkItem::new(request, bytes));
        }

        Ok(work_items)
    }

    fn generate_updates(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutNodesRequest>>> {
        let mut existing = existing_nodes(self.kind(), store)?;
        if existing.len() < num_operations {
            self.make_up(store, num_operations - existing.len(), rng)?;
            existing = existing_nodes(self.kind(), store)?;
        }
        if existing.len() < num_operations {
            return Err(Error::FailedPrecondition(format!(
                "{} {}s exist, {num_operations} needed for updates",
                existing.len(),
                self.kind()
            )));
        }

        let mut work_items = Vec::with_capacity(num_operations);
        for mut node in existing.into_iter().take(num_operations) {
            let added = sample_count(&self.num_properties, rng).max(1);
            let mut next = node.num_properties();
            for _ in 0..added {
                let name = loop {
                    let name = format!("update_p-{next}");
                    next += 1;
                    if !node.custom_properties.contains_key(&name) {
                        break name;
                    }
                };
                let value = self.random_value(PropertyType::String, rng);
                node.custom_properties.insert(name, value);
            }

            let bytes = node_bytes(&node);
            let request = PutNodesRequest {
                kind: self.kind(),
                nodes: vec![node],
            };
            work_items.push(WorkItem::new(request, bytes));
        }

        Ok(work_items)
    }

    /// Inserts `missing` new nodes so that there are enough nodes to update.
    fn make_up(&self, store: &dyn MetadataStore, missing: usize, rng: &mut SmallRng) -> Result<()> {
        tracing::info!(kind = %self.kind(), missing, "inserting nodes to update");

        let work_items = self.generate_inserts(store, missing, rng)?;
        for item in &work_items {
            if let Err(error) = self.execute(&item.request, store) {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "failed to insert {}",
                    self.kind()
                );
            }
        }
        Ok(())
    }
}

impl Generator for FillNodes {
    type Request = PutNodesRequest;

    fn name(&self) -> String {
        let mut name = format!("fill_{}", self.kind());
        if self.config.update {
            name.push_str("(update)");
        }
        name
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutNodesRequest>>> {
        if self.config.update {
            self.generate_updates(store, num_operations, rng)
        } else {
            self.generate_inserts(store, num_operations, rng)
        }
    }

    fn execute(&self, request: &PutNodesRequest, store: &dyn MetadataStore) -> Result<()> {
        store.put_nodes(request.kind, &request.nodes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mlmd_store::{ConnectionConfig, TypeKind, connect};

    use super::*;
    use crate::config::{FillNodesSpecification, UniformDistribution};
    use crate::util::{insert_nodes_in_db, insert_types_in_db};
    use crate::workload::{GeneratedWorkload, Workload};

    fn config(specification: FillNodesSpecification, update: bool) -> FillNodesConfig {
        FillNodesConfig {
            specification,
            update,
            num_properties: UniformDistribution::new(1, 5),
            string_value_bytes: UniformDistribution::new(4, 16),
        }
    }

    fn run(workload: &mut dyn Workload, store: &dyn MetadataStore) {
        workload.prepare(store).unwrap();
        for index in 0..workload.num_operations() {
            workload.execute(index, store).unwrap();
        }
        workload.teardown();
    }

    #[test]
    fn names() {
        let fill = |specification, update| FillNodes::new(&config(specification, update)).unwrap().name();
        assert_eq!(fill(FillNodesSpecification::Artifact, false), "fill_artifact");
        assert_eq!(fill(FillNodesSpecification::Execution, true), "fill_execution(update)");
        assert_eq!(fill(FillNodesSpecification::Context, false), "fill_context");
    }

    #[test]
    fn insert_requires_types() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let generator = FillNodes::new(&config(FillNodesSpecification::Artifact, false)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 10, 0);

        let err = workload.prepare(store.as_ref()).unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition(_)));
    }

    #[test]
    fn insert_creates_nodes() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(0, 0, 5, store.as_ref()).unwrap();
        store
            .put_type(
                TypeKind::Context,
                &Type::new("wide")
                    .with_property("a", PropertyType::Int)
                    .with_property("b", PropertyType::Double),
                Default::default(),
            )
            .unwrap();

        let generator = FillNodes::new(&config(FillNodesSpecification::Context, false)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 60, 5);
        workload.prepare(store.as_ref()).unwrap();
        for item in workload.work_items() {
            let node = &item.request.nodes[0];
            assert!((1..=5).contains(&node.num_properties()));
            assert_eq!(item.transferred_bytes, node_bytes(node));
        }
        run(&mut workload, store.as_ref());

        assert_eq!(store.get_nodes(NodeKind::Context).unwrap().len(), 60);
    }

    #[test]
    fn update_adds_properties() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(1, 0, 0, store.as_ref()).unwrap();
        insert_nodes_in_db(8, 0, 0, store.as_ref()).unwrap();
        let before: HashMap<_, _> = store
            .get_nodes(NodeKind::Artifact)
            .unwrap()
            .into_iter()
            .map(|node| (node.id, node.num_properties()))
            .collect();

        let generator = FillNodes::new(&config(FillNodesSpecification::Artifact, true)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 8, 6);
        run(&mut workload, store.as_ref());

        let after = store.get_nodes(NodeKind::Artifact).unwrap();
        assert_eq!(after.len(), 8);
        for node in after {
            assert!(node.num_properties() > before[&node.id]);
        }
    }

    #[test]
    fn update_makes_up_missing_nodes() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(0, 2, 0, store.as_ref()).unwrap();
        insert_nodes_in_db(0, 3, 0, store.as_ref()).unwrap();

        let generator = FillNodes::new(&config(FillNodesSpecification::Execution, true)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 10, 7);
        run(&mut workload, store.as_ref());

        let executions = store.get_nodes(NodeKind::Execution).unwrap();
        assert_eq!(executions.len(), 10);
        assert!(
            executions
                .iter()
                .all(|node| node.custom_properties.keys().any(|k| k.starts_with("update_p-")))
        );
    }
}
