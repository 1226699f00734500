//! Helpers shared by the workloads: reading existing entities, seeding a store, and estimating
//! the size of requests.

use mlmd_store::{MetadataStore, Node, NodeKind, PropertyType, Type, TypeKind, Value};
use rand::Rng;
use rand::distr::{Alphanumeric, Distribution};
use rand_distr::Uniform;

use crate::{Error, Result};

/// Size of the ids and type id carried by every node.
const NODE_BASE_BYTES: u64 = 16;

/// Size of an integer or double value.
const NUMBER_BYTES: u64 = 8;

/// Returns all types of `kind` currently in `store`.
pub fn existing_types(kind: TypeKind, store: &dyn MetadataStore) -> Result<Vec<Type>> {
    Ok(store.get_types(kind)?)
}

/// Returns all nodes of `kind` currently in `store`.
pub fn existing_nodes(kind: NodeKind, store: &dyn MetadataStore) -> Result<Vec<Node>> {
    Ok(store.get_nodes(kind)?)
}

/// Total number of types of all kinds in `store`.
pub fn total_types(store: &dyn MetadataStore) -> Result<usize> {
    let mut total = 0;
    for kind in TypeKind::ALL {
        total += store.get_types(kind)?.len();
    }
    Ok(total)
}

/// Inserts the given numbers of artifact, execution and context types into `store`.
///
/// Each type declares one string property.
pub fn insert_types_in_db(
    num_artifact_types: usize,
    num_execution_types: usize,
    num_context_types: usize,
    store: &dyn MetadataStore,
) -> Result<()> {
    let counts = [num_artifact_types, num_execution_types, num_context_types];
    for (kind, count) in TypeKind::ALL.into_iter().zip(counts) {
        let offset = store.get_types(kind)?.len();
        for i in offset..offset + count {
            let ty = Type::new(format!("pre_insert_{kind}-{i}"))
                .with_property("property", PropertyType::String);
            store.put_type(kind, &ty, Default::default())?;
        }
    }
    Ok(())
}

/// Inserts the given numbers of artifacts, executions and contexts into `store`.
///
/// Nodes are created with the first existing type of their kind and carry one string value for
/// every property that type declares.
pub fn insert_nodes_in_db(
    num_artifacts: usize,
    num_executions: usize,
    num_contexts: usize,
    store: &dyn MetadataStore,
) -> Result<()> {
    let counts = [num_artifacts, num_executions, num_contexts];
    for (kind, count) in NodeKind::ALL.into_iter().zip(counts) {
        if count == 0 {
            continue;
        }

        let Some(ty) = store.get_types(kind.type_kind())?.into_iter().next() else {
            return Err(Error::FailedPrecondition(format!(
                "no {} to insert {kind}s with",
                kind.type_kind()
            )));
        };
        let type_id = ty.id.ok_or_else(|| {
            Error::InvalidArgument(format!("{} `{}` has no id", kind.type_kind(), ty.name))
        })?;

        let offset = store.get_nodes(kind)?.len();
        let nodes: Vec<_> = (offset..offset + count)
            .map(|i| {
                let mut node = Node::new(type_id).with_name(format!("pre_insert_{kind}-{i}"));
                for (name, property_type) in &ty.properties {
                    let value = match property_type {
                        PropertyType::Int => Value::Int(i as i64),
                        PropertyType::Double => Value::Double(i as f64),
                        PropertyType::String => Value::String(format!("value-{i}")),
                    };
                    node.properties.insert(name.clone(), value);
                }
                node
            })
            .collect();
        store.put_nodes(kind, &nodes)?;
    }
    Ok(())
}

/// Draws a count from `distribution`.
pub fn sample_count(distribution: &Uniform<u64>, rng: &mut impl Rng) -> usize {
    usize::try_from(distribution.sample(rng)).unwrap_or(usize::MAX)
}

/// Generates a random alphanumeric string of `len` characters.
pub fn random_string(len: usize, rng: &mut impl Rng) -> String {
    Alphanumeric
        .sample_iter(rng)
        .take(len)
        .map(char::from)
        .collect()
}

/// Estimated size of a type when it is written: its name and the names of its properties.
pub fn type_bytes(ty: &Type) -> u64 {
    let properties: usize = ty.properties.keys().map(String::len).sum();
    (ty.name.len() + properties) as u64
}

/// Estimated size of a type when it is read: its name and each property name with its type.
pub fn read_type_bytes(ty: &Type) -> u64 {
    let properties: usize = ty.properties.keys().map(|name| name.len() + 1).sum();
    (ty.name.len() + properties) as u64
}

/// Estimated size of a property value.
pub fn value_bytes(value: &Value) -> u64 {
    match value {
        Value::Int(_) | Value::Double(_) => NUMBER_BYTES,
        Value::String(s) => s.len() as u64,
    }
}

/// Estimated size of a node: ids, names and every property name and value.
pub fn node_bytes(node: &Node) -> u64 {
    let name = node.name.as_deref().map_or(0, str::len) as u64;
    let properties: u64 = node
        .properties
        .iter()
        .chain(&node.custom_properties)
        .map(|(name, value)| name.len() as u64 + value_bytes(value))
        .sum();
    NODE_BASE_BYTES + name + node.type_name.len() as u64 + properties
}
