//! In-memory backend.
//!
//! This provides a [`MetadataStore`] backed by plain maps behind a [`RwLock`]. The store is
//! [`Clone`]; clones share the same database. Named databases are registered process-wide so that
//! every connection opened with the same name sees the same data.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::MetadataStore;
use crate::error::{Result, StoreError};
use crate::types::{
    Association, Attribution, Event, Id, Node, NodeKind, PutTypeOptions, Type, TypeKind,
};

type SharedDatabase = Arc<RwLock<Database>>;

static DATABASES: LazyLock<Mutex<HashMap<String, SharedDatabase>>> =
    LazyLock::new(Default::default);

/// Removes the named in-memory database from the process registry.
///
/// Open connections keep their data alive, but new connections with the same name start from an
/// empty database. Returns `true` if a database was removed.
pub fn drop_database(name: &str) -> bool {
    let removed = DATABASES
        .lock()
        .map(|mut databases| databases.remove(name).is_some())
        .unwrap_or(false);
    if removed {
        tracing::debug!(name, "dropped in-memory database");
    }
    removed
}

#[derive(Debug, Default)]
struct Database {
    last_type_id: Id,
    types: HashMap<TypeKind, BTreeMap<Id, Type>>,

    last_node_id: HashMap<NodeKind, Id>,
    nodes: HashMap<NodeKind, BTreeMap<Id, Node>>,
    /// Index of node names: `(kind, type id, name)` to node id.
    node_names: HashMap<(NodeKind, Id, String), Id>,

    events: Vec<Event>,
    /// Pairs of `(context id, artifact id)`.
    attributions: BTreeSet<(Id, Id)>,
    /// Pairs of `(context id, execution id)`.
    associations: BTreeSet<(Id, Id)>,
}

impl Database {
    fn types(&self, kind: TypeKind) -> impl Iterator<Item = &Type> {
        self.types.get(&kind).into_iter().flat_map(|types| types.values())
    }

    fn type_by_id(&self, kind: TypeKind, id: Id) -> Option<&Type> {
        self.types.get(&kind).and_then(|types| types.get(&id))
    }

    fn nodes(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.get(&kind).into_iter().flat_map(|nodes| nodes.values())
    }

    fn node_by_id(&self, kind: NodeKind, id: Id) -> Option<&Node> {
        self.nodes.get(&kind).and_then(|nodes| nodes.get(&id))
    }

    fn contains_node(&self, kind: NodeKind, id: Id) -> bool {
        self.node_by_id(kind, id).is_some()
    }

    fn put_type(&mut self, kind: TypeKind, ty: &Type, options: PutTypeOptions) -> Result<Id> {
        if ty.name.is_empty() {
            return Err(StoreError::InvalidArgument("type name is empty".into()));
        }

        let types = self.types.entry(kind).or_default();
        let existing = types
            .iter()
            .find(|(_, stored)| stored.name == ty.name)
            .map(|(id, _)| *id);
        let Some(id) = existing else {
            if let Some(id) = ty.id {
                return Err(StoreError::NotFound(format!("{kind} with id {id}")));
            }
            self.last_type_id += 1;
            let id = self.last_type_id;
            let mut ty = ty.clone();
            ty.id = Some(id);
            types.insert(id, ty);
            return Ok(id);
        };
        let Some(stored) = types.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("{kind} with id {id}")));
        };

        if ty.id.is_some_and(|given| given != id) {
            return Err(StoreError::InvalidArgument(format!(
                "{kind} `{}` has id {id}, not {:?}",
                ty.name, ty.id
            )));
        }

        for (name, property_type) in &stored.properties {
            match ty.properties.get(name) {
                None => {
                    return Err(StoreError::FailedPrecondition(format!(
                        "{kind} `{}` cannot omit property `{name}`",
                        ty.name
                    )));
                }
                Some(given) if given != property_type => {
                    return Err(StoreError::FailedPrecondition(format!(
                        "{kind} `{}` cannot change the type of property `{name}`",
                        ty.name
                    )));
                }
                Some(_) => {}
            }
        }

        let added: Vec<_> = ty
            .properties
            .iter()
            .filter(|(name, _)| !stored.properties.contains_key(*name))
            .map(|(name, property_type)| (name.clone(), *property_type))
            .collect();

        if !added.is_empty() {
            if !options.can_add_fields {
                return Err(StoreError::AlreadyExists(format!(
                    "{kind} `{}` exists with different properties",
                    ty.name
                )));
            }
            stored.properties.extend(added);
        }

        Ok(id)
    }

    /// Checks a single node against its type and the stored nodes.
    fn validate_node(&self, kind: NodeKind, node: &Node) -> Result<&Type> {
        let ty = self
            .type_by_id(kind.type_kind(), node.type_id)
            .ok_or_else(|| {
                StoreError::NotFound(format!("{} with id {}", kind.type_kind(), node.type_id))
            })?;

        if let Some(id) = node.id {
            let stored = self
                .node_by_id(kind, id)
                .ok_or_else(|| StoreError::NotFound(format!("{kind} with id {id}")))?;
            if stored.type_id != node.type_id {
                return Err(StoreError::InvalidArgument(format!(
                    "{kind} {id} cannot change its type"
                )));
            }
        }

        for (name, value) in &node.properties {
            match ty.properties.get(name) {
                None => {
                    return Err(StoreError::InvalidArgument(format!(
                        "property `{name}` is not declared by `{}`",
                        ty.name
                    )));
                }
                Some(declared) if *declared != value.property_type() => {
                    return Err(StoreError::InvalidArgument(format!(
                        "property `{name}` of `{}` expects {declared:?}",
                        ty.name
                    )));
                }
                Some(_) => {}
            }
        }

        match &node.name {
            None if kind == NodeKind::Context => {
                return Err(StoreError::InvalidArgument("contexts must be named".into()));
            }
            None => {}
            Some(name) => {
                let key = (kind, node.type_id, name.clone());
                if let Some(&owner) = self.node_names.get(&key) {
                    if Some(owner) != node.id {
                        return Err(StoreError::AlreadyExists(format!(
                            "{kind} `{name}` of type `{}`",
                            ty.name
                        )));
                    }
                }
            }
        }

        Ok(ty)
    }

    fn put_nodes(&mut self, kind: NodeKind, nodes: &[Node]) -> Result<Vec<Id>> {
        // Validate the whole batch before applying anything.
        let mut type_names = Vec::with_capacity(nodes.len());
        {
            let mut batch_names = HashSet::new();
            let mut batch_ids = HashSet::new();
            for node in nodes {
                let ty = self.validate_node(kind, node)?;
                if let Some(name) = &node.name {
                    if !batch_names.insert((node.type_id, name.as_str())) {
                        return Err(StoreError::AlreadyExists(format!(
                            "{kind} `{name}` appears twice in the batch"
                        )));
                    }
                }
                if let Some(id) = node.id {
                    if !batch_ids.insert(id) {
                        return Err(StoreError::InvalidArgument(format!(
                            "{kind} {id} appears twice in the batch"
                        )));
                    }
                }
                type_names.push(ty.name.clone());
            }
        }

        let mut ids = Vec::with_capacity(nodes.len());
        for (node, type_name) in nodes.iter().zip(type_names) {
            let id = match node.id {
                Some(id) => id,
                None => {
                    let last = self.last_node_id.entry(kind).or_default();
                    *last += 1;
                    *last
                }
            };

            let mut stored = node.clone();
            stored.id = Some(id);
            stored.type_name = type_name;

            let previous = self.nodes.entry(kind).or_default().insert(id, stored);
            if let Some(previous_name) = previous.and_then(|previous| previous.name) {
                self.node_names
                    .remove(&(kind, node.type_id, previous_name));
            }
            if let Some(name) = &node.name {
                self.node_names
                    .insert((kind, node.type_id, name.clone()), id);
            }

            ids.push(id);
        }

        Ok(ids)
    }

    fn put_events(&mut self, events: &[Event]) -> Result<()> {
        for event in events {
            if !self.contains_node(NodeKind::Artifact, event.artifact_id) {
                return Err(StoreError::NotFound(format!(
                    "artifact with id {}",
                    event.artifact_id
                )));
            }
            if !self.contains_node(NodeKind::Execution, event.execution_id) {
                return Err(StoreError::NotFound(format!(
                    "execution with id {}",
                    event.execution_id
                )));
            }
        }

        self.events.extend_from_slice(events);
        Ok(())
    }

    fn put_edges(
        &mut self,
        attributions: &[Attribution],
        associations: &[Association],
    ) -> Result<()> {
        let endpoints = attributions
            .iter()
            .map(|edge| (NodeKind::Artifact, edge.artifact_id, edge.context_id))
            .chain(
                associations
                    .iter()
                    .map(|edge| (NodeKind::Execution, edge.execution_id, edge.context_id)),
            );
        for (kind, node_id, context_id) in endpoints {
            if !self.contains_node(kind, node_id) {
                return Err(StoreError::NotFound(format!("{kind} with id {node_id}")));
            }
            if !self.contains_node(NodeKind::Context, context_id) {
                return Err(StoreError::NotFound(format!("context with id {context_id}")));
            }
        }

        self.attributions.extend(
            attributions
                .iter()
                .map(|edge| (edge.context_id, edge.artifact_id)),
        );
        self.associations.extend(
            associations
                .iter()
                .map(|edge| (edge.context_id, edge.execution_id)),
        );
        Ok(())
    }

    fn nodes_in_context(
        &self,
        edges: &BTreeSet<(Id, Id)>,
        kind: NodeKind,
        context: Id,
    ) -> Vec<Node> {
        edges
            .range((context, Id::MIN)..=(context, Id::MAX))
            .filter_map(|&(_, id)| self.node_by_id(kind, id).cloned())
            .collect()
    }

    fn contexts_of(&self, edges: &BTreeSet<(Id, Id)>, node: Id) -> Vec<Node> {
        edges
            .iter()
            .filter(|&&(_, id)| id == node)
            .filter_map(|&(context, _)| self.node_by_id(NodeKind::Context, context).cloned())
            .collect()
    }
}

/// A [`MetadataStore`] keeping all data in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    db: SharedDatabase,
}

impl InMemoryStore {
    /// Creates a store with a private, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to the named database, creating it if it does not exist yet.
    pub fn shared(name: &str) -> Result<Self> {
        let mut databases = DATABASES
            .lock()
            .map_err(|_| StoreError::Unavailable("database registry is poisoned".into()))?;
        let db = databases.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(name, "creating in-memory database");
            SharedDatabase::default()
        });
        Ok(Self { db: Arc::clone(db) })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Database>> {
        self.db
            .read()
            .map_err(|_| StoreError::Unavailable("database lock is poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Database>> {
        self.db
            .write()
            .map_err(|_| StoreError::Unavailable("database lock is poisoned".into()))
    }
}

impl MetadataStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn get_types(&self, kind: TypeKind) -> Result<Vec<Type>> {
        Ok(self.read()?.types(kind).cloned().collect())
    }

    fn get_types_by_id(&self, kind: TypeKind, ids: &[Id]) -> Result<Vec<Type>> {
        let db = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|&id| db.type_by_id(kind, id).cloned())
            .collect())
    }

    fn get_type(&self, kind: TypeKind, name: &str) -> Result<Option<Type>> {
        Ok(self.read()?.types(kind).find(|ty| ty.name == name).cloned())
    }

    fn put_type(&self, kind: TypeKind, ty: &Type, options: PutTypeOptions) -> Result<Id> {
        self.write()?.put_type(kind, ty, options)
    }

    fn put_nodes(&self, kind: NodeKind, nodes: &[Node]) -> Result<Vec<Id>> {
        self.write()?.put_nodes(kind, nodes)
    }

    fn get_nodes(&self, kind: NodeKind) -> Result<Vec<Node>> {
        Ok(self.read()?.nodes(kind).cloned().collect())
    }

    fn get_nodes_by_id(&self, kind: NodeKind, ids: &[Id]) -> Result<Vec<Node>> {
        let db = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|&id| db.node_by_id(kind, id).cloned())
            .collect())
    }

    fn get_nodes_by_type(&self, kind: NodeKind, type_name: &str) -> Result<Vec<Node>> {
        let db = self.read()?;
        let Some(type_id) = db
            .types(kind.type_kind())
            .find(|ty| ty.name == type_name)
            .and_then(|ty| ty.id)
        else {
            return Ok(Vec::new());
        };
        Ok(db
            .nodes(kind)
            .filter(|node| node.type_id == type_id)
            .cloned()
            .collect())
    }

    fn get_node_by_type_and_name(
        &self,
        kind: NodeKind,
        type_name: &str,
        node_name: &str,
    ) -> Result<Option<Node>> {
        let db = self.read()?;
        let Some(type_id) = db
            .types(kind.type_kind())
            .find(|ty| ty.name == type_name)
            .and_then(|ty| ty.id)
        else {
            return Ok(None);
        };
        Ok(db
            .node_names
            .get(&(kind, type_id, node_name.to_owned()))
            .and_then(|&id| db.node_by_id(kind, id))
            .cloned())
    }

    fn put_events(&self, events: &[Event]) -> Result<()> {
        self.write()?.put_events(events)
    }

    fn get_events_by_artifact_ids(&self, ids: &[Id]) -> Result<Vec<Event>> {
        let db = self.read()?;
        Ok(db
            .events
            .iter()
            .filter(|event| ids.contains(&event.artifact_id))
            .copied()
            .collect())
    }

    fn get_events_by_execution_ids(&self, ids: &[Id]) -> Result<Vec<Event>> {
        let db = self.read()?;
        Ok(db
            .events
            .iter()
            .filter(|event| ids.contains(&event.execution_id))
            .copied()
            .collect())
    }

    fn put_attributions_and_associations(
        &self,
        attributions: &[Attribution],
        associations: &[Association],
    ) -> Result<()> {
        self.write()?.put_edges(attributions, associations)
    }

    fn get_artifacts_by_context(&self, context_id: Id) -> Result<Vec<Node>> {
        let db = self.read()?;
        Ok(db.nodes_in_context(&db.attributions, NodeKind::Artifact, context_id))
    }

    fn get_executions_by_context(&self, context_id: Id) -> Result<Vec<Node>> {
        let db = self.read()?;
        Ok(db.nodes_in_context(&db.associations, NodeKind::Execution, context_id))
    }

    fn get_contexts_by_artifact(&self, artifact_id: Id) -> Result<Vec<Node>> {
        let db = self.read()?;
        Ok(db.contexts_of(&db.attributions, artifact_id))
    }

    fn get_contexts_by_execution(&self, execution_id: Id) -> Result<Vec<Node>> {
        let db = self.read()?;
        Ok(db.contexts_of(&db.associations, execution_id))
    }
}
