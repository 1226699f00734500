use std::fmt::Debug;

use crate::error::Result;
use crate::types::{
    Association, Attribution, Event, Id, Node, NodeKind, PutTypeOptions, Type, TypeKind,
};

mod in_memory;

pub use in_memory::{InMemoryStore, drop_database};

/// A type-erased [`MetadataStore`] connection.
pub type BoxedStore = Box<dyn MetadataStore>;

/// A connection to a metadata store.
///
/// All calls are blocking. A connection may be used from one thread at a time or shared across
/// threads; callers that want independent connections open one per thread with
/// [`connect`](crate::connect).
pub trait MetadataStore: Debug + Send + Sync {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns all types of the given kind, ordered by id.
    fn get_types(&self, kind: TypeKind) -> Result<Vec<Type>>;

    /// Returns the types of the given kind with the given ids. Unknown ids are skipped.
    fn get_types_by_id(&self, kind: TypeKind, ids: &[Id]) -> Result<Vec<Type>>;

    /// Returns the type of the given kind with the given name, if any.
    fn get_type(&self, kind: TypeKind, name: &str) -> Result<Option<Type>>;

    /// Creates a type, or updates the existing type with the same name.
    ///
    /// Updating a type may only add properties, and only if
    /// [`can_add_fields`](PutTypeOptions::can_add_fields) is set. Returns the id of the type.
    fn put_type(&self, kind: TypeKind, ty: &Type, options: PutTypeOptions) -> Result<Id>;

    /// Creates or updates a batch of nodes, returning their ids in order.
    ///
    /// Nodes without an id are inserted, nodes with an id replace the stored node. The batch is
    /// applied atomically.
    fn put_nodes(&self, kind: NodeKind, nodes: &[Node]) -> Result<Vec<Id>>;

    /// Returns all nodes of the given kind, ordered by id.
    fn get_nodes(&self, kind: NodeKind) -> Result<Vec<Node>>;

    /// Returns the nodes of the given kind with the given ids. Unknown ids are skipped.
    fn get_nodes_by_id(&self, kind: NodeKind, ids: &[Id]) -> Result<Vec<Node>>;

    /// Returns all nodes of the given kind whose type has the given name.
    fn get_nodes_by_type(&self, kind: NodeKind, type_name: &str) -> Result<Vec<Node>>;

    /// Returns the node of the given kind with the given type name and node name, if any.
    fn get_node_by_type_and_name(
        &self,
        kind: NodeKind,
        type_name: &str,
        node_name: &str,
    ) -> Result<Option<Node>>;

    /// Stores a batch of events. Both endpoints of every event must exist.
    fn put_events(&self, events: &[Event]) -> Result<()>;

    /// Returns all events touching any of the given artifacts.
    fn get_events_by_artifact_ids(&self, ids: &[Id]) -> Result<Vec<Event>>;

    /// Returns all events touching any of the given executions.
    fn get_events_by_execution_ids(&self, ids: &[Id]) -> Result<Vec<Event>>;

    /// Stores context edges. Edges that already exist are left untouched.
    fn put_attributions_and_associations(
        &self,
        attributions: &[Attribution],
        associations: &[Association],
    ) -> Result<()>;

    /// Returns the artifacts attributed to the given context.
    fn get_artifacts_by_context(&self, context_id: Id) -> Result<Vec<Node>>;

    /// Returns the executions associated with the given context.
    fn get_executions_by_context(&self, context_id: Id) -> Result<Vec<Node>>;

    /// Returns the contexts the given artifact is attributed to.
    fn get_contexts_by_artifact(&self, artifact_id: Id) -> Result<Vec<Node>>;

    /// Returns the contexts the given execution is associated with.
    fn get_contexts_by_execution(&self, execution_id: Id) -> Result<Vec<Node>>;
}
