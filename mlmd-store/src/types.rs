//! Data model of the metadata store.
//!
//! The store keeps three kinds of schemas ([`Type`]s) and three kinds of entities ([`Node`]s):
//! artifacts, executions and contexts. Entities are linked by [`Event`]s (artifact to execution)
//! and by context edges ([`Attribution`] and [`Association`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned by the store to types and nodes.
pub type Id = i64;

/// The kind of schema a [`Type`] describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Schema of artifacts.
    Artifact,
    /// Schema of executions.
    Execution,
    /// Schema of contexts.
    Context,
}

impl TypeKind {
    /// All type kinds, in storage order.
    pub const ALL: [TypeKind; 3] = [TypeKind::Artifact, TypeKind::Execution, TypeKind::Context];

    /// Returns the kind of node described by types of this kind.
    pub fn node_kind(self) -> NodeKind {
        match self {
            TypeKind::Artifact => NodeKind::Artifact,
            TypeKind::Execution => NodeKind::Execution,
            TypeKind::Context => NodeKind::Context,
        }
    }

    /// Human readable name used in names and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Artifact => "artifact_type",
            TypeKind::Execution => "execution_type",
            TypeKind::Context => "context_type",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of entity a [`Node`] is.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An artifact, such as a dataset or a model.
    Artifact,
    /// An execution, such as a training run.
    Execution,
    /// A context grouping artifacts and executions.
    Context,
}

impl NodeKind {
    /// All node kinds, in storage order.
    pub const ALL: [NodeKind; 3] = [NodeKind::Artifact, NodeKind::Execution, NodeKind::Context];

    /// Returns the kind of schema nodes of this kind are typed by.
    pub fn type_kind(self) -> TypeKind {
        match self {
            NodeKind::Artifact => TypeKind::Artifact,
            NodeKind::Execution => TypeKind::Execution,
            NodeKind::Context => TypeKind::Context,
        }
    }

    /// Human readable name used in names and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Artifact => "artifact",
            NodeKind::Execution => "execution",
            NodeKind::Context => "context",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The declared type of a property in a [`Type`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit float.
    Double,
    /// A UTF-8 string.
    String,
}

/// A property value stored on a [`Node`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// An integer value.
    Int(i64),
    /// A float value.
    Double(f64),
    /// A string value.
    String(String),
}

impl Value {
    /// Returns the property type this value conforms to.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::Int(_) => PropertyType::Int,
            Value::Double(_) => PropertyType::Double,
            Value::String(_) => PropertyType::String,
        }
    }
}

/// A schema for artifacts, executions or contexts.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Type {
    /// Assigned by the store on creation.
    pub id: Option<Id>,
    /// Unique name among the types of the same kind.
    pub name: String,
    /// Declared properties and their types.
    pub properties: BTreeMap<String, PropertyType>,
}

impl Type {
    /// Creates a new type without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a declared property.
    pub fn with_property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }
}

/// Options for [`MetadataStore::put_type`](crate::MetadataStore::put_type).
#[derive(Clone, Copy, Debug, Default)]
pub struct PutTypeOptions {
    /// Allows adding properties to an existing type with the same name.
    pub can_add_fields: bool,
}

/// An artifact, execution or context.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Node {
    /// Assigned by the store on creation. Set it to update an existing node.
    pub id: Option<Id>,
    /// The id of the [`Type`] of this node.
    pub type_id: Id,
    /// The name of the type, filled in by the store on reads.
    pub type_name: String,
    /// Optional name, unique among nodes of the same type. Required for contexts.
    pub name: Option<String>,
    /// Values of properties declared by the type.
    pub properties: BTreeMap<String, Value>,
    /// Free-form properties.
    pub custom_properties: BTreeMap<String, Value>,
}

impl Node {
    /// Creates a new node of the given type.
    pub fn new(type_id: Id) -> Self {
        Self {
            type_id,
            ..Default::default()
        }
    }

    /// Sets the name of the node.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the total number of properties, declared and custom.
    pub fn num_properties(&self) -> usize {
        self.properties.len() + self.custom_properties.len()
    }
}

/// The direction of an [`Event`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The artifact was consumed by the execution.
    Input,
    /// The artifact was produced by the execution.
    Output,
}

/// An edge between an artifact and an execution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Event {
    /// The linked artifact.
    pub artifact_id: Id,
    /// The linked execution.
    pub execution_id: Id,
    /// The direction of the edge.
    pub event_type: EventType,
}

/// Attributes an artifact to a context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Attribution {
    /// The attributed artifact.
    pub artifact_id: Id,
    /// The context.
    pub context_id: Id,
}

/// Associates an execution with a context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Association {
    /// The associated execution.
    pub execution_id: Id,
    /// The context.
    pub context_id: Id,
}
