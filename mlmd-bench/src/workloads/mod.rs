//! The workload kinds a benchmark can run.
//!
//! Each kind is a [`Generator`](crate::workload::Generator) and runs wrapped in a
//! [`GeneratedWorkload`](crate::workload::GeneratedWorkload).

mod fill_context_edges;
mod fill_events;
mod fill_nodes;
mod fill_types;
mod read_events;
mod read_nodes_by_properties;
mod read_nodes_via_context_edges;
mod read_types;

pub use fill_context_edges::{ContextEdge, FillContextEdges};
pub use fill_events::FillEvents;
pub use fill_nodes::{FillNodes, PutNodesRequest};
pub use fill_types::{FillTypes, PutTypeRequest};
pub use read_events::ReadEvents;
pub use read_nodes_by_properties::{ReadNodesByProperties, ReadNodesRequest};
pub use read_nodes_via_context_edges::ReadNodesViaContextEdges;
pub use read_types::{ReadTypes, ReadTypesRequest};
