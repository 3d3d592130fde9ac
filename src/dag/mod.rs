//! Star dependency graph
//!
//! The graph is rebuilt from the spec on every reconciliation pass and is
//! never mutated afterwards. Stars are identified by name.

mod graph;
mod scheduler;

pub use graph::Graph;
pub use scheduler::{blocked_by_failure, has_forward_progress, next_batch, NodeState, NodeStates};
