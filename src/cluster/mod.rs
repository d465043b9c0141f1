//! Cluster membership and lifecycle
//!
//! The handle owns host membership and per-host health, picks a node for
//! each request, and gates every operation on its lifecycle state.

pub mod handle;
pub mod node;

pub use handle::{Cluster, Lifecycle};
pub use node::{Node, NodeState};
