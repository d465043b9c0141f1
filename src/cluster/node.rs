//! Cluster member bookkeeping

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::net::Transport;

/// Node health state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Alive,
    Dead,
}

impl NodeState {
    /// Is this node healthy enough to serve requests?
    pub fn is_healthy(&self) -> bool {
        matches!(self, NodeState::Alive)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => NodeState::Alive,
            _ => NodeState::Dead,
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Alive => write!(f, "alive"),
            NodeState::Dead => write!(f, "dead"),
        }
    }
}

/// One cluster member: endpoint, health, and its transport.
pub struct Node {
    address: String,
    port: u16,
    peer: String,
    state: AtomicU8,
    transport: Arc<dyn Transport>,
}

impl Node {
    pub(crate) fn new(address: &str, port: u16, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: address.to_string(),
            port,
            peer: format!("{}:{}", address, port),
            state: AtomicU8::new(NodeState::Alive as u8),
            transport,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `address:port` form, used for membership dedup and logging.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_healthy(&self) -> bool {
        self.state().is_healthy()
    }

    pub(crate) fn mark_dead(&self) {
        if self.state.swap(NodeState::Dead as u8, Ordering::SeqCst) == NodeState::Alive as u8 {
            tracing::warn!("node {} marked dead", self.peer);
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}
