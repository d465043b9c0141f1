//! Cluster handle: membership, health and lifecycle
//!
//! Lifecycle: `Created → Active (first host added) → ShuttingDown →
//! Closed`. Membership is read-mostly (every operation reads it to pick
//! a node, adds are rare) so it lives behind an RwLock. Shutdown drains:
//! it refuses new operations, waits for the in-flight count to hit zero,
//! then releases per-host transports.

use std::pin::pin;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

use crate::cluster::Node;
use crate::common::{Error, Result};
use crate::net::{Connector, TcpConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    ShuttingDown,
    Closed,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Lifecycle::Created,
            1 => Lifecycle::Active,
            2 => Lifecycle::ShuttingDown,
            _ => Lifecycle::Closed,
        }
    }
}

/// A logical connection to a set of store nodes.
pub struct Cluster {
    connector: Arc<dyn Connector>,
    nodes: RwLock<Vec<Arc<Node>>>,
    lifecycle: AtomicU8,
    cursor: AtomicUsize,
    in_flight: AtomicUsize,
    drained: Notify,
}

impl Cluster {
    /// New handle dialing hosts over TCP.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(TcpConnector))
    }

    /// New handle with a custom connector (in-process, instrumented, ...).
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            nodes: RwLock::new(Vec::new()),
            lifecycle: AtomicU8::new(Lifecycle::Created as u8),
            cursor: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::SeqCst))
    }

    fn check_usable(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::ShuttingDown | Lifecycle::Closed => Err(Error::InvalidHandle),
            Lifecycle::Created | Lifecycle::Active => Ok(()),
        }
    }

    /// Attempt to establish reachability of a host and add it to the
    /// member set. Adding a host that is already a member refreshes its
    /// transport and health. Failure leaves the member set untouched and
    /// returns `HostUnreachable`; the caller decides whether to continue
    /// with the remaining hosts.
    pub async fn add_host(&self, address: &str, port: u16, timeout_ms: u32) -> Result<()> {
        self.check_usable()?;

        let transport = self
            .connector
            .connect(address, port, Duration::from_millis(u64::from(timeout_ms)))
            .await?;
        let node = Arc::new(Node::new(address, port, transport));

        let mut nodes = self.nodes.write().await;
        self.check_usable()?;
        match nodes.iter().position(|n| n.peer() == node.peer()) {
            Some(pos) => {
                tracing::debug!("host {} re-added, transport refreshed", node.peer());
                nodes[pos] = node;
            }
            None => {
                tracing::debug!("host {} joined the cluster", node.peer());
                nodes.push(node);
            }
        }

        let _ = self.lifecycle.compare_exchange(
            Lifecycle::Created as u8,
            Lifecycle::Active as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        Ok(())
    }

    /// Pick any currently-healthy member. A rotating cursor spreads
    /// consecutive calls over the members, but no load-balancing
    /// guarantee is made beyond "some reachable node".
    pub async fn select_node(&self) -> Result<Arc<Node>> {
        self.check_usable()?;
        let nodes = self.nodes.read().await;
        if nodes.is_empty() {
            return Err(Error::NoAvailableNode);
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for i in 0..nodes.len() {
            let node = &nodes[(start + i) % nodes.len()];
            if node.is_healthy() {
                return Ok(node.clone());
            }
        }
        Err(Error::NoAvailableNode)
    }

    /// All currently-healthy members, for operations that fan out.
    pub(crate) async fn healthy_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes
            .read()
            .await
            .iter()
            .filter(|n| n.is_healthy())
            .cloned()
            .collect()
    }

    pub async fn host_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn healthy_host_count(&self) -> usize {
        self.healthy_nodes().await.len()
    }

    /// Register an operation for shutdown draining. Fails with
    /// `InvalidHandle` once shutdown has begun.
    pub(crate) fn begin_op(&self) -> Result<OpGuard<'_>> {
        self.check_usable()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        // Shutdown may have begun between the check and the increment
        if self.check_usable().is_err() {
            self.end_op();
            return Err(Error::InvalidHandle);
        }
        Ok(OpGuard { cluster: self })
    }

    fn end_op(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Refuse new operations, wait for in-flight ones to drain, then
    /// release all per-host resources. Idempotent; once this returns the
    /// handle only ever answers `InvalidHandle`.
    pub async fn shutdown(&self) {
        let prev = self
            .lifecycle
            .swap(Lifecycle::ShuttingDown as u8, Ordering::SeqCst);
        if prev == Lifecycle::Closed as u8 {
            self.lifecycle
                .store(Lifecycle::Closed as u8, Ordering::SeqCst);
            return;
        }

        loop {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            let mut notified = pin!(self.drained.notified());
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }

        self.nodes.write().await.clear();
        self.lifecycle
            .store(Lifecycle::Closed as u8, Ordering::SeqCst);
        tracing::debug!("cluster shut down");
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count when an operation finishes, waking a
/// draining `shutdown` if it was the last one.
pub(crate) struct OpGuard<'a> {
    cluster: &'a Cluster,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.cluster.end_op();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mem::{MemConnector, MemServer};

    fn mem_cluster() -> Cluster {
        let server = Arc::new(MemServer::new());
        Cluster::with_connector(Arc::new(MemConnector::new(server)))
    }

    #[tokio::test]
    async fn test_lifecycle_created_to_active() {
        let cluster = mem_cluster();
        assert_eq!(cluster.lifecycle(), Lifecycle::Created);

        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();
        assert_eq!(cluster.lifecycle(), Lifecycle::Active);
        assert_eq!(cluster.host_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_host_is_idempotent() {
        let cluster = mem_cluster();
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();
        assert_eq!(cluster.host_count().await, 1);

        cluster.add_host("127.0.0.1", 3001, 1000).await.unwrap();
        assert_eq!(cluster.host_count().await, 2);
    }

    #[tokio::test]
    async fn test_select_node_empty_membership() {
        let cluster = mem_cluster();
        assert!(matches!(
            cluster.select_node().await,
            Err(Error::NoAvailableNode)
        ));
    }

    #[tokio::test]
    async fn test_select_node_skips_dead_members() {
        let cluster = mem_cluster();
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();
        cluster.add_host("127.0.0.1", 3001, 1000).await.unwrap();

        // Kill one member; selection must keep answering with the other
        let victim = cluster.select_node().await.unwrap();
        victim.mark_dead();
        for _ in 0..8 {
            let node = cluster.select_node().await.unwrap();
            assert!(node.is_healthy());
            assert_ne!(node.peer(), victim.peer());
        }

        // Kill the survivor too
        let survivor = cluster.select_node().await.unwrap();
        survivor.mark_dead();
        assert!(matches!(
            cluster.select_node().await,
            Err(Error::NoAvailableNode)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let cluster = mem_cluster();
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();

        cluster.shutdown().await;
        assert_eq!(cluster.lifecycle(), Lifecycle::Closed);
        assert_eq!(cluster.host_count().await, 0);

        assert!(matches!(
            cluster.add_host("127.0.0.1", 3000, 1000).await,
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(
            cluster.select_node().await,
            Err(Error::InvalidHandle)
        ));
        assert!(cluster.begin_op().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let cluster = mem_cluster();
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();
        cluster.shutdown().await;
        cluster.shutdown().await;
        assert_eq!(cluster.lifecycle(), Lifecycle::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_ops() {
        let cluster = Arc::new(mem_cluster());
        cluster.add_host("127.0.0.1", 3000, 1000).await.unwrap();

        let guard = cluster.begin_op().unwrap();

        let waiter = {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                cluster.shutdown().await;
            })
        };

        // Give shutdown a moment to start draining, then release the op
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);

        waiter.await.unwrap();
        assert_eq!(cluster.lifecycle(), Lifecycle::Closed);
    }
}
