//! Client operations against a cluster
//!
//! One blocking request per call, per-call deadline, no write retries.
//! Whether a key was built from a primary key or a raw digest makes no
//! difference here: by the time a request is encoded, every key is its
//! digest.

mod batch;

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::{Cluster, Node};
use crate::common::{ClientConfig, Error, Result, WriteParams};
use crate::record::{Key, Record};
use crate::wire::codec::{
    self, GetRequest, KeyRequest, PutRequest, FLAG_CREATE_ONLY, FLAG_EXPECT_GENERATION,
    RC_NOT_FOUND, RC_OK,
};
use crate::wire::frame::{self, MsgKind};

/// Handle to issue record operations. Cheap to clone; all clones share
/// the same cluster.
#[derive(Clone)]
pub struct Client {
    cluster: Arc<Cluster>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self { cluster }
    }

    /// Build a TCP-backed client from a config: dial every seed host,
    /// keep the reachable ones. Fails with `NoAvailableNode` only when
    /// no host at all was reachable.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let cluster = Arc::new(Cluster::new());
        for host in &config.hosts {
            if let Err(e) = cluster
                .add_host(&host.address, host.port, config.connect_timeout_ms)
                .await
            {
                tracing::warn!("seed host {} skipped: {}", host, e);
            }
        }
        if cluster.host_count().await == 0 {
            return Err(Error::NoAvailableNode);
        }
        Ok(Self::new(cluster))
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Write all bins of `record` under `key`.
    pub async fn put(&self, key: &Key, record: &Record, params: &WriteParams) -> Result<()> {
        let _guard = self.cluster.begin_op()?;

        let mut flags = 0u8;
        if params.create_only {
            flags |= FLAG_CREATE_ONLY;
        }
        if params.expect_generation.is_some() {
            flags |= FLAG_EXPECT_GENERATION;
        }
        let req = PutRequest {
            namespace: key.namespace().to_string(),
            digest: *key.digest(),
            ttl: params.ttl,
            flags,
            expect_generation: params.expect_generation.unwrap_or(0),
            bins: record.bins().to_vec(),
        };

        let body = codec::encode_put(&req)?;
        let resp = self.request_one(MsgKind::Put, body, params.timeout_ms).await?;
        match resp.result {
            RC_OK => Ok(()),
            code => Err(Error::ServerError(code)),
        }
    }

    /// Read the named bins of the record under `key`. An empty selector
    /// reads all bins. The returned record carries the server's
    /// generation and TTL.
    pub async fn get(&self, key: &Key, bin_names: &[&str], timeout_ms: u32) -> Result<Record> {
        let _guard = self.cluster.begin_op()?;

        let req = GetRequest {
            namespace: key.namespace().to_string(),
            digest: *key.digest(),
            bin_names: bin_names.iter().map(|s| s.to_string()).collect(),
        };
        let body = codec::encode_get(&req)?;
        let resp = self.request_one(MsgKind::Get, body, timeout_ms).await?;
        match resp.result {
            RC_OK => Ok(resp.into_record()),
            RC_NOT_FOUND => Err(Error::RecordNotFound),
            code => Err(Error::ServerError(code)),
        }
    }

    /// Read all bins of the record under `key`. Same as [`get`](Self::get)
    /// with an empty selector; kept distinct because the caller does not
    /// know the bin count in advance.
    pub async fn get_all(&self, key: &Key, timeout_ms: u32) -> Result<Record> {
        self.get(key, &[], timeout_ms).await
    }

    /// Ensure the record under `key` is absent. Deleting a key that does
    /// not exist succeeds.
    pub async fn delete(&self, key: &Key, params: &WriteParams) -> Result<()> {
        let _guard = self.cluster.begin_op()?;

        let req = KeyRequest {
            namespace: key.namespace().to_string(),
            digest: *key.digest(),
        };
        let body = codec::encode_key_request(&req)?;
        let resp = self
            .request_one(MsgKind::Delete, body, params.timeout_ms)
            .await?;
        match resp.result {
            RC_OK | RC_NOT_FOUND => Ok(()),
            code => Err(Error::ServerError(code)),
        }
    }

    /// Metadata-only probe: does a record exist under `key`?
    pub async fn exists(&self, key: &Key, timeout_ms: u32) -> Result<bool> {
        let _guard = self.cluster.begin_op()?;

        let req = KeyRequest {
            namespace: key.namespace().to_string(),
            digest: *key.digest(),
        };
        let body = codec::encode_key_request(&req)?;
        let resp = self.request_one(MsgKind::Exists, body, timeout_ms).await?;
        match resp.result {
            RC_OK => Ok(true),
            RC_NOT_FOUND => Ok(false),
            code => Err(Error::ServerError(code)),
        }
    }

    /// Send one request to a selected node and decode the single-record
    /// response.
    async fn request_one(
        &self,
        kind: MsgKind,
        body: Bytes,
        timeout_ms: u32,
    ) -> Result<codec::Response> {
        let node = self.cluster.select_node().await?;
        let (resp_kind, resp_body) = Self::send_to_node(&node, kind, body, timeout_ms).await?;
        if resp_kind != MsgKind::Response {
            return Err(Error::Corrupted(format!(
                "expected response frame, got {:?}",
                resp_kind
            )));
        }
        codec::decode_response(&resp_body)
    }

    /// Exchange one framed message with a specific node. An I/O failure
    /// marks the node dead; a timeout does not (the node may just be
    /// slow).
    pub(crate) async fn send_to_node(
        node: &Arc<Node>,
        kind: MsgKind,
        body: Bytes,
        timeout_ms: u32,
    ) -> Result<(MsgKind, Bytes)> {
        let framed = frame::seal(kind, &body);
        let deadline = Duration::from_millis(u64::from(timeout_ms));
        match node.transport().send(framed, deadline).await {
            Ok(raw) => frame::open(&raw),
            Err(e) => {
                if matches!(e, Error::Io(_)) {
                    node.mark_dead();
                }
                Err(e)
            }
        }
    }
}
