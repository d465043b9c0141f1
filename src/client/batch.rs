//! Batch retrieval by digest list
//!
//! Sub-requests are chunked round-robin over the healthy members and run
//! concurrently, then collated back into the caller's digest order. A
//! digest with no matching record yields `None` at its position; only a
//! transport-level failure fails the whole call.

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::client::Client;
use crate::cluster::Node;
use crate::common::{Digest, Error, Result};
use crate::record::Record;
use crate::wire::codec::{self, BatchGetRequest, RC_OK};
use crate::wire::frame::MsgKind;

impl Client {
    /// Fetch the records addressed by `digests` in `namespace`. The
    /// result has the same length and order as the input; absent digests
    /// yield `None` at their position.
    pub async fn batch_get(
        &self,
        namespace: &str,
        digests: &[Digest],
        timeout_ms: u32,
    ) -> Result<Vec<Option<Record>>> {
        let _guard = self.cluster().begin_op()?;

        if digests.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = self.cluster().healthy_nodes().await;
        if nodes.is_empty() {
            return Err(Error::NoAvailableNode);
        }

        // Round-robin the input positions over the nodes, remembering
        // each chunk's original indices for collation.
        let chunk_count = nodes.len().min(digests.len());
        let mut chunks: Vec<(Arc<Node>, Vec<usize>)> = nodes
            .into_iter()
            .take(chunk_count)
            .map(|node| (node, Vec::new()))
            .collect();
        for index in 0..digests.len() {
            chunks[index % chunk_count].1.push(index);
        }

        let requests = chunks.into_iter().map(|(node, indices)| {
            let chunk: Vec<Digest> = indices.iter().map(|&i| digests[i]).collect();
            let namespace = namespace.to_string();
            async move {
                let req = BatchGetRequest {
                    namespace,
                    digests: chunk,
                };
                let body = codec::encode_batch_get(&req)?;
                let (kind, resp_body) =
                    Self::send_to_node(&node, MsgKind::BatchGet, body, timeout_ms).await?;
                if kind != MsgKind::BatchResponse {
                    return Err(Error::Corrupted(format!(
                        "expected batch response frame, got {:?}",
                        kind
                    )));
                }
                let resp = codec::decode_batch_response(&resp_body)?;
                if resp.result != RC_OK {
                    return Err(Error::ServerError(resp.result));
                }
                if resp.records.len() != indices.len() {
                    return Err(Error::Corrupted(format!(
                        "batch response has {} slots for {} digests",
                        resp.records.len(),
                        indices.len()
                    )));
                }
                Ok((indices, resp.records))
            }
        });

        let mut out: Vec<Option<Record>> = vec![None; digests.len()];
        for (indices, records) in try_join_all(requests).await? {
            for (index, record) in indices.into_iter().zip(records) {
                out[index] = record;
            }
        }
        Ok(out)
    }
}
