//! In-process transport backed by a `MemServer`
//!
//! `MemServer` holds records in a mutexed map and answers requests
//! through the same codec as a remote node: generation increments on
//! every accepted write, generation gating and create-only are honored,
//! and delete is "ensure absence". Tests and local development use it
//! through [`MemConnector`]; the TCP integration tests serve its state
//! over a real socket.

use bytes::Bytes;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{Digest, Error, Result};
use crate::net::{Connector, Transport};
use crate::record::{Bin, Record};
use crate::wire::codec::{
    self, BatchResponse, Response, FLAG_CREATE_ONLY, FLAG_EXPECT_GENERATION, RC_GENERATION,
    RC_KEY_EXISTS, RC_NOT_FOUND, RC_OK,
};
use crate::wire::frame::{self, MsgKind};

#[derive(Debug, Clone)]
struct StoredRecord {
    bins: Vec<Bin>,
    generation: u32,
    ttl: u32,
}

/// In-process store node speaking the binkv wire format.
#[derive(Default)]
pub struct MemServer {
    records: Mutex<HashMap<(String, Digest), StoredRecord>>,
}

impl MemServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Handle one framed request, producing a framed response.
    pub fn handle(&self, request: &[u8]) -> Result<Bytes> {
        let (kind, body) = frame::open(request)?;
        match kind {
            MsgKind::Put => self.on_put(&body),
            MsgKind::Get => self.on_get(&body),
            MsgKind::Delete => self.on_delete(&body),
            MsgKind::Exists => self.on_exists(&body),
            MsgKind::BatchGet => self.on_batch_get(&body),
            MsgKind::Response | MsgKind::BatchResponse => {
                Err(Error::Corrupted("unexpected response frame".into()))
            }
        }
    }

    fn on_put(&self, body: &[u8]) -> Result<Bytes> {
        let req = codec::decode_put(body)?;
        let mut records = self.records.lock().unwrap();

        let slot = (req.namespace.clone(), req.digest);
        let resp = match records.entry(slot) {
            Entry::Occupied(mut entry) => {
                if req.flags & FLAG_CREATE_ONLY != 0 {
                    Response::failure(RC_KEY_EXISTS)
                } else if req.flags & FLAG_EXPECT_GENERATION != 0
                    && entry.get().generation != req.expect_generation
                {
                    Response::failure(RC_GENERATION)
                } else {
                    let existing = entry.get_mut();
                    for bin in req.bins {
                        match existing.bins.iter().position(|b| b.name == bin.name) {
                            Some(pos) => existing.bins[pos].value = bin.value,
                            None => existing.bins.push(bin),
                        }
                    }
                    existing.generation += 1;
                    existing.ttl = req.ttl;
                    Response {
                        result: RC_OK,
                        generation: existing.generation,
                        ttl: existing.ttl,
                        bins: Vec::new(),
                    }
                }
            }
            Entry::Vacant(entry) => {
                if req.flags & FLAG_EXPECT_GENERATION != 0 {
                    // Nothing to compare the expected generation against
                    Response::failure(RC_GENERATION)
                } else {
                    entry.insert(StoredRecord {
                        bins: req.bins,
                        generation: 1,
                        ttl: req.ttl,
                    });
                    Response {
                        result: RC_OK,
                        generation: 1,
                        ttl: req.ttl,
                        bins: Vec::new(),
                    }
                }
            }
        };

        Ok(frame::seal(MsgKind::Response, &codec::encode_response(&resp)?))
    }

    fn on_get(&self, body: &[u8]) -> Result<Bytes> {
        let req = codec::decode_get(body)?;
        let records = self.records.lock().unwrap();

        let resp = match records.get(&(req.namespace, req.digest)) {
            None => Response::failure(RC_NOT_FOUND),
            Some(rec) => {
                let bins = if req.bin_names.is_empty() {
                    rec.bins.clone()
                } else {
                    rec.bins
                        .iter()
                        .filter(|b| req.bin_names.iter().any(|n| n == &b.name))
                        .cloned()
                        .collect()
                };
                Response {
                    result: RC_OK,
                    generation: rec.generation,
                    ttl: rec.ttl,
                    bins,
                }
            }
        };

        Ok(frame::seal(MsgKind::Response, &codec::encode_response(&resp)?))
    }

    fn on_delete(&self, body: &[u8]) -> Result<Bytes> {
        let req = codec::decode_key_request(body)?;
        let mut records = self.records.lock().unwrap();

        // Deletion is "ensure absence": removing a missing key succeeds
        records.remove(&(req.namespace, req.digest));
        let resp = Response {
            result: RC_OK,
            generation: 0,
            ttl: 0,
            bins: Vec::new(),
        };

        Ok(frame::seal(MsgKind::Response, &codec::encode_response(&resp)?))
    }

    fn on_exists(&self, body: &[u8]) -> Result<Bytes> {
        let req = codec::decode_key_request(body)?;
        let records = self.records.lock().unwrap();

        let resp = match records.get(&(req.namespace, req.digest)) {
            None => Response::failure(RC_NOT_FOUND),
            Some(rec) => Response {
                result: RC_OK,
                generation: rec.generation,
                ttl: rec.ttl,
                bins: Vec::new(),
            },
        };

        Ok(frame::seal(MsgKind::Response, &codec::encode_response(&resp)?))
    }

    fn on_batch_get(&self, body: &[u8]) -> Result<Bytes> {
        let req = codec::decode_batch_get(body)?;
        let records = self.records.lock().unwrap();

        let slots = req
            .digests
            .iter()
            .map(|digest| {
                records
                    .get(&(req.namespace.clone(), *digest))
                    .map(|rec| Record::from_parts(rec.bins.clone(), rec.generation, rec.ttl))
            })
            .collect();

        let resp = BatchResponse {
            result: RC_OK,
            records: slots,
        };
        Ok(frame::seal(
            MsgKind::BatchResponse,
            &codec::encode_batch_response(&resp)?,
        ))
    }
}

/// Transport that hands frames straight to a shared [`MemServer`].
pub struct MemTransport {
    server: Arc<MemServer>,
}

impl std::fmt::Debug for MemTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for MemTransport {
    async fn send(&self, request: Bytes, _deadline: Duration) -> Result<Bytes> {
        self.server.handle(&request)
    }
}

/// Connector yielding [`MemTransport`]s to one shared server.
pub struct MemConnector {
    server: Arc<MemServer>,
}

impl MemConnector {
    pub fn new(server: Arc<MemServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Connector for MemConnector {
    async fn connect(
        &self,
        _address: &str,
        _port: u16,
        _timeout: Duration,
    ) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(MemTransport {
            server: self.server.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use crate::wire::codec::{GetRequest, PutRequest};

    fn put_frame(server: &MemServer, digest: Digest, bins: Vec<Bin>, flags: u8, generation: u32) -> Response {
        let req = PutRequest {
            namespace: "test".into(),
            digest,
            ttl: 0,
            flags,
            expect_generation: generation,
            bins,
        };
        let framed = frame::seal(MsgKind::Put, &codec::encode_put(&req).unwrap());
        let raw = server.handle(&framed).unwrap();
        let (kind, body) = frame::open(&raw).unwrap();
        assert_eq!(kind, MsgKind::Response);
        codec::decode_response(&body).unwrap()
    }

    fn get_frame(server: &MemServer, digest: Digest) -> Response {
        let req = GetRequest {
            namespace: "test".into(),
            digest,
            bin_names: Vec::new(),
        };
        let framed = frame::seal(MsgKind::Get, &codec::encode_get(&req).unwrap());
        let raw = server.handle(&framed).unwrap();
        let (_, body) = frame::open(&raw).unwrap();
        codec::decode_response(&body).unwrap()
    }

    fn bin(name: &str, v: i64) -> Bin {
        Bin {
            name: name.into(),
            value: Value::int(v),
        }
    }

    #[test]
    fn test_put_increments_generation() {
        let server = MemServer::new();
        let digest = Digest::compute("demo", &Value::int(1)).unwrap();

        let resp = put_frame(&server, digest, vec![bin("a", 1)], 0, 0);
        assert_eq!(resp.result, RC_OK);
        assert_eq!(resp.generation, 1);

        let resp = put_frame(&server, digest, vec![bin("a", 2)], 0, 0);
        assert_eq!(resp.generation, 2);

        let resp = get_frame(&server, digest);
        assert_eq!(resp.generation, 2);
        assert_eq!(resp.bins, vec![bin("a", 2)]);
    }

    #[test]
    fn test_put_merges_bins() {
        let server = MemServer::new();
        let digest = Digest::compute("demo", &Value::int(2)).unwrap();

        put_frame(&server, digest, vec![bin("a", 1), bin("b", 2)], 0, 0);
        put_frame(&server, digest, vec![bin("b", 20), bin("c", 3)], 0, 0);

        let resp = get_frame(&server, digest);
        assert_eq!(resp.bins, vec![bin("a", 1), bin("b", 20), bin("c", 3)]);
    }

    #[test]
    fn test_generation_gate() {
        let server = MemServer::new();
        let digest = Digest::compute("demo", &Value::int(3)).unwrap();

        put_frame(&server, digest, vec![bin("a", 1)], 0, 0);
        let resp = put_frame(&server, digest, vec![bin("a", 2)], FLAG_EXPECT_GENERATION, 1);
        assert_eq!(resp.result, RC_OK);

        let resp = put_frame(&server, digest, vec![bin("a", 3)], FLAG_EXPECT_GENERATION, 1);
        assert_eq!(resp.result, RC_GENERATION);

        // A gated write against an absent record has nothing to match
        let absent = Digest::compute("demo", &Value::int(99)).unwrap();
        let resp = put_frame(&server, absent, vec![bin("a", 1)], FLAG_EXPECT_GENERATION, 0);
        assert_eq!(resp.result, RC_GENERATION);
    }

    #[test]
    fn test_create_only() {
        let server = MemServer::new();
        let digest = Digest::compute("demo", &Value::int(4)).unwrap();

        let resp = put_frame(&server, digest, vec![bin("a", 1)], FLAG_CREATE_ONLY, 0);
        assert_eq!(resp.result, RC_OK);

        let resp = put_frame(&server, digest, vec![bin("a", 2)], FLAG_CREATE_ONLY, 0);
        assert_eq!(resp.result, RC_KEY_EXISTS);
    }

    #[test]
    fn test_mem_transport_send() {
        let server = Arc::new(MemServer::new());
        let digest = Digest::compute("demo", &Value::int(5)).unwrap();

        tokio_test::block_on(async {
            let transport = MemConnector::new(server.clone())
                .connect("127.0.0.1", 3000, Duration::from_millis(100))
                .await
                .unwrap();

            let req = PutRequest {
                namespace: "test".into(),
                digest,
                ttl: 0,
                flags: 0,
                expect_generation: 0,
                bins: vec![bin("a", 7)],
            };
            let framed = frame::seal(MsgKind::Put, &codec::encode_put(&req).unwrap());
            let raw = transport
                .send(framed, Duration::from_millis(100))
                .await
                .unwrap();
            let (kind, body) = frame::open(&raw).unwrap();
            assert_eq!(kind, MsgKind::Response);
            assert_eq!(codec::decode_response(&body).unwrap().result, RC_OK);
        });

        assert_eq!(server.record_count(), 1);
    }
}
