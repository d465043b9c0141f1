//! Message body codec
//!
//! Encodes and decodes the bodies of the five request kinds and the two
//! response kinds. A bin travels as (particle tag, name length, name,
//! value length, value); integers are 8-byte big-endian two's complement.
//! Decoding is total over arbitrary input: truncation, unknown tags and
//! invalid UTF-8 all surface as `Corrupted`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{Digest, Error, Result, DIGEST_LEN};
use crate::record::{Bin, ParticleType, Record, Value, MAX_BINS, MAX_BIN_NAME_LEN};

// Result codes reported by the server.
pub const RC_OK: u8 = 0;
pub const RC_UNKNOWN: u8 = 1;
pub const RC_NOT_FOUND: u8 = 2;
pub const RC_GENERATION: u8 = 3;
pub const RC_PARAMETER: u8 = 4;
pub const RC_KEY_EXISTS: u8 = 5;
pub const RC_BIN_EXISTS: u8 = 6;

// Write flags.
pub const FLAG_CREATE_ONLY: u8 = 0x01;
pub const FLAG_EXPECT_GENERATION: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub namespace: String,
    pub digest: Digest,
    pub ttl: u32,
    pub flags: u8,
    pub expect_generation: u32,
    pub bins: Vec<Bin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub namespace: String,
    pub digest: Digest,
    /// Empty means "return all bins".
    pub bin_names: Vec<String>,
}

/// Body shared by delete and exists requests: namespace plus digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub namespace: String,
    pub digest: Digest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGetRequest {
    pub namespace: String,
    pub digests: Vec<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub result: u8,
    pub generation: u32,
    pub ttl: u32,
    pub bins: Vec<Bin>,
}

impl Response {
    pub fn failure(result: u8) -> Self {
        Self {
            result,
            generation: 0,
            ttl: 0,
            bins: Vec::new(),
        }
    }

    pub fn into_record(self) -> Record {
        Record::from_parts(self.bins, self.generation, self.ttl)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponse {
    pub result: u8,
    /// One slot per requested digest, in request order.
    pub records: Vec<Option<Record>>,
}

// === encoding ===

fn put_namespace(buf: &mut BytesMut, namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(Error::InvalidParam("namespace cannot be empty".into()));
    }
    if namespace.len() > u8::MAX as usize {
        return Err(Error::InvalidParam(format!(
            "namespace too long: {} bytes",
            namespace.len()
        )));
    }
    buf.put_u8(namespace.len() as u8);
    buf.put_slice(namespace.as_bytes());
    Ok(())
}

fn put_bin_name(buf: &mut BytesMut, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidParam("bin name cannot be empty".into()));
    }
    if name.len() > MAX_BIN_NAME_LEN {
        return Err(Error::InvalidParam(format!(
            "bin name too long: {} bytes (max {})",
            name.len(),
            MAX_BIN_NAME_LEN
        )));
    }
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
    Ok(())
}

fn put_bin(buf: &mut BytesMut, bin: &Bin) -> Result<()> {
    buf.put_u8(bin.value.particle_type() as u8);
    put_bin_name(buf, &bin.name)?;
    buf.put_u32(bin.value.size() as u32);
    match &bin.value {
        Value::Null => {}
        Value::Int(i) => buf.put_i64(*i),
        Value::Text(s) => buf.put_slice(s.as_bytes()),
        Value::Blob(b) => buf.put_slice(b),
    }
    Ok(())
}

fn put_bins(buf: &mut BytesMut, bins: &[Bin]) -> Result<()> {
    if bins.len() > MAX_BINS {
        return Err(Error::InvalidParam(format!(
            "too many bins: {} (max {})",
            bins.len(),
            MAX_BINS
        )));
    }
    buf.put_u16(bins.len() as u16);
    for bin in bins {
        put_bin(buf, bin)?;
    }
    Ok(())
}

pub fn encode_put(req: &PutRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_namespace(&mut buf, &req.namespace)?;
    buf.put_slice(req.digest.as_bytes());
    buf.put_u32(req.ttl);
    buf.put_u8(req.flags);
    buf.put_u32(req.expect_generation);
    put_bins(&mut buf, &req.bins)?;
    Ok(buf.freeze())
}

pub fn encode_get(req: &GetRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_namespace(&mut buf, &req.namespace)?;
    buf.put_slice(req.digest.as_bytes());
    if req.bin_names.len() > MAX_BINS {
        return Err(Error::InvalidParam(format!(
            "too many selected bins: {} (max {})",
            req.bin_names.len(),
            MAX_BINS
        )));
    }
    buf.put_u16(req.bin_names.len() as u16);
    for name in &req.bin_names {
        put_bin_name(&mut buf, name)?;
    }
    Ok(buf.freeze())
}

pub fn encode_key_request(req: &KeyRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_namespace(&mut buf, &req.namespace)?;
    buf.put_slice(req.digest.as_bytes());
    Ok(buf.freeze())
}

pub fn encode_batch_get(req: &BatchGetRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_namespace(&mut buf, &req.namespace)?;
    buf.put_u32(req.digests.len() as u32);
    for digest in &req.digests {
        buf.put_slice(digest.as_bytes());
    }
    Ok(buf.freeze())
}

pub fn encode_response(resp: &Response) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    buf.put_u8(resp.result);
    buf.put_u32(resp.generation);
    buf.put_u32(resp.ttl);
    put_bins(&mut buf, &resp.bins)?;
    Ok(buf.freeze())
}

pub fn encode_batch_response(resp: &BatchResponse) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    buf.put_u8(resp.result);
    buf.put_u32(resp.records.len() as u32);
    for record in &resp.records {
        match record {
            None => buf.put_u8(0),
            Some(rec) => {
                buf.put_u8(1);
                buf.put_u32(rec.generation());
                buf.put_u32(rec.ttl());
                put_bins(&mut buf, rec.bins())?;
            }
        }
    }
    Ok(buf.freeze())
}

// === decoding ===

/// Bounds-checked cursor over a message body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Corrupted(format!(
                "truncated message: wanted {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let raw = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        Ok(i64::from_be_bytes(bytes))
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| Error::Corrupted("invalid UTF-8 in message".into()))
    }

    fn digest(&mut self) -> Result<Digest> {
        let raw = self.take(DIGEST_LEN)?;
        Digest::try_from(raw)
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::Corrupted(format!(
                "{} trailing bytes after message",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

fn read_namespace(r: &mut Reader<'_>) -> Result<String> {
    let len = r.u8()? as usize;
    r.string(len)
}

fn read_bin(r: &mut Reader<'_>) -> Result<Bin> {
    let ty = ParticleType::from_tag(r.u8()?)?;
    let name_len = r.u8()? as usize;
    let name = r.string(name_len)?;
    let value_len = r.u32()? as usize;

    let value = match ty {
        ParticleType::Null => {
            if value_len != 0 {
                return Err(Error::Corrupted(format!(
                    "null bin {} carries {} payload bytes",
                    name, value_len
                )));
            }
            Value::Null
        }
        ParticleType::Integer => {
            if value_len != 8 {
                return Err(Error::Corrupted(format!(
                    "integer bin {} has {} payload bytes",
                    name, value_len
                )));
            }
            Value::Int(r.i64()?)
        }
        ParticleType::String => Value::Text(r.string(value_len)?),
        ParticleType::Blob => Value::Blob(Bytes::copy_from_slice(r.take(value_len)?)),
    };

    Ok(Bin { name, value })
}

fn read_bins(r: &mut Reader<'_>) -> Result<Vec<Bin>> {
    let count = r.u16()? as usize;
    if count > MAX_BINS {
        return Err(Error::Corrupted(format!(
            "bin count {} exceeds ceiling {}",
            count, MAX_BINS
        )));
    }
    let mut bins = Vec::with_capacity(count);
    for _ in 0..count {
        bins.push(read_bin(r)?);
    }
    Ok(bins)
}

pub fn decode_put(body: &[u8]) -> Result<PutRequest> {
    let mut r = Reader::new(body);
    let namespace = read_namespace(&mut r)?;
    let digest = r.digest()?;
    let ttl = r.u32()?;
    let flags = r.u8()?;
    let expect_generation = r.u32()?;
    let bins = read_bins(&mut r)?;
    r.finish()?;
    Ok(PutRequest {
        namespace,
        digest,
        ttl,
        flags,
        expect_generation,
        bins,
    })
}

pub fn decode_get(body: &[u8]) -> Result<GetRequest> {
    let mut r = Reader::new(body);
    let namespace = read_namespace(&mut r)?;
    let digest = r.digest()?;
    let count = r.u16()? as usize;
    let mut bin_names = Vec::with_capacity(count.min(MAX_BINS));
    for _ in 0..count {
        let len = r.u8()? as usize;
        bin_names.push(r.string(len)?);
    }
    r.finish()?;
    Ok(GetRequest {
        namespace,
        digest,
        bin_names,
    })
}

pub fn decode_key_request(body: &[u8]) -> Result<KeyRequest> {
    let mut r = Reader::new(body);
    let namespace = read_namespace(&mut r)?;
    let digest = r.digest()?;
    r.finish()?;
    Ok(KeyRequest { namespace, digest })
}

pub fn decode_batch_get(body: &[u8]) -> Result<BatchGetRequest> {
    let mut r = Reader::new(body);
    let namespace = read_namespace(&mut r)?;
    let count = r.u32()? as usize;
    let mut digests = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        digests.push(r.digest()?);
    }
    r.finish()?;
    Ok(BatchGetRequest { namespace, digests })
}

pub fn decode_response(body: &[u8]) -> Result<Response> {
    let mut r = Reader::new(body);
    let result = r.u8()?;
    let generation = r.u32()?;
    let ttl = r.u32()?;
    let bins = read_bins(&mut r)?;
    r.finish()?;
    Ok(Response {
        result,
        generation,
        ttl,
        bins,
    })
}

pub fn decode_batch_response(body: &[u8]) -> Result<BatchResponse> {
    let mut r = Reader::new(body);
    let result = r.u8()?;
    let count = r.u32()? as usize;
    let mut records = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        match r.u8()? {
            0 => records.push(None),
            1 => {
                let generation = r.u32()?;
                let ttl = r.u32()?;
                let bins = read_bins(&mut r)?;
                records.push(Some(Record::from_parts(bins, generation, ttl)));
            }
            other => {
                return Err(Error::Corrupted(format!(
                    "invalid presence byte in batch response: {}",
                    other
                )))
            }
        }
    }
    r.finish()?;
    Ok(BatchResponse { result, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_for(n: i64) -> Digest {
        Digest::compute("codec-tests", &Value::int(n)).unwrap()
    }

    fn sample_bins() -> Vec<Bin> {
        vec![
            Bin {
                name: "count".into(),
                value: Value::int(-12345),
            },
            Bin {
                name: "name".into(),
                value: Value::text("épsilon"),
            },
            Bin {
                name: "payload".into(),
                value: Value::blob(vec![0u8, 255, 7, 42]),
            },
            Bin {
                name: "tombstone".into(),
                value: Value::Null,
            },
        ]
    }

    #[test]
    fn test_put_roundtrip() {
        let req = PutRequest {
            namespace: "test".into(),
            digest: digest_for(1),
            ttl: 100_000,
            flags: FLAG_EXPECT_GENERATION,
            expect_generation: 3,
            bins: sample_bins(),
        };
        let body = encode_put(&req).unwrap();
        assert_eq!(decode_put(&body).unwrap(), req);
    }

    #[test]
    fn test_get_roundtrip() {
        let req = GetRequest {
            namespace: "test".into(),
            digest: digest_for(2),
            bin_names: vec!["a".into(), "b".into()],
        };
        let body = encode_get(&req).unwrap();
        assert_eq!(decode_get(&body).unwrap(), req);

        // Empty selector means "all bins" and survives the roundtrip
        let all = GetRequest {
            namespace: "test".into(),
            digest: digest_for(2),
            bin_names: Vec::new(),
        };
        let body = encode_get(&all).unwrap();
        assert_eq!(decode_get(&body).unwrap(), all);
    }

    #[test]
    fn test_key_request_roundtrip() {
        let req = KeyRequest {
            namespace: "test".into(),
            digest: digest_for(3),
        };
        let body = encode_key_request(&req).unwrap();
        assert_eq!(decode_key_request(&body).unwrap(), req);
    }

    #[test]
    fn test_batch_get_roundtrip() {
        let req = BatchGetRequest {
            namespace: "test".into(),
            digests: (0..17).map(digest_for).collect(),
        };
        let body = encode_batch_get(&req).unwrap();
        assert_eq!(decode_batch_get(&body).unwrap(), req);
    }

    #[test]
    fn test_response_roundtrip_all_value_variants() {
        let resp = Response {
            result: RC_OK,
            generation: 7,
            ttl: 86_400,
            bins: sample_bins(),
        };
        let body = encode_response(&resp).unwrap();
        assert_eq!(decode_response(&body).unwrap(), resp);
    }

    #[test]
    fn test_batch_response_preserves_slots() {
        let resp = BatchResponse {
            result: RC_OK,
            records: vec![
                None,
                Some(Record::from_parts(sample_bins(), 2, 60)),
                None,
            ],
        };
        let body = encode_batch_response(&resp).unwrap();
        let back = decode_batch_response(&body).unwrap();
        assert_eq!(back, resp);
        assert_eq!(back.records.len(), 3);
        assert!(back.records[0].is_none());
        assert!(back.records[2].is_none());
    }

    #[test]
    fn test_encode_rejects_empty_namespace() {
        let req = KeyRequest {
            namespace: "".into(),
            digest: digest_for(0),
        };
        assert!(matches!(
            encode_key_request(&req),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn test_encode_rejects_long_bin_name() {
        let req = PutRequest {
            namespace: "test".into(),
            digest: digest_for(0),
            ttl: 0,
            flags: 0,
            expect_generation: 0,
            bins: vec![Bin {
                name: "x".repeat(MAX_BIN_NAME_LEN + 1),
                value: Value::int(1),
            }],
        };
        assert!(matches!(encode_put(&req), Err(Error::InvalidParam(_))));
    }

    #[test]
    fn test_encode_rejects_too_many_bins() {
        let bins: Vec<Bin> = (0..MAX_BINS + 1)
            .map(|i| Bin {
                name: format!("b{}", i),
                value: Value::int(i as i64),
            })
            .collect();
        let req = PutRequest {
            namespace: "test".into(),
            digest: digest_for(0),
            ttl: 0,
            flags: 0,
            expect_generation: 0,
            bins,
        };
        assert!(matches!(encode_put(&req), Err(Error::InvalidParam(_))));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let req = PutRequest {
            namespace: "test".into(),
            digest: digest_for(1),
            ttl: 0,
            flags: 0,
            expect_generation: 0,
            bins: sample_bins(),
        };
        let body = encode_put(&req).unwrap();
        for cut in [1, body.len() / 2, body.len() - 1] {
            assert!(decode_put(&body[..cut]).is_err());
        }
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let req = KeyRequest {
            namespace: "test".into(),
            digest: digest_for(1),
        };
        let mut body = encode_key_request(&req).unwrap().to_vec();
        body.push(0xAB);
        assert!(matches!(
            decode_key_request(&body),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_particle() {
        let resp = Response {
            result: RC_OK,
            generation: 1,
            ttl: 0,
            bins: vec![Bin {
                name: "a".into(),
                value: Value::int(1),
            }],
        };
        let mut body = encode_response(&resp).unwrap().to_vec();
        // First bin's particle tag sits right after result + generation + ttl + count
        body[1 + 4 + 4 + 2] = 99;
        assert!(decode_response(&body).is_err());
    }
}
