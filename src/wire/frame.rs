//! Message framing
//!
//! Frame layout: [MAGIC][KIND][BODY_LEN][BODY][CRC32]
//!
//! The magic pins the protocol revision, the length delimits the body on
//! a byte stream, and the CRC32 trailer covers the body. All multi-byte
//! integers are big-endian.

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{Error, Result};

pub const FRAME_MAGIC: [u8; 4] = *b"BKV1";

/// Magic (4) + kind (1) + body length (4).
pub const HEADER_LEN: usize = 9;

/// CRC32 trailer length.
pub const TRAILER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    Put = 1,
    Get = 2,
    Delete = 3,
    BatchGet = 4,
    Exists = 5,
    Response = 6,
    BatchResponse = 7,
}

impl MsgKind {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(MsgKind::Put),
            2 => Ok(MsgKind::Get),
            3 => Ok(MsgKind::Delete),
            4 => Ok(MsgKind::BatchGet),
            5 => Ok(MsgKind::Exists),
            6 => Ok(MsgKind::Response),
            7 => Ok(MsgKind::BatchResponse),
            other => Err(Error::Corrupted(format!("unknown message kind: {}", other))),
        }
    }
}

/// Wrap a message body into a framed buffer.
pub fn seal(kind: MsgKind, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN);
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u8(kind as u8);
    buf.put_u32(body.len() as u32);
    buf.put_slice(body);
    buf.put_u32(crc32fast::hash(body));
    buf.freeze()
}

/// Parse a frame header, returning the message kind and body length.
pub fn parse_header(header: &[u8; HEADER_LEN]) -> Result<(MsgKind, usize)> {
    if header[..4] != FRAME_MAGIC {
        return Err(Error::Corrupted("invalid frame magic".into()));
    }
    let kind = MsgKind::from_tag(header[4])?;
    let body_len = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) as usize;
    Ok((kind, body_len))
}

/// Unwrap a complete framed buffer, verifying magic, length and CRC.
pub fn open(raw: &[u8]) -> Result<(MsgKind, Bytes)> {
    if raw.len() < HEADER_LEN + TRAILER_LEN {
        return Err(Error::Corrupted(format!("truncated frame: {} bytes", raw.len())));
    }
    let header: [u8; HEADER_LEN] = raw[..HEADER_LEN].try_into().expect("header slice");
    let (kind, body_len) = parse_header(&header)?;

    if raw.len() != HEADER_LEN + body_len + TRAILER_LEN {
        return Err(Error::Corrupted(format!(
            "frame length mismatch: header says {} body bytes, frame is {}",
            body_len,
            raw.len()
        )));
    }

    let body = &raw[HEADER_LEN..HEADER_LEN + body_len];
    let expected = u32::from_be_bytes(
        raw[HEADER_LEN + body_len..]
            .try_into()
            .expect("trailer slice"),
    );
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    Ok((kind, Bytes::copy_from_slice(body)))
}
