//! Digest derivation for record addressing
//!
//! A record is addressed by a 160-bit RIPEMD-160 digest over the set name
//! and the typed encoding of its primary key: set bytes, then the key's
//! particle type tag, then the key payload (integers as 8-byte big-endian,
//! text and blobs as raw bytes). The derivation must match the server's
//! exactly, or digest-addressed operations will miss the record.

use ripemd::{Digest as _, Ripemd160};
use std::fmt;

use crate::common::{Error, Result};
use crate::record::{ParticleType, Value};

/// Digest length in bytes (160 bits).
pub const DIGEST_LEN: usize = 20;

/// A record address: one-way hash over (set name, typed primary key).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Parse a digest from its 40-character hex form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| Error::InvalidParam(format!("invalid digest hex: {}", e)))?;
        let bytes: [u8; DIGEST_LEN] = raw.as_slice().try_into().map_err(|_| {
            Error::InvalidParam(format!(
                "digest must be {} bytes, got {}",
                DIGEST_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Derive the digest for a (set, primary key) pair.
    ///
    /// Deterministic and pure: repeated calls yield identical bytes, so
    /// callers may cache the result or dedup batch inputs on it. Null is
    /// not a valid primary key.
    pub fn compute(set: &str, key: &Value) -> Result<Self> {
        let mut hasher = Ripemd160::new();
        hasher.update(set.as_bytes());
        match key {
            Value::Int(i) => {
                hasher.update([ParticleType::Integer as u8]);
                hasher.update(i.to_be_bytes());
            }
            Value::Text(s) => {
                hasher.update([ParticleType::String as u8]);
                hasher.update(s.as_bytes());
            }
            Value::Blob(b) => {
                hasher.update([ParticleType::Blob as u8]);
                hasher.update(&b[..]);
            }
            Value::Null => {
                return Err(Error::InvalidParam(
                    "null cannot be used as a primary key".into(),
                ))
            }
        }
        Ok(Self(hasher.finalize().into()))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; DIGEST_LEN] = raw.try_into().map_err(|_| {
            Error::InvalidParam(format!(
                "digest must be {} bytes, got {}",
                DIGEST_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}
