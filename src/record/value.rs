//! Typed bin values
//!
//! A `Value` is the content of one bin (or a primary key): a 64-bit
//! integer, UTF-8 text, an opaque blob, or null. The particle type tag
//! travels with the value on the wire and in digest derivation.

use bytes::Bytes;
use std::fmt;

use crate::common::{Error, Result};

/// Wire type tags for values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParticleType {
    Null = 0,
    Integer = 1,
    String = 3,
    Blob = 4,
}

impl ParticleType {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ParticleType::Null),
            1 => Ok(ParticleType::Integer),
            3 => Ok(ParticleType::String),
            4 => Ok(ParticleType::Blob),
            other => Err(Error::Corrupted(format!("unknown particle type: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParticleType::Null => "null",
            ParticleType::Integer => "integer",
            ParticleType::String => "string",
            ParticleType::Blob => "blob",
        }
    }
}

/// A bin's content. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Blob(Bytes),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Int(v)
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(v.into())
    }

    pub fn blob(v: impl Into<Bytes>) -> Self {
        Value::Blob(v.into())
    }

    pub fn particle_type(&self) -> ParticleType {
        match self {
            Value::Null => ParticleType::Null,
            Value::Int(_) => ParticleType::Integer,
            Value::Text(_) => ParticleType::String,
            Value::Blob(_) => ParticleType::Blob,
        }
    }

    /// Payload size in bytes as encoded on the wire.
    pub fn size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Int(_) => 8,
            Value::Text(s) => s.len(),
            Value::Blob(b) => b.len(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(Error::TypeMismatch {
                expected: ParticleType::Integer.name(),
                actual: other.particle_type().name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(Error::TypeMismatch {
                expected: ParticleType::String.name(),
                actual: other.particle_type().name(),
            }),
        }
    }

    pub fn as_blob(&self) -> Result<&Bytes> {
        match self {
            Value::Blob(b) => Ok(b),
            other => Err(Error::TypeMismatch {
                expected: ParticleType::Blob.name(),
                actual: other.particle_type().name(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Blob(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Bytes::from(v))
    }
}
