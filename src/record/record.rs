//! Bin-structured records
//!
//! A record is an ordered sequence of named bins plus metadata the server
//! maintains: the generation counter (incremented on every successful
//! write) and the remaining TTL. Generation and TTL are set only when a
//! response is decoded; a caller-built record carries zeroes.

use crate::common::{Error, Result};
use crate::record::Value;

/// Ceiling on bin name length in bytes.
pub const MAX_BIN_NAME_LEN: usize = 31;

/// Ceiling on bins per record.
pub const MAX_BINS: usize = 256;

/// A named field within a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    bins: Vec<Bin>,
    generation: u32,
    ttl: u32,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(bins: Vec<Bin>, generation: u32, ttl: u32) -> Self {
        Self {
            bins,
            generation,
            ttl,
        }
    }

    /// Append-or-replace a bin by name. Replacing keeps the insertion
    /// order of the first occurrence.
    pub fn set_bin(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.bins.iter().position(|b| b.name == name) {
            Some(pos) => self.bins[pos].value = value,
            None => self.bins.push(Bin { name, value }),
        }
    }

    /// Chaining variant of [`set_bin`](Self::set_bin).
    pub fn with_bin(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_bin(name, value);
        self
    }

    pub fn bin(&self, name: &str) -> Result<&Value> {
        self.bins
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
            .ok_or_else(|| Error::BinNotFound(name.to_string()))
    }

    pub fn has_bin(&self, name: &str) -> bool {
        self.bins.iter().any(|b| b.name == name)
    }

    /// Bin names in insertion order.
    pub fn bin_names(&self) -> impl Iterator<Item = &str> {
        self.bins.iter().map(|b| b.name.as_str())
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Server-side write counter. Zero until a response has been decoded.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Seconds until expiry as reported by the server.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }
}
