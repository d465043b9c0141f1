//! Record addressing
//!
//! A `Key` names a single record: namespace plus either a (set, primary
//! key) pair, from which the digest is derived eagerly, or a raw digest
//! for pre-addressed lookups.

use crate::common::{Digest, Result};
use crate::record::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    namespace: String,
    set: String,
    user_key: Option<Value>,
    digest: Digest,
}

impl Key {
    /// Build a key from a (namespace, set, primary key) triple and derive
    /// its digest. Two keys with equal namespace and digest address the
    /// same record.
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        key: impl Into<Value>,
    ) -> Result<Self> {
        let set = set.into();
        let key = key.into();
        let digest = Digest::compute(&set, &key)?;
        Ok(Self {
            namespace: namespace.into(),
            set,
            user_key: Some(key),
            digest,
        })
    }

    /// Build a pre-addressed key from a raw digest.
    ///
    /// Bypasses hashing entirely. Digests are one-way, so no validation
    /// is possible; the caller owns correctness.
    pub fn from_digest(namespace: impl Into<String>, digest: Digest) -> Self {
        Self {
            namespace: namespace.into(),
            set: String::new(),
            user_key: None,
            digest,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Set name; empty for digest-form keys.
    pub fn set(&self) -> &str {
        &self.set
    }

    /// The original primary key, if this key was not built from a digest.
    pub fn user_key(&self) -> Option<&Value> {
        self.user_key.as_ref()
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}
