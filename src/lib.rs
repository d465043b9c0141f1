//! # binkv
//!
//! A cluster-aware, bin-structured key-value client:
//! - records are ordered sets of named, typed bins (integer, text, blob)
//! - records are addressed by primary key or by 160-bit digest
//! - batch retrieval by digest list, collated in request order
//! - explicit cluster lifecycle with per-host health tracking
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                  Client                    │
//! │   put / get / get_all / delete / exists    │
//! │              batch_get                     │
//! └──────────────────┬─────────────────────────┘
//!                    │ framed, CRC-checked messages
//! ┌──────────────────▼─────────────────────────┐
//! │                 Cluster                    │
//! │  (membership, health, node selection,      │
//! │   Created → Active → ShuttingDown → Closed)│
//! └─────┬──────────────┬──────────────┬────────┘
//!       │              │              │
//! ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//! │  Node 1   │  │  Node 2   │  │  Node 3   │
//! │ Transport │  │ Transport │  │ Transport │
//! └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use binkv::{Client, Cluster, Key, Record, Value, WriteParams};
//!
//! # async fn demo() -> binkv::Result<()> {
//! let cluster = Arc::new(Cluster::new());
//! cluster.add_host("127.0.0.1", 3000, 1000).await?;
//! let client = Client::new(cluster.clone());
//!
//! let key = Key::new("test", "demo", Value::int(42))?;
//! let record = Record::new().with_bin("intval", Value::int(7));
//! client.put(&key, &record, &WriteParams::default().with_ttl(100_000)).await?;
//!
//! let fetched = client.get_all(&key, 1000).await?;
//! assert_eq!(fetched.bin("intval")?.as_int()?, 7);
//! assert_eq!(fetched.generation(), 1);
//!
//! cluster.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cluster;
pub mod common;
pub mod net;
pub mod record;
pub mod wire;

// Re-export commonly used types
pub use client::Client;
pub use cluster::{Cluster, Lifecycle, Node, NodeState};
pub use common::{
    ClientConfig, Digest, Error, HostSpec, Result, WriteParams, DIGEST_LEN, TTL_NEVER_EXPIRE,
    TTL_SERVER_DEFAULT,
};
pub use record::{Bin, Key, ParticleType, Record, Value};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
