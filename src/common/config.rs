//! Configuration for binkv clients

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::{Error, Result};

/// TTL sentinel: let the server apply its configured default.
pub const TTL_SERVER_DEFAULT: u32 = 0;

/// TTL sentinel: the record never expires.
pub const TTL_NEVER_EXPIRE: u32 = u32::MAX;

/// Per-write tunables.
///
/// `expect_generation` gates the write on the record's current generation
/// (a compare-and-set), `create_only` makes it succeed only if the key did
/// not exist before. Both default to off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteParams {
    /// Per-call deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,

    /// Seconds until the server may expire the record (0 = server default)
    #[serde(default)]
    pub ttl: u32,

    /// Write succeeds only if the server-side generation equals this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_generation: Option<u32>,

    /// Write succeeds only if the key did not exist before
    #[serde(default)]
    pub create_only: bool,
}

fn default_timeout_ms() -> u32 {
    1000
}

impl Default for WriteParams {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            ttl: TTL_SERVER_DEFAULT,
            expect_generation: None,
            create_only: false,
        }
    }
}

impl WriteParams {
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Gate the write on the record's current generation.
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.expect_generation = Some(generation);
        self
    }

    /// Make the write succeed only if the key did not exist before.
    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }
}

/// A seed host endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub address: String,
    pub port: u16,
}

impl std::fmt::Display for HostSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seed hosts to dial on connect
    #[serde(default)]
    pub hosts: Vec<HostSpec>,

    /// Deadline for establishing reachability of a host
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u32,

    /// Default write parameters
    #[serde(default)]
    pub write: WriteParams,
}

fn default_connect_timeout_ms() -> u32 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write: WriteParams::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path.as_ref().to_path_buf()))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to read config: {}", e)))?;

        cfg.try_deserialize()
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {}", e)))
    }
}
