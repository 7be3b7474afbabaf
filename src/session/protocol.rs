//! Wire protocol: JSON control messages interleaved with binary PCM frames.
//!
//! A `chunk_meta` message must be immediately followed by exactly one binary
//! frame of `sample_count * 4` bytes (little-endian Float32 samples).

use serde::{Deserialize, Serialize};

/// Control messages from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Start {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        sample_rate: Option<u32>,
        #[serde(default)]
        channels: Option<u16>,
    },
    ChunkMeta {
        seq: u64,
        sample_count: u64,
        #[serde(default)]
        valid_sample_count: Option<i64>,
        #[serde(default)]
        sample_rate: Option<u32>,
        #[serde(default)]
        channels: Option<u16>,
        #[serde(default)]
        timestamp: Option<f64>,
    },
    Stop {
        #[serde(default)]
        session_id: Option<String>,
    },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Ack of `start`, naming the effective session identifier
    Started { session_id: String },
    /// Ack of `stop`, sent before the finish pipeline runs
    Processing,
    /// Finished artifact, delivered best-effort
    Result {
        artifact_location: String,
        transcript: String,
    },
    /// Any failure at any stage
    Error { message: String },
}
