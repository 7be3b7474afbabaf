//! Durable, session-scoped storage for raw audio chunks
//!
//! Layout under the configured base directory:
//! - `sessions/<session_id>/parts/part_000042.raw` — raw Float32 sample bytes
//! - `sessions/<session_id>/parts/part_000042.meta.json` — per-chunk metadata sidecar
//! - `sessions/<session_id>/final/` — assembled WAV and transcoded artifact
//! - `records.jsonl` — bookkeeping log, kept out of the served `sessions/` tree

mod chunk_store;

pub use chunk_store::{ChunkMeta, ChunkStore};
