use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Metadata persisted alongside each chunk's raw bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Caller-assigned sequence number
    pub seq: u64,

    /// Declared number of samples in the binary payload
    pub sample_count: u64,

    /// Samples that carry real audio; the rest is padding to discard.
    /// Kept signed because clients have been observed sending -1.
    #[serde(default)]
    pub valid_sample_count: Option<i64>,

    /// Per-chunk sample rate override (informational only)
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Per-chunk channel override (informational only)
    #[serde(default)]
    pub channels: Option<u16>,

    /// Client capture timestamp (informational only)
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Filesystem-backed chunk storage, keyed by (session, sequence number).
///
/// Writes are idempotent: a repeated sequence number silently overwrites
/// (last write wins). `list` re-reads the directory on every call, so the
/// finish pipeline always sees what is actually durable rather than what
/// some in-memory buffer remembers.
///
/// Layout: session directories live under `<base>/sessions/`, which is the
/// only tree exposed over HTTP. The bookkeeping log stays at
/// `<base>/records.jsonl`, outside anything publicly served.
pub struct ChunkStore {
    base_dir: PathBuf,
    sessions_root: PathBuf,
}

impl ChunkStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let sessions_root = base_dir.join("sessions");
        fs::create_dir_all(&sessions_root)
            .with_context(|| format!("Failed to create sessions root: {:?}", sessions_root))?;

        info!("Chunk store initialized at {:?}", base_dir);

        Ok(Self {
            base_dir,
            sessions_root,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Root of the per-session tree; safe to serve as static files
    pub fn sessions_root(&self) -> &Path {
        &self.sessions_root
    }

    /// Path of the finished-artifact bookkeeping log. Deliberately a sibling
    /// of `sessions_root`, never inside it.
    pub fn records_path(&self) -> PathBuf {
        self.base_dir.join("records.jsonl")
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_root.join(session_id)
    }

    fn parts_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("parts")
    }

    fn part_path(&self, session_id: &str, seq: u64) -> PathBuf {
        self.parts_dir(session_id).join(format!("part_{:06}.raw", seq))
    }

    fn meta_path(&self, session_id: &str, seq: u64) -> PathBuf {
        self.parts_dir(session_id)
            .join(format!("part_{:06}.meta.json", seq))
    }

    /// Allocate storage for a new session (called on `start`)
    pub fn create_session(&self, session_id: &str) -> Result<()> {
        let dir = self.parts_dir(session_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session parts dir: {:?}", dir))?;
        Ok(())
    }

    /// Persist one chunk's bytes and metadata. Durable before return:
    /// the receive loop does not process further frames for the session
    /// until this resolves.
    pub async fn put(&self, session_id: &str, seq: u64, bytes: &[u8], meta: &ChunkMeta) -> Result<()> {
        let parts_dir = self.parts_dir(session_id);
        tokio::fs::create_dir_all(&parts_dir)
            .await
            .with_context(|| format!("Failed to create parts dir: {:?}", parts_dir))?;

        let raw_path = self.part_path(session_id, seq);
        tokio::fs::write(&raw_path, bytes)
            .await
            .with_context(|| format!("Failed to write chunk bytes: {:?}", raw_path))?;

        let meta_json = serde_json::to_vec(meta).context("Failed to serialize chunk metadata")?;
        let meta_path = self.meta_path(session_id, seq);
        tokio::fs::write(&meta_path, meta_json)
            .await
            .with_context(|| format!("Failed to write chunk metadata: {:?}", meta_path))?;

        Ok(())
    }

    /// All persisted sequence numbers for a session, ascending.
    ///
    /// Re-reads the directory every call; an unknown or empty session yields
    /// an empty Vec (the caller decides whether that is an error).
    pub async fn list(&self, session_id: &str) -> Result<Vec<u64>> {
        let parts_dir = self.parts_dir(session_id);

        let mut entries = match tokio::fs::read_dir(&parts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read parts dir: {:?}", parts_dir))
            }
        };

        let mut seqs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if let Some(seq) = name
                .strip_prefix("part_")
                .and_then(|rest| rest.strip_suffix(".raw"))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                seqs.push(seq);
            }
        }

        seqs.sort_unstable();
        Ok(seqs)
    }

    /// Read back one chunk's bytes and metadata
    pub async fn read(&self, session_id: &str, seq: u64) -> Result<(Vec<u8>, ChunkMeta)> {
        let raw_path = self.part_path(session_id, seq);
        let bytes = tokio::fs::read(&raw_path)
            .await
            .with_context(|| format!("Failed to read chunk bytes: {:?}", raw_path))?;

        let meta_path = self.meta_path(session_id, seq);
        let meta_json = tokio::fs::read(&meta_path)
            .await
            .with_context(|| format!("Failed to read chunk metadata: {:?}", meta_path))?;
        let meta: ChunkMeta =
            serde_json::from_slice(&meta_json).context("Failed to parse chunk metadata")?;

        Ok((bytes, meta))
    }

    /// Directory for a session's final artifacts (creates it)
    pub fn final_dir(&self, session_id: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session_id).join("final");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create final dir: {:?}", dir))?;
        Ok(dir)
    }

    /// Collision-free base name for a session's final artifacts
    pub fn artifact_base_name(session_id: &str) -> String {
        let ts = chrono::Utc::now().timestamp();
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..6];
        format!("{}__{}__{}", session_id, ts, suffix)
    }

    /// Reclaim storage from sessions that were abandoned mid-recording:
    /// a session directory with no final artifact whose newest file is older
    /// than `ttl` is deleted. Returns the number of sessions removed.
    ///
    /// Walks the tree with blocking fs calls; run it through
    /// `spawn_blocking` when calling from async code.
    pub fn sweep_orphans(&self, ttl: Duration) -> Result<usize> {
        let cutoff = SystemTime::now() - ttl;
        let mut removed = 0;

        for entry in fs::read_dir(&self.sessions_root).context("Failed to read sessions root")? {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            // A session that produced a final artifact is not an orphan
            let final_dir = path.join("final");
            if final_dir
                .read_dir()
                .map(|mut d| d.next().is_some())
                .unwrap_or(false)
            {
                continue;
            }

            // Empty parts dir (started, never sent a chunk): age by the
            // session dir itself
            let newest = Self::newest_mtime(&path.join("parts"))
                .or_else(|| entry.metadata().ok().and_then(|m| m.modified().ok()));

            if let Some(newest) = newest {
                if newest < cutoff {
                    if let Err(e) = fs::remove_dir_all(&path) {
                        warn!("Failed to remove orphaned session dir {:?}: {}", path, e);
                    } else {
                        info!("Removed orphaned session dir {:?}", path);
                        removed += 1;
                    }
                }
            }
        }

        Ok(removed)
    }

    fn newest_mtime(parts_dir: &Path) -> Option<SystemTime> {
        let entries = fs::read_dir(parts_dir).ok()?;
        let mut newest: Option<SystemTime> = None;

        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                if let Ok(mtime) = meta.modified() {
                    newest = Some(match newest {
                        Some(n) if n >= mtime => n,
                        _ => mtime,
                    });
                }
            }
        }

        newest
    }
}
