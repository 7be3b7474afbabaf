use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Opaque session-owner identity, handed to the capture pipeline by the
/// authentication collaborator. The pipeline never inspects it.
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bookkeeping record for a finished artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedRecord {
    pub session_id: String,
    pub owner: String,
    pub artifact_location: String,
    pub transcript: String,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator boundary: receives finished artifacts for
/// bookkeeping. Failures here must never fail the pipeline that produced
/// the artifact.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn record_finished(&self, record: &FinishedRecord) -> Result<()>;
}

/// Appends one JSON line per finished artifact
pub struct JsonlRecordSink {
    path: PathBuf,
}

impl JsonlRecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSink for JsonlRecordSink {
    async fn record_finished(&self, record: &FinishedRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("Failed to serialize record")?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open records file: {:?}", self.path))?;

        file.write_all(&line)
            .await
            .context("Failed to append record")?;

        Ok(())
    }
}
