//! The finish pipeline: settle-wait, assemble, encode, transcribe, deliver.
//!
//! Triggered once per session by `stop` and detached from the connection's
//! receive loop. Encoding failures are fatal to the pipeline instance;
//! transcription failures degrade to an empty transcript; delivery failures
//! are logged only.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::protocol::ServerMessage;
use super::registry::{SessionRegistry, SessionState};
use super::sink::{FinishedRecord, OwnerId, RecordSink};
use crate::audio::assembler;
use crate::encode::Encoder;
use crate::error::PipelineError;
use crate::store::ChunkStore;
use crate::transcribe::Transcriber;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum total wait for just-written chunks to become visible
    pub settle_wait: Duration,
    /// Poll interval within the settle-wait
    pub settle_poll: Duration,
    /// URL path prefix under which the storage root is served
    pub public_base: String,
}

/// The finished artifact as delivered to the client
#[derive(Debug, Clone)]
pub struct FinishedArtifact {
    pub artifact_location: String,
    pub transcript: String,
}

pub struct FinishPipeline {
    store: Arc<ChunkStore>,
    encoder: Arc<dyn Encoder>,
    transcriber: Arc<dyn Transcriber>,
    sink: Arc<dyn RecordSink>,
    settings: PipelineSettings,
}

impl FinishPipeline {
    pub fn new(
        store: Arc<ChunkStore>,
        encoder: Arc<dyn Encoder>,
        transcriber: Arc<dyn Transcriber>,
        sink: Arc<dyn RecordSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            encoder,
            transcriber,
            sink,
            settings,
        }
    }

    /// Run the full finish pipeline for one session
    pub async fn run(
        &self,
        session_id: &str,
        owner: &OwnerId,
        sample_rate: u32,
        channels: u16,
    ) -> Result<FinishedArtifact> {
        let seqs = self.wait_for_chunks(session_id).await?;

        info!("[{}] processing: {} chunks", session_id, seqs.len());

        let mut chunks = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let chunk = self
                .store
                .read(session_id, seq)
                .await
                .with_context(|| format!("Failed to read chunk {}", seq))?;
            chunks.push(chunk);
        }

        let final_dir = self.store.final_dir(session_id)?;
        let base_name = ChunkStore::artifact_base_name(session_id);
        let out_wav = final_dir.join(format!("{}.wav", base_name));
        let out_mp3 = final_dir.join(format!("{}.mp3", base_name));

        let stats = assembler::assemble(&chunks, &out_wav, sample_rate, channels)?;

        self.encoder
            .encode(&out_wav, &out_mp3)
            .await
            .with_context(|| format!("Encoding failed for session {}", session_id))?;

        // Best-effort: the recording must never be lost because a
        // transcription call failed.
        let transcript = match self.transcriber.transcribe(&out_mp3).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "[{}] transcription failed, continuing without transcript: {:#}",
                    session_id, e
                );
                String::new()
            }
        };

        let file_name = out_mp3
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(base_name);
        let artifact_location = format!(
            "{}/{}/final/{}",
            self.settings.public_base.trim_end_matches('/'),
            session_id,
            file_name
        );

        let size_bytes = tokio::fs::metadata(&out_mp3)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let record = FinishedRecord {
            session_id: session_id.to_string(),
            owner: owner.0.clone(),
            artifact_location: artifact_location.clone(),
            transcript: transcript.clone(),
            duration_seconds: stats.duration_seconds,
            size_bytes,
            created_at: Utc::now(),
        };

        if let Err(e) = self.sink.record_finished(&record).await {
            warn!("[{}] failed to persist finished record: {:#}", session_id, e);
        }

        info!(
            "[{}] processing finished: {} ({:.1}s, {} bytes)",
            session_id, artifact_location, stats.duration_seconds, size_bytes
        );

        Ok(FinishedArtifact {
            artifact_location,
            transcript,
        })
    }

    /// Bounded settle-wait: the last chunk's write may not yet be visible to
    /// a directory re-read when `stop` arrives. Polls until at least one
    /// chunk appears or the wait budget is spent.
    async fn wait_for_chunks(&self, session_id: &str) -> Result<Vec<u64>> {
        let deadline = Instant::now() + self.settings.settle_wait;

        loop {
            let seqs = self.store.list(session_id).await?;
            if !seqs.is_empty() {
                return Ok(seqs);
            }
            if Instant::now() >= deadline {
                return Err(PipelineError::NoChunks.into());
            }
            tokio::time::sleep(self.settings.settle_poll).await;
        }
    }
}

/// Spawn the finish pipeline as a supervised background task.
///
/// The inner task runs the pipeline and delivers the outcome over the
/// originating connection's outbound channel (best-effort). The supervisor
/// records the terminal state in the registry, including the case where the
/// inner task panicked.
pub fn spawn_finish(
    pipeline: Arc<FinishPipeline>,
    registry: Arc<SessionRegistry>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    session_id: String,
    owner: OwnerId,
    sample_rate: u32,
    channels: u16,
) {
    let task_session_id = session_id.clone();
    let inner = tokio::spawn(async move {
        let session_id = task_session_id;
        match pipeline
            .run(&session_id, &owner, sample_rate, channels)
            .await
        {
            Ok(artifact) => {
                let delivered = outbound.send(ServerMessage::Result {
                    artifact_location: artifact.artifact_location.clone(),
                    transcript: artifact.transcript,
                });
                if delivered.is_err() {
                    info!(
                        "[{}] connection closed before result delivery; artifact at {}",
                        session_id, artifact.artifact_location
                    );
                }
                SessionState::Closed
            }
            Err(e) => {
                error!("[{}] finish pipeline failed: {:#}", session_id, e);
                let _ = outbound.send(ServerMessage::Error {
                    message: format!("processing failed: {:#}", e),
                });
                SessionState::Failed
            }
        }
    });

    tokio::spawn(async move {
        let terminal = match inner.await {
            Ok(state) => state,
            Err(e) => {
                error!("[{}] finish task panicked: {}", session_id, e);
                SessionState::Failed
            }
        };
        registry.complete(&session_id, terminal).await;
    });
}
