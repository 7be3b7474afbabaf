//! Adapter boundary to the remote speech-to-text service.
//!
//! The finish pipeline treats any error from a `Transcriber` as a degraded
//! transcript, never as a pipeline failure: a recording must not be lost
//! because a transcription call failed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::config::TranscriptionConfig;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Obtain transcript text for the given audio file
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// Whisper-style HTTP transcription (multipart upload, bearer auth)
pub struct WhisperHttpTranscriber {
    api_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperHttpTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                "{} not set; transcription will degrade to empty transcripts",
                config.api_key_env
            );
        }

        Self {
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperHttpTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("transcription API key not configured"))?;

        let bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file: {:?}", audio_path))?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .context("Failed to build multipart body")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "transcription API returned {}",
                response.status()
            ));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        let text = parsed.text.trim().to_string();
        info!("Transcription complete ({} chars)", text.len());

        Ok(text)
    }
}
