//! Adapter boundary to the external audio encoder.
//!
//! Encoding failures are fatal to the session's finish pipeline and never
//! retried: a corrupt or truncated source should not be silently re-tried.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use crate::config::EncoderConfig;
use crate::error::PipelineError;

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Transcode the assembled container file into the distribution format
    async fn encode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Encodes WAV to MP3 by shelling out to ffmpeg
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    bitrate: String,
}

impl FfmpegEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            bitrate: config.bitrate.clone(),
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-acodec", "libmp3lame"])
            .args(["-ab", &self.bitrate])
            .args(["-ac", "1"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run encoder: {}", self.ffmpeg_path))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::EncoderFailed(stderr.trim().to_string()).into());
        }

        info!("Encoded {:?} -> {:?}", input, output);

        Ok(())
    }
}
