//! Builds one playable WAV from a session's ordered chunks.
//!
//! The sanitization and quantization here define playback correctness:
//! non-finite samples become silence, out-of-range samples are hard-clipped
//! (never wrapped), and padding beyond each chunk's valid sample count is
//! discarded.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::store::ChunkMeta;

/// Summary of an assembled recording
#[derive(Debug, Clone)]
pub struct AssemblyStats {
    pub samples_written: usize,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Assemble chunks (already ordered by ascending sequence number) into a
/// 16-bit PCM WAV file at `out_wav`.
pub fn assemble(
    chunks: &[(Vec<u8>, ChunkMeta)],
    out_wav: &Path,
    sample_rate: u32,
    channels: u16,
) -> Result<AssemblyStats> {
    if chunks.is_empty() {
        return Err(PipelineError::NoChunks.into());
    }

    let mut samples: Vec<i16> = Vec::new();
    for (bytes, meta) in chunks {
        for sample in sanitize_chunk(bytes, meta) {
            samples.push(quantize(sample));
        }
    }

    if let Some(parent) = out_wav.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output dir: {:?}", parent))?;
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(out_wav, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", out_wav))?;

    for &sample in &samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample to WAV")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    let duration_seconds = samples.len() as f64 / (sample_rate as f64 * channels as f64);

    info!(
        "Assembled WAV: {:?} ({} samples, {:.1}s, {}Hz, {} channels)",
        out_wav,
        samples.len(),
        duration_seconds,
        sample_rate,
        channels
    );

    Ok(AssemblyStats {
        samples_written: samples.len(),
        duration_seconds,
        sample_rate,
        channels,
    })
}

/// Interpret chunk bytes as little-endian f32 samples, truncate to the valid
/// sample count, and sanitize into the canonical [-1.0, 1.0] domain.
fn sanitize_chunk(bytes: &[u8], meta: &ChunkMeta) -> Vec<f32> {
    if bytes.len() % 4 != 0 {
        warn!(
            "Chunk {} byte length {} not divisible by 4; trailing bytes dropped",
            meta.seq,
            bytes.len()
        );
    }

    let floats: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    // An out-of-range declared valid count means "use the full chunk" rather
    // than an error, matching permissive client behavior.
    let valid = match meta.valid_sample_count {
        Some(v) if v >= 0 && (v as u64) <= meta.sample_count => v as usize,
        Some(v) => {
            warn!(
                "Chunk {} declares valid_sample_count={} outside [0, {}]; using full chunk",
                meta.seq, v, meta.sample_count
            );
            floats.len()
        }
        None => floats.len(),
    };

    let take = valid.min(floats.len());

    floats[..take]
        .iter()
        .map(|&x| if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 })
        .collect()
}

/// Linear quantization to 16-bit signed PCM, clamped (never wrapped)
fn quantize(x: f32) -> i16 {
    (x * 32767.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
