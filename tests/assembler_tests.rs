// Integration tests for recording assembly
//
// These tests verify the playback-correctness math: strict sequence-number
// ordering, valid-sample truncation, silence-on-NaN, and hard clipping
// (never wraparound) during quantization.

use anyhow::Result;
use tempfile::TempDir;
use voice_capture::{assemble, ChunkMeta, ChunkStore, PipelineError};

fn meta(seq: u64, sample_count: u64, valid: Option<i64>) -> ChunkMeta {
    ChunkMeta {
        seq,
        sample_count,
        valid_sample_count: valid,
        sample_rate: None,
        channels: None,
        timestamp: None,
    }
}

fn to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn read_wav(path: &std::path::Path) -> Result<(hound::WavSpec, Vec<i16>)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.into_samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((spec, samples))
}

#[test]
fn test_output_timeline_follows_sequence_numbers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out_wav = temp_dir.path().join("out.wav");

    // Chunks pre-ordered by seq, as the store's listing guarantees
    let chunks = vec![
        (to_bytes(&[0.1, 0.1]), meta(0, 2, None)),
        (to_bytes(&[0.2, 0.2]), meta(1, 2, None)),
        (to_bytes(&[0.3, 0.3]), meta(2, 2, None)),
    ];

    let stats = assemble(&chunks, &out_wav, 48000, 1)?;
    assert_eq!(stats.samples_written, 6);

    let (spec, samples) = read_wav(&out_wav)?;
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let expected: Vec<i16> = [0.1f32, 0.1, 0.2, 0.2, 0.3, 0.3]
        .iter()
        .map(|&x| (x * 32767.0).round() as i16)
        .collect();
    assert_eq!(samples, expected);

    Ok(())
}

#[tokio::test]
async fn test_arrival_order_does_not_affect_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path().join("store"))?;

    // Arrive out of order; each chunk carries a distinct constant value
    for &(seq, value) in &[(2u64, 0.3f32), (0, 0.1), (3, 0.4), (1, 0.2)] {
        store
            .put("perm", seq, &to_bytes(&[value, value]), &meta(seq, 2, None))
            .await?;
    }

    let mut chunks = Vec::new();
    for seq in store.list("perm").await? {
        chunks.push(store.read("perm", seq).await?);
    }

    let out_wav = temp_dir.path().join("perm.wav");
    assemble(&chunks, &out_wav, 48000, 1)?;

    let (_, samples) = read_wav(&out_wav)?;
    let expected: Vec<i16> = [0.1f32, 0.1, 0.2, 0.2, 0.3, 0.3, 0.4, 0.4]
        .iter()
        .map(|&x| (x * 32767.0).round() as i16)
        .collect();
    assert_eq!(samples, expected);

    Ok(())
}

#[test]
fn test_truncation_to_valid_sample_count() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out_wav = temp_dir.path().join("trunc.wav");

    // 4800 declared samples, only the first 2400 are valid
    let mut data = vec![0.5f32; 2400];
    data.extend(vec![0.9f32; 2400]); // padding that must be discarded

    let chunks = vec![(to_bytes(&data), meta(0, 4800, Some(2400)))];
    let stats = assemble(&chunks, &out_wav, 48000, 1)?;

    assert_eq!(stats.samples_written, 2400);

    let (_, samples) = read_wav(&out_wav)?;
    assert_eq!(samples.len(), 2400);
    assert!(samples.iter().all(|&s| s == (0.5f32 * 32767.0).round() as i16));

    Ok(())
}

#[test]
fn test_sanitization_of_non_finite_and_out_of_range_samples() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out_wav = temp_dir.path().join("sanitize.wav");

    let chunks = vec![(
        to_bytes(&[f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 1.5]),
        meta(0, 4, None),
    )];
    assemble(&chunks, &out_wav, 48000, 1)?;

    let (_, samples) = read_wav(&out_wav)?;
    // NaN/Inf become silence; out-of-range is hard-clipped, not wrapped
    assert_eq!(samples, vec![0, 0, 0, 32767]);

    Ok(())
}

#[test]
fn test_out_of_range_valid_count_uses_full_chunk() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let data = to_bytes(&[0.1f32, 0.2, 0.3]);

    let negative = vec![(data.clone(), meta(0, 3, Some(-5)))];
    let stats = assemble(&negative, &temp_dir.path().join("neg.wav"), 48000, 1)?;
    assert_eq!(stats.samples_written, 3);

    let too_large = vec![(data, meta(0, 3, Some(1000)))];
    let stats = assemble(&too_large, &temp_dir.path().join("big.wav"), 48000, 1)?;
    assert_eq!(stats.samples_written, 3);

    Ok(())
}

#[test]
fn test_empty_chunk_set_is_an_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out_wav = temp_dir.path().join("empty.wav");

    let err = assemble(&[], &out_wav, 48000, 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NoChunks)
    ));
    assert!(!out_wav.exists(), "no zero-length artifact may be written");

    Ok(())
}

#[test]
fn test_trailing_bytes_not_divisible_by_four_are_dropped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out_wav = temp_dir.path().join("trailing.wav");

    let mut data = to_bytes(&[0.25f32, -0.25]);
    data.extend_from_slice(&[0xDE, 0xAD]); // truncated third sample

    let chunks = vec![(data, meta(0, 2, None))];
    let stats = assemble(&chunks, &out_wav, 48000, 1)?;
    assert_eq!(stats.samples_written, 2);

    Ok(())
}
