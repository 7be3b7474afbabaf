// Integration tests for the chunk store
//
// These tests verify the durability contract: listing is ordered by
// sequence number regardless of write order, repeated writes overwrite
// silently, and unknown sessions yield an empty listing.

use anyhow::Result;
use std::time::Duration;
use tempfile::TempDir;
use voice_capture::{ChunkMeta, ChunkStore};

fn meta(seq: u64, sample_count: u64) -> ChunkMeta {
    ChunkMeta {
        seq,
        sample_count,
        valid_sample_count: None,
        sample_rate: Some(48000),
        channels: Some(1),
        timestamp: None,
    }
}

#[tokio::test]
async fn test_list_is_ordered_regardless_of_write_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    // Write chunks in a scrambled arrival order
    for seq in [5u64, 0, 3, 1, 4, 2] {
        store.put("sess-order", seq, &[0u8; 8], &meta(seq, 2)).await?;
    }

    let seqs = store.list("sess-order").await?;
    assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);

    Ok(())
}

#[tokio::test]
async fn test_put_is_idempotent_last_write_wins() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    store.put("sess-dup", 5, &[1u8, 1, 1, 1], &meta(5, 1)).await?;
    store.put("sess-dup", 5, &[2u8, 2, 2, 2], &meta(5, 1)).await?;

    // No duplicate entry in the listing
    let seqs = store.list("sess-dup").await?;
    assert_eq!(seqs, vec![5]);

    // The second write is the one read back
    let (bytes, read_meta) = store.read("sess-dup", 5).await?;
    assert_eq!(bytes, vec![2u8, 2, 2, 2]);
    assert_eq!(read_meta.seq, 5);

    Ok(())
}

#[tokio::test]
async fn test_list_unknown_session_is_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    let seqs = store.list("never-started").await?;
    assert!(seqs.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_metadata_round_trips() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    let mut m = meta(9, 4800);
    m.valid_sample_count = Some(2400);
    m.timestamp = Some(1234.5);

    store.put("sess-meta", 9, &[0u8; 16], &m).await?;

    let (_, read_meta) = store.read("sess-meta", 9).await?;
    assert_eq!(read_meta.sample_count, 4800);
    assert_eq!(read_meta.valid_sample_count, Some(2400));
    assert_eq!(read_meta.timestamp, Some(1234.5));

    Ok(())
}

#[tokio::test]
async fn test_sweep_reclaims_orphans_but_keeps_finished_sessions() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    // Orphan: chunks but no final artifact
    store.put("orphan", 0, &[0u8; 4], &meta(0, 1)).await?;

    // Finished: has a file in its final dir
    store.put("finished", 0, &[0u8; 4], &meta(0, 1)).await?;
    let final_dir = store.final_dir("finished")?;
    std::fs::write(final_dir.join("artifact.mp3"), b"mp3")?;

    // TTL of zero makes everything "old enough"
    tokio::time::sleep(Duration::from_millis(20)).await;
    let removed = store.sweep_orphans(Duration::ZERO)?;

    assert_eq!(removed, 1);
    assert!(store.list("orphan").await?.is_empty());
    assert_eq!(store.list("finished").await?, vec![0]);

    Ok(())
}

#[test]
fn test_records_log_lives_outside_sessions_tree() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ChunkStore::new(temp_dir.path())?;

    // The bookkeeping log must never be reachable through the tree that
    // gets served as static files
    assert!(!store.records_path().starts_with(store.sessions_root()));
    assert!(store.sessions_root().starts_with(temp_dir.path()));

    Ok(())
}

#[test]
fn test_artifact_base_name_is_collision_resistant() {
    let a = ChunkStore::artifact_base_name("sess");
    let b = ChunkStore::artifact_base_name("sess");
    assert!(a.starts_with("sess__"));
    assert_ne!(a, b);
}
