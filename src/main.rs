use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use voice_capture::session::{
    AudioDefaults, FinishPipeline, JsonlRecordSink, PipelineSettings, SessionRegistry,
};
use voice_capture::{create_router, AppState, ChunkStore, Config, FfmpegEncoder, WhisperHttpTranscriber};

#[derive(Debug, Parser)]
#[command(name = "voice-capture", about = "Streaming voice-capture pipeline")]
struct Cli {
    /// Config file path (extension optional, `config` crate style)
    #[arg(long, default_value = "config/voice-capture")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Storage root: {}", cfg.storage.base_dir);

    // Collaborators, constructed once and passed by reference
    let store = Arc::new(ChunkStore::new(&cfg.storage.base_dir)?);
    let encoder = Arc::new(FfmpegEncoder::new(&cfg.encoder));
    let transcriber = Arc::new(WhisperHttpTranscriber::new(&cfg.transcription));
    let sink = Arc::new(JsonlRecordSink::new(store.records_path()));
    let registry = Arc::new(SessionRegistry::new());

    let pipeline = Arc::new(FinishPipeline::new(
        Arc::clone(&store),
        encoder,
        transcriber,
        sink,
        PipelineSettings {
            settle_wait: Duration::from_millis(cfg.pipeline.settle_wait_ms),
            settle_poll: Duration::from_millis(cfg.pipeline.settle_poll_ms),
            public_base: cfg.storage.public_base.clone(),
        },
    ));

    // Periodic reclamation of sessions abandoned without a stop
    {
        let store = Arc::clone(&store);
        let ttl = Duration::from_secs(cfg.storage.orphan_ttl_hours * 3600);
        let interval = Duration::from_secs(cfg.storage.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                // The sweep walks the filesystem; keep it off the runtime
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || store.sweep_orphans(ttl)).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(n)) => info!("Orphan sweep reclaimed {} session(s)", n),
                    Ok(Err(e)) => warn!("Orphan sweep failed: {:#}", e),
                    Err(e) => warn!("Orphan sweep task failed: {}", e),
                }
            }
        });
    }

    let state = AppState::new(
        registry,
        Arc::clone(&store),
        pipeline,
        AudioDefaults {
            sample_rate: cfg.audio.sample_rate,
            channels: cfg.audio.channels,
        },
    );

    // Only the per-session tree is served; records.jsonl lives outside it
    let app = create_router(state, store.sessions_root());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
