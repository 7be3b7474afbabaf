use std::sync::Arc;

use crate::session::{AudioDefaults, FinishPipeline, SessionRegistry};
use crate::store::ChunkStore;

/// Shared application state for HTTP handlers.
///
/// All collaborators are constructed once at process start and passed by
/// reference; nothing here is a process-wide singleton.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<ChunkStore>,
    pub pipeline: Arc<FinishPipeline>,
    pub audio_defaults: AudioDefaults,
}

impl AppState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<ChunkStore>,
        pipeline: Arc<FinishPipeline>,
        audio_defaults: AudioDefaults,
    ) -> Self {
        Self {
            registry,
            store,
            pipeline,
            audio_defaults,
        }
    }
}
