pub mod audio;
pub mod config;
pub mod encode;
pub mod error;
pub mod http;
pub mod session;
pub mod store;
pub mod transcribe;

pub use audio::{assemble, AssemblyStats};
pub use config::Config;
pub use encode::{Encoder, FfmpegEncoder};
pub use error::PipelineError;
pub use http::{create_router, AppState};
pub use session::{
    AudioDefaults, ClientMessage, FinishPipeline, FinishedArtifact, FinishedRecord,
    JsonlRecordSink, OwnerId, PipelineSettings, RecordSink, ServerMessage, SessionManager,
    SessionRegistry, SessionState,
};
pub use store::{ChunkMeta, ChunkStore};
pub use transcribe::{Transcriber, WhisperHttpTranscriber};
