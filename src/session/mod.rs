//! Capture session management
//!
//! One `SessionManager` per connection drives the protocol state machine:
//! `start` allocates chunk storage, `chunk_meta` + binary frames persist
//! chunks, and `stop` detaches a supervised finish pipeline
//! (assemble -> encode -> transcribe -> deliver) that never blocks the
//! frame-receive loop.

mod manager;
mod pipeline;
mod protocol;
mod registry;
mod sink;

pub use manager::{AudioDefaults, SessionManager};
pub use pipeline::{spawn_finish, FinishPipeline, FinishedArtifact, PipelineSettings};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{SessionRegistry, SessionState};
pub use sink::{FinishedRecord, JsonlRecordSink, OwnerId, RecordSink};
