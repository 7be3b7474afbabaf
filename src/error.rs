use thiserror::Error;

/// Typed failures of the finish pipeline.
///
/// Everything else in the crate propagates `anyhow::Error` with context; these
/// variants exist because callers branch on them: an empty chunk set must never
/// be reported as a successful zero-length artifact, and an encoder failure is
/// deliberately not retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The session has no persisted chunks after the settle-wait elapsed.
    #[error("no chunks found to assemble")]
    NoChunks,

    /// The external encoder exited with a non-zero status.
    #[error("encoder exited with failure: {0}")]
    EncoderFailed(String),
}
