/// Errors surfaced to callers appending to a stream.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The stream stopped accepting events (shutdown in progress).
    #[error("Pipeline is shut down")]
    Closed,
}
