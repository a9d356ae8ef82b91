use std::time::Duration;

use thiserror::Error;

/// Failure of the pose source for one cycle.
#[derive(Debug, Error)]
pub enum PoseError {
    /// The inference backend reported a failure for this frame.
    #[error("pose inference failed: {0}")]
    Inference(String),
    #[error("failed to decode pose: {0}")]
    Decode(String),
    /// Only produced when an inference timeout is configured.
    #[error("pose inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("pose source I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The source has no more poses to deliver.
    #[error("pose source exhausted")]
    Exhausted,
}

/// Failure delivering the completion signal to the actuator side.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("failed to encode completion signal: {0}")]
    Encode(String),
    #[error("failed to deliver completion signal: {0}")]
    Io(#[from] std::io::Error),
}
