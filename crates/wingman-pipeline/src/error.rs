use thiserror::Error;
use wingman_voice::VoiceError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Interview not found: {0}")]
    InterviewNotFound(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}
