use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no recording in progress")]
    NotRecording,
    #[error("recording already in progress for task {0:?}")]
    AlreadyRecording(String),
    #[error("workflow {0} not found")]
    NotFound(String),
    #[error("action failed: {0}")]
    ActionFailed(String),
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
