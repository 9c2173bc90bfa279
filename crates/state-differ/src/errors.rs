use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("tree invariant violated: {0}")]
    Invariant(String),
    #[error("delta refers to unknown node {0}")]
    UnknownRef(String),
}

impl DiffError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DiffError>;
