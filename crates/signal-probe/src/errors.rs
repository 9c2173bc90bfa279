use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("page unavailable: {0}")]
    PageUnavailable(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<page_port::PageError> for ProbeError {
    fn from(err: page_port::PageError) -> Self {
        ProbeError::PageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
