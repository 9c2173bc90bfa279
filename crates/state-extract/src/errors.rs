use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page unavailable: {0}")]
    PageUnavailable(String),
    #[error("snapshot malformed: {0}")]
    Malformed(String),
}

impl From<page_port::PageError> for ExtractError {
    fn from(err: page_port::PageError) -> Self {
        ExtractError::PageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
