use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtError {
    #[error("operation position/range {0} is out of bounds for content of length {1}")]
    OutOfBounds(usize, usize),

    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

pub type Result<T> = std::result::Result<T, OtError>;
