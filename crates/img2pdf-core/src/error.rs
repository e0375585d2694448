use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("No images to convert!")]
    EmptyInput,

    #[error("Failed to decode image #{index} ({name}): {reason}")]
    Decode {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("PDF serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid margin preset: {0}")]
    InvalidMargin(String),

    #[error("Image index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0}")]
    Other(String),
}

impl ConvertError {
    /// True for the one recoverable failure: the caller can add images and retry.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, ConvertError::EmptyInput)
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
