use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UerError {
    #[error("Shape mismatch error: {0}")]
    ShapeMismatch(String),

    #[error("Empty input error: {0}")]
    EmptyInput(String),

    #[error("Missing key error: {0}")]
    MissingKey(String),

    #[error("Vocabulary loading error: {0}")]
    VocabLoadError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfiguration(String),

    #[error("Value error: {0}")]
    ValueError(String),
}

impl From<std::io::Error> for UerError {
    fn from(error: std::io::Error) -> Self {
        UerError::IOError(error.to_string())
    }
}

impl From<TchError> for UerError {
    fn from(error: TchError) -> Self {
        UerError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for UerError {
    fn from(error: serde_json::Error) -> Self {
        UerError::SerializationError(error.to_string())
    }
}
