use citysuggest::{IndexError, ValidationError};
use thiserror::Error;
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("City {name:?} has invalid coordinates: {source}")]
    InvalidCoordinates {
        name: String,
        #[source]
        source: ValidationError,
    },
    #[error("Index error while ingesting {name:?}: {source}")]
    Index {
        name: String,
        #[source]
        source: IndexError,
    },
    #[error("Geo index assigned no score to {0:?}")]
    MissingScore(String),
    #[error("Text index commit failed: {0}")]
    Commit(#[source] IndexError),
}
