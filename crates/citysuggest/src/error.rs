use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error(transparent)]
    Validation(#[from] crate::coordinate::ValidationError),
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
    #[error("Decode error: {0}")]
    Decode(#[from] crate::decode::DecodeError),
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Query exceeded its deadline of {0:?}")]
    Timeout(Duration),
    #[error("Query was cancelled")]
    Cancelled,
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SuggestError>;

/// The fixed error body reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub status_text: String,
    pub message: String,
}

const BAD_REQUEST: u16 = 400;
const INTERNAL_SERVER_ERROR: u16 = 500;

impl SuggestError {
    /// Whether the caller can fix the request and try again.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub const fn status(&self) -> u16 {
        if self.is_client_error() {
            BAD_REQUEST
        } else {
            INTERNAL_SERVER_ERROR
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let status = self.status();
        let status_text = match status {
            BAD_REQUEST => "Bad Request",
            _ => "Internal Server Error",
        };
        ErrorEnvelope {
            status,
            status_text: status_text.to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::{CoordinateField, ValidationError};
    use crate::decode::DecodeError;
    use crate::index::IndexError;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let error = SuggestError::from(ValidationError::MissingCoordinate(
            CoordinateField::Longitude,
        ));
        assert!(error.is_client_error());
        assert_eq!(
            error.envelope(),
            ErrorEnvelope {
                status: 400,
                status_text: "Bad Request".to_string(),
                message: "'lng' is required but missing".to_string(),
            }
        );
    }

    #[test]
    fn test_upstream_and_decode_errors_are_internal() {
        let errors = [
            SuggestError::from(IndexError::Unavailable("connection refused".into())),
            SuggestError::from(DecodeError::EmptyResponse),
            SuggestError::Timeout(Duration::from_secs(1)),
            SuggestError::Cancelled,
        ];
        for error in errors {
            let envelope = error.envelope();
            assert_eq!(envelope.status, 500, "{error}");
            assert_eq!(envelope.status_text, "Internal Server Error");
            assert_eq!(envelope.message, error.to_string());
        }
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = SuggestError::from(ValidationError::MissingQuery).envelope();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 400,
                "status_text": "Bad Request",
                "message": "'q' is a required query parameter"
            })
        );
    }
}
