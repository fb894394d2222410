//! Error types for the ShotGrid provider

use thiserror::Error;

/// ShotGrid provider errors
#[derive(Error, Debug)]
pub enum ShotgridError {
    /// API request returned an error
    #[error("ShotGrid API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for ShotGrid operations
pub type Result<T> = std::result::Result<T, ShotgridError>;

impl From<ShotgridError> for bridge_traits::error::BridgeError {
    fn from(error: ShotgridError) -> Self {
        match error {
            ShotgridError::ApiError {
                status_code,
                message,
            } => bridge_traits::error::BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            ShotgridError::ParseError(msg) => {
                bridge_traits::error::BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            ShotgridError::BridgeError(e) => e,
        }
    }
}
