use super::{BusError, CommandError, LocationError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Location error: {0}")]
    LocationError(#[from] LocationError),

    #[error("Command error: {0}")]
    CommandError(#[from] CommandError),

    #[error("Bus error: {0}")]
    BusError(#[from] BusError),
}

impl ApiError {
    /// The message shown to API callers.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::LocationError(e) => e.to_string(),
            ApiError::CommandError(e) => e.to_string(),
            ApiError::BusError(e) => e.to_string(),
        }
    }
}
