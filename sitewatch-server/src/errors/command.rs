use axum::http::StatusCode;

use super::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing device or value")]
    MissingParameters,

    #[error("Unknown device: {0}")]
    InvalidCommand(String),

    #[error("{0}")]
    InvalidValue(#[from] ValidationError),
}

impl CommandError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CommandError::MissingParameters => StatusCode::BAD_REQUEST,
            CommandError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            CommandError::InvalidValue(_) => StatusCode::BAD_REQUEST,
        }
    }
}
