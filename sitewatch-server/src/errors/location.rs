use axum::http::StatusCode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Invalid location")]
    InvalidLocation(String),
}

impl LocationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LocationError::InvalidLocation(_) => StatusCode::BAD_REQUEST,
        }
    }
}
