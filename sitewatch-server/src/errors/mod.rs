pub mod api;
pub mod bus;
pub mod command;
pub mod location;
pub mod validation;

pub use api::ApiError;
pub use bus::BusError;
pub use command::CommandError;
pub use location::LocationError;
pub use validation::ValidationError;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde_json::json;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::LocationError(e) => e.status_code(),
            ApiError::CommandError(e) => e.status_code(),
            ApiError::BusError(e) => {
                tracing::warn!("Bus error while serving request: {}", e);
                e.status_code()
            }
        };

        let body = Json(json!({ "error": self.public_message() }));

        (status, body).into_response()
    }
}
