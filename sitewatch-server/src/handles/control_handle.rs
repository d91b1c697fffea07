use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, CommandError};
use crate::services::ControlService;

#[derive(Clone)]
pub struct ControlState {
    pub control_service: Arc<ControlService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlBody {
    #[serde(default)]
    pub device: Option<String>,
    /// Strings are sent as-is; numbers are sent in their JSON form.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn control_router(state: ControlState) -> Router {
    Router::new()
        .route("/control", post(execute_command))
        .with_state(state)
}

/// Always answers 200; failures are reported through `success` and `error`.
pub async fn execute_command(
    State(state): State<ControlState>,
    Json(body): Json<ControlBody>,
) -> Json<ControlResponse> {
    let result = match command_parameters(&body) {
        Ok((device, value)) => {
            state
                .control_service
                .issue_command(body.location.as_deref(), device, &value)
                .await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => Json(ControlResponse {
            success: true,
            error: None,
        }),
        Err(e) => {
            if let ApiError::BusError(_) = &e {
                tracing::error!("control error: {}", e);
            } else {
                tracing::info!("control request rejected: {}", e);
            }

            Json(ControlResponse {
                success: false,
                error: Some(e.public_message()),
            })
        }
    }
}

fn command_parameters(body: &ControlBody) -> Result<(&str, String), CommandError> {
    let device = body
        .device
        .as_deref()
        .filter(|device| !device.is_empty())
        .ok_or(CommandError::MissingParameters)?;

    let value = match &body.value {
        None | Some(Value::Null) => return Err(CommandError::MissingParameters),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    if value.is_empty() {
        return Err(CommandError::MissingParameters);
    }

    Ok((device, value))
}
