use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

impl BusError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BusError::Client(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
