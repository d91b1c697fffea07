use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::errors::ApiError;
use crate::models::{Field, FieldValue, Location, LocationView, Timestamp};
use crate::services::ControlService;

#[derive(Clone)]
pub struct DataState {
    pub control_service: Arc<ControlService>,
}

/// One location as the dashboard reads it: current fields plus history as
/// parallel arrays, oldest first.
#[derive(Debug, Serialize)]
pub struct LocationData {
    pub sensor_data: BTreeMap<Field, FieldValue>,
    pub temp_history: Vec<f64>,
    pub humidity_history: Vec<f64>,
    pub timestamps: Vec<Timestamp>,
    pub device_connected: bool,
    pub last_seen: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_connected: Option<bool>,
}

impl From<LocationView> for LocationData {
    fn from(view: LocationView) -> Self {
        Self {
            temp_history: view.history.iter().map(|p| p.temperature).collect(),
            humidity_history: view.history.iter().map(|p| p.humidity).collect(),
            timestamps: view.history.iter().map(|p| p.timestamp).collect(),
            sensor_data: view.fields,
            device_connected: view.connected,
            last_seen: view.last_seen,
            mqtt_connected: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AllLocationData {
    #[serde(flatten)]
    pub locations: BTreeMap<Location, LocationData>,
    pub mqtt_connected: bool,
}

pub fn data_router(state: DataState) -> Router {
    Router::new()
        .route("/data", get(get_data))
        .route("/data/:location", get(get_location_data))
        .route("/status", get(get_status))
        .route("/health", get(get_health))
        // Paths kept for dashboards built against the first API.
        .route("/get_data", get(get_data))
        .route("/get_location_data/:location", get(get_location_data))
        .route("/api/sensors", get(get_primary_data))
        .route("/api/status", get(get_status))
        .with_state(state)
}

pub async fn get_data(State(state): State<DataState>) -> Json<AllLocationData> {
    let snapshot = state.control_service.snapshot();

    Json(AllLocationData {
        locations: snapshot
            .locations
            .into_iter()
            .map(|(location, view)| (location, view.into()))
            .collect(),
        mqtt_connected: snapshot.bus_connected,
    })
}

pub async fn get_location_data(
    State(state): State<DataState>,
    Path(location): Path<String>,
) -> Result<Json<LocationData>, ApiError> {
    let (view, bus_connected) = state
        .control_service
        .location_snapshot(&location)
        .inspect_err(|_| tracing::debug!("rejected location {:?}", location))?;

    let mut data = LocationData::from(view);
    data.mqtt_connected = Some(bus_connected);

    Ok(Json(data))
}

pub async fn get_primary_data(
    State(state): State<DataState>,
) -> Result<Json<LocationData>, ApiError> {
    let primary = state.control_service.primary();

    get_location_data(State(state), Path(primary.to_string())).await
}

/// Connectivity flags plus current fields for every location, flattened into
/// one object.
pub async fn get_status(State(state): State<DataState>) -> Json<Value> {
    let snapshot = state.control_service.snapshot();
    let mut status = Map::new();

    for (location, view) in &snapshot.locations {
        status.insert(format!("{location}_connected"), json!(view.connected));
    }
    status.insert("mqtt_connected".to_string(), json!(snapshot.bus_connected));

    for (location, view) in snapshot.locations {
        status.insert(location.to_string(), json!(view.fields));
    }

    Json(Value::Object(status))
}

pub async fn get_health(State(state): State<DataState>) -> Json<Value> {
    let snapshot = state.control_service.snapshot();

    Json(json!({
        "status": "ok",
        "mqtt_connected": snapshot.bus_connected,
    }))
}
