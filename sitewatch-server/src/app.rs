use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handles::*;
use crate::services::ControlService;

pub fn create_app(control_service: Arc<ControlService>) -> Router {
    let data = data_router(DataState {
        control_service: control_service.clone(),
    });

    let control = control_router(ControlState {
        control_service: control_service.clone(),
    });

    Router::new()
        .merge(data)
        .merge(control)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
