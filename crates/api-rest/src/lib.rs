//! # API REST
//!
//! REST API implementation for WardFlow.
//!
//! Handles:
//! - HTTP endpoints with axum over a shared [`wardflow_core::Hospital`]
//! - Orchestrator status and start/stop
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! Patient transitions requested over HTTP go through the same [`wardflow_core::Action`]
//! path as the orchestrator's decisions, so they are validated and notified identically.

#![warn(rust_2018_idioms)]

mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use wardflow_core::{Clock, NotificationSink, RecordingSink, SharedHospital};
use wardflow_scheduler::Orchestrator;

pub use error::{ApiError, ApiResult};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub hospital: SharedHospital,
    pub orchestrator: Arc<Orchestrator>,
    /// Where notifications raised by REST-initiated changes are sent.
    pub sink: Arc<dyn NotificationSink>,
    /// Recent notifications served by `GET /notifications`.
    pub notifications: Arc<RecordingSink>,
    pub clock: Arc<dyn Clock>,
}

/// Builds the full router with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::register_patient),
        )
        .route(
            "/patients/:id",
            get(handlers::get_patient).patch(handlers::update_patient),
        )
        .route("/patients/:id/emergency", post(handlers::admit_to_emergency))
        .route("/patients/:id/icu", post(handlers::transfer_to_icu))
        .route("/patients/:id/ward", post(handlers::transfer_to_ward))
        .route("/patients/:id/discharge", post(handlers::discharge))
        .route(
            "/patients/:id/ledger",
            get(handlers::get_ledger).post(handlers::append_ledger),
        )
        .route("/census", get(handlers::census))
        .route(
            "/instruments",
            get(handlers::list_instruments).post(handlers::request_instruments),
        )
        .route("/instruments/:id/advance", post(handlers::advance_instruments))
        .route("/instruments/:id/progress", get(handlers::instrument_progress))
        .route(
            "/service-requests",
            get(handlers::list_service_requests).post(handlers::create_service_request),
        )
        .route(
            "/service-requests/:id/advance",
            post(handlers::advance_service_request),
        )
        .route("/orchestrator", get(handlers::orchestrator_status))
        .route("/orchestrator/toggle", post(handlers::toggle_orchestrator))
        .route("/notifications", get(handlers::notifications))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
