//! HTTP handlers.
//!
//! Handlers lock the shared hospital only for the synchronous part of the request and send
//! any resulting notifications after the lock is released.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardflow_core::hospital::lock;
use wardflow_core::{
    registration_notifications, service_request_notification, Action, CareError, Department,
    DepartmentCensus, DischargeStatus, FinancialRecord, InstrumentSet, NewPatient, Notification,
    Patient, PatientUpdate, RecordId, RecordKind, Registration, ServiceRequest,
    SterilizationStage, TriageLevel,
};
use wardflow_scheduler::RunState;

#[derive(Serialize)]
pub struct HealthRes {
    ok: bool,
    message: String,
}

/// Health check endpoint for the REST API.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "WardFlow REST API is alive".into(),
    })
}

// ============================================================================
// PATIENTS
// ============================================================================

/// Lists every patient, archived ones included.
#[axum::debug_handler]
pub async fn list_patients(State(state): State<AppState>) -> Json<Vec<Patient>> {
    Json(lock(&state.hospital).registry().list().to_vec())
}

/// Registers a new patient.
///
/// # Errors
///
/// Returns `400 Bad Request` for invalid input. A failed referral does not fail the request;
/// it is reported in the `referral` field of the response.
#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<NewPatient>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let now = state.clock.now();
    let registration = lock(&state.hospital).register(req, now)?;
    notify(&state, registration_notifications(&registration, now));
    Ok((StatusCode::CREATED, Json(registration)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Patient> {
    let hospital = lock(&state.hospital);
    Ok(Json(hospital.registry().require(id)?.clone()))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(update): Json<PatientUpdate>,
) -> ApiResult<Patient> {
    let now = state.clock.now();
    let patient = lock(&state.hospital).update_patient(id, update, now)?;
    Ok(Json(patient))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmergencyReq {
    #[serde(default)]
    triage_level: Option<TriageLevel>,
}

#[axum::debug_handler]
pub async fn admit_to_emergency(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(req): Json<EmergencyReq>,
) -> ApiResult<Patient> {
    apply_patient_action(
        &state,
        Action::AdmitToEmergency {
            patient_id: id,
            triage_level: req.triage_level,
            details: None,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct IcuReq {
    bed: u8,
}

/// Admits a patient to an ICU bed.
///
/// # Errors
///
/// - `400 Bad Request` if the bed is out of range.
/// - `404 Not Found` if the patient is unknown or already discharged.
/// - `409 Conflict` if another patient holds the bed.
#[axum::debug_handler]
pub async fn transfer_to_icu(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(req): Json<IcuReq>,
) -> ApiResult<Patient> {
    apply_patient_action(
        &state,
        Action::TransferToIcu {
            patient_id: id,
            bed: req.bed,
            details: None,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct WardReq {
    floor: u8,
    room: u8,
}

#[axum::debug_handler]
pub async fn transfer_to_ward(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(req): Json<WardReq>,
) -> ApiResult<Patient> {
    apply_patient_action(
        &state,
        Action::TransferToWard {
            patient_id: id,
            floor: req.floor,
            room: req.room,
            details: None,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct DischargeReq {
    status: DischargeStatus,
}

#[axum::debug_handler]
pub async fn discharge(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(req): Json<DischargeReq>,
) -> ApiResult<Patient> {
    apply_patient_action(
        &state,
        Action::Discharge {
            patient_id: id,
            status: req.status,
            details: None,
        },
    )
}

#[derive(Serialize)]
pub struct LedgerRes {
    balance: i64,
    records: Vec<FinancialRecord>,
}

#[axum::debug_handler]
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<LedgerRes> {
    let hospital = lock(&state.hospital);
    let patient = hospital.registry().require(id)?;
    Ok(Json(LedgerRes {
        balance: patient.balance(),
        records: patient.financial_records.records().to_vec(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LedgerReq {
    kind: RecordKind,
    description: String,
    amount: i64,
}

#[axum::debug_handler]
pub async fn append_ledger(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(req): Json<LedgerReq>,
) -> Result<(StatusCode, Json<FinancialRecord>), ApiError> {
    let now = state.clock.now();
    let record = lock(&state.hospital).append_record(
        id,
        req.kind,
        &req.description,
        req.amount,
        now,
    )?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[axum::debug_handler]
pub async fn census(State(state): State<AppState>) -> Json<Vec<DepartmentCensus>> {
    Json(lock(&state.hospital).registry().census())
}

// ============================================================================
// INSTRUMENTS
// ============================================================================

/// An instrument set together with its clock-derived progress.
#[derive(Serialize)]
pub struct InstrumentView {
    #[serde(flatten)]
    set: InstrumentSet,
    progress: Option<f64>,
    remaining_secs: Option<i64>,
}

impl InstrumentView {
    fn at(set: InstrumentSet, now: DateTime<Utc>) -> Self {
        Self {
            progress: set.progress(now),
            remaining_secs: set.remaining_secs(now),
            set,
        }
    }
}

#[axum::debug_handler]
pub async fn list_instruments(State(state): State<AppState>) -> Json<Vec<InstrumentView>> {
    let now = state.clock.now();
    let sets = lock(&state.hospital).sterilization().list().to_vec();
    Json(
        sets.into_iter()
            .map(|set| InstrumentView::at(set, now))
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub struct InstrumentReq {
    name: String,
    department: Department,
    #[serde(default)]
    cycle_duration_secs: Option<u32>,
}

#[axum::debug_handler]
pub async fn request_instruments(
    State(state): State<AppState>,
    Json(req): Json<InstrumentReq>,
) -> Result<(StatusCode, Json<InstrumentView>), ApiError> {
    let now = state.clock.now();
    let set = lock(&state.hospital).request_instruments(
        &req.name,
        req.department,
        req.cycle_duration_secs,
        now,
    )?;
    Ok((StatusCode::CREATED, Json(InstrumentView::at(set, now))))
}

#[derive(Serialize)]
pub struct AdvanceRes {
    from: SterilizationStage,
    to: SterilizationStage,
    set: InstrumentView,
}

#[axum::debug_handler]
pub async fn advance_instruments(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<AdvanceRes> {
    let now = state.clock.now();
    let advance = lock(&state.hospital).advance_instruments(id, now)?;
    if advance.moved() {
        notify(
            &state,
            vec![Notification::info(
                "Instrument stage changed",
                format!("{} moved {} -> {}", advance.set.name, advance.from, advance.to),
                now,
            )],
        );
    }
    Ok(Json(AdvanceRes {
        from: advance.from,
        to: advance.to,
        set: InstrumentView::at(advance.set, now),
    }))
}

#[axum::debug_handler]
pub async fn instrument_progress(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<InstrumentView> {
    let now = state.clock.now();
    let set = lock(&state.hospital)
        .sterilization()
        .get(id)
        .cloned()
        .ok_or_else(|| CareError::not_found("instrument set", id))?;
    Ok(Json(InstrumentView::at(set, now)))
}

// ============================================================================
// SERVICE REQUESTS
// ============================================================================

#[axum::debug_handler]
pub async fn list_service_requests(State(state): State<AppState>) -> Json<Vec<ServiceRequest>> {
    Json(lock(&state.hospital).services().list().to_vec())
}

#[derive(Debug, Deserialize)]
pub struct ServiceRequestReq {
    patient_id: RecordId,
    description: String,
}

#[axum::debug_handler]
pub async fn create_service_request(
    State(state): State<AppState>,
    Json(req): Json<ServiceRequestReq>,
) -> Result<(StatusCode, Json<ServiceRequest>), ApiError> {
    let now = state.clock.now();
    let request =
        lock(&state.hospital).create_service_request(req.patient_id, &req.description, now)?;
    notify(&state, vec![service_request_notification(&request, now)]);
    Ok((StatusCode::CREATED, Json(request)))
}

#[axum::debug_handler]
pub async fn advance_service_request(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<ServiceRequest> {
    let now = state.clock.now();
    let request = lock(&state.hospital).advance_service_request(id, now)?;
    notify(&state, vec![service_request_notification(&request, now)]);
    Ok(Json(request))
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[derive(Serialize)]
pub struct OrchestratorRes {
    state: RunState,
    deciding: bool,
    oracle: &'static str,
    decision_interval_secs: u64,
    sweep_interval_secs: u64,
}

fn orchestrator_res(state: &AppState) -> OrchestratorRes {
    let orchestrator = &state.orchestrator;
    OrchestratorRes {
        state: orchestrator.state(),
        deciding: orchestrator.is_deciding(),
        oracle: orchestrator.oracle_name(),
        decision_interval_secs: orchestrator.config().decision_interval().as_secs(),
        sweep_interval_secs: orchestrator.config().sweep_interval().as_secs(),
    }
}

#[axum::debug_handler]
pub async fn orchestrator_status(State(state): State<AppState>) -> Json<OrchestratorRes> {
    Json(orchestrator_res(&state))
}

#[axum::debug_handler]
pub async fn toggle_orchestrator(State(state): State<AppState>) -> Json<OrchestratorRes> {
    state.orchestrator.toggle();
    Json(orchestrator_res(&state))
}

#[axum::debug_handler]
pub async fn notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifications.recent())
}

// ============================================================================
// HELPERS
// ============================================================================

/// Applies a patient-targeted action and returns the patient as it now stands.
fn apply_patient_action(state: &AppState, action: Action) -> ApiResult<Patient> {
    let now = state.clock.now();
    let patient_id = action
        .patient_id()
        .ok_or_else(|| CareError::Validation(format!("'{action}' does not target a patient")))?;

    let (patient, emitted) = {
        let mut hospital = lock(&state.hospital);
        let emitted = hospital.apply(&action, now)?;
        (hospital.registry().require(patient_id)?.clone(), emitted)
    };

    notify(state, emitted);
    Ok(Json(patient))
}

fn notify(state: &AppState, notifications: Vec<Notification>) {
    for notification in notifications {
        state.sink.notify(notification);
    }
}

#[cfg(test)]
mod tests {
    use crate::{router, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;
    use wardflow_core::{
        Clock, CoreConfig, FanoutSink, FixedClock, Hospital, MemoryStore, RecordingSink,
    };
    use wardflow_scheduler::{Orchestrator, RuleBasedOracle, SchedulerConfig};

    fn app() -> (Router, Arc<FixedClock>) {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cfg = CoreConfig::with_defaults(PathBuf::from("unused"));
        let hospital = Hospital::load(cfg, Arc::new(MemoryStore::new()), start)
            .unwrap()
            .into_shared();
        let notifications = Arc::new(RecordingSink::new(50));
        let sink = Arc::new(FanoutSink::new().with(notifications.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            hospital.clone(),
            Arc::new(RuleBasedOracle),
            sink.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        ));
        let clock_dyn: Arc<dyn Clock> = clock.clone();

        let state = AppState {
            hospital,
            orchestrator,
            sink,
            notifications,
            clock: clock_dyn,
        };
        (router(state), clock)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, name: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/patients",
            Some(json!({ "name": name, "date_of_birth": "1979-04-12" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["patient"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn occupied_bed_is_a_conflict() {
        let (app, _) = app();
        let first = register(&app, "First Patient").await;
        let second = register(&app, "Second Patient").await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{first}/icu"),
            Some(json!({ "bed": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "admitted");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{second}/icu"),
            Some(json!({ "bed": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("ICU bed 5"));
    }

    #[tokio::test]
    async fn validation_and_not_found_map_to_status_codes() {
        let (app, _) = app();
        let id = register(&app, "Ada Obi").await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/icu"),
            Some(json!({ "bed": 13 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = wardflow_core::RecordId::new();
        let (status, _) = send(&app, "GET", &format!("/patients/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn discharge_then_ledger_payment() {
        let (app, _) = app();
        let id = register(&app, "Ada Obi").await;
        send(
            &app,
            "POST",
            &format!("/patients/{id}/ward"),
            Some(json!({ "floor": 2, "room": 3 })),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/discharge"),
            Some(json!({ "status": "recovered" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["department"], "medical_records");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/discharge"),
            Some(json!({ "status": "deceased" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/ledger"),
            Some(json!({ "kind": "payment", "description": "Card", "amount": -2000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, ledger) = send(&app, "GET", &format!("/patients/{id}/ledger"), None).await;
        assert_eq!(ledger["balance"], 0);
        assert_eq!(ledger["records"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn instrument_progress_follows_the_clock() {
        let (app, clock) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/instruments",
            Some(json!({
                "name": "Ortho tray",
                "department": "wards",
                "cycle_duration_secs": 1200
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stage"], "cleaning");
        let id = body["id"].as_str().unwrap().to_string();

        for _ in 0..2 {
            send(&app, "POST", &format!("/instruments/{id}/advance"), None).await;
        }
        clock.advance(chrono::Duration::seconds(300));

        let (_, progress) = send(&app, "GET", &format!("/instruments/{id}/progress"), None).await;
        assert_eq!(progress["stage"], "sterilizing");
        assert_eq!(progress["progress"], 25.0);
        assert_eq!(progress["remaining_secs"], 900);
    }

    #[tokio::test]
    async fn toggle_flips_orchestrator_state() {
        let (app, _) = app();
        let (_, body) = send(&app, "GET", "/orchestrator", None).await;
        assert_eq!(body["state"], "running");
        assert_eq!(body["oracle"], "rule-based");

        let (_, body) = send(&app, "POST", "/orchestrator/toggle", None).await;
        assert_eq!(body["state"], "stopped");
    }

    #[tokio::test]
    async fn rest_changes_show_up_in_notifications() {
        let (app, _) = app();
        let id = register(&app, "Ada Obi").await;
        send(
            &app,
            "POST",
            &format!("/patients/{id}/emergency"),
            Some(json!({ "triage_level": "urgent" })),
        )
        .await;

        let (_, body) = send(&app, "GET", "/notifications", None).await;
        let titles: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Patient registered", "Emergency admission"]);
    }

    #[tokio::test]
    async fn service_request_changes_are_notified() {
        let (app, _) = app();
        let id = register(&app, "Ada Obi").await;
        let (status, request) = send(
            &app,
            "POST",
            "/service-requests",
            Some(json!({ "patient_id": id, "description": "Porter to imaging" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let request_id = request["id"].as_str().unwrap();

        let (status, advanced) = send(
            &app,
            "POST",
            &format!("/service-requests/{request_id}/advance"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(advanced["status"], "in_progress");

        let (_, body) = send(&app, "GET", "/notifications", None).await;
        let titles: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            titles,
            vec![
                "Patient registered",
                "Service request created",
                "Service request updated"
            ]
        );
    }
}
