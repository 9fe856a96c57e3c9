//! # WardFlow Core
//!
//! Patient-flow state machine and the resources it allocates.
//!
//! This crate contains pure, synchronous domain operations:
//! - Patient registration, emergency intake, ICU/ward transfers and discharge
//! - Exclusive ICU bed / ward room allocation with advisory emergency capacity
//! - Append-only per-patient financial ledgers
//! - The four-stage instrument sterilization pipeline, with progress derived from the clock
//! - Departmental service requests and the doctor directory
//! - Whole-collection JSON snapshot persistence
//!
//! The [`Hospital`] aggregate owns all of the above and applies [`Action`]s proposed by a
//! decision source, re-validating each one against current state.
//!
//! **No scheduling or transport concerns**: the decision loop lives in `wardflow-scheduler`,
//! HTTP in `api-rest`.

pub mod action;
pub mod allocator;
pub mod clock;
pub mod config;
pub mod constants;
mod error;
pub mod hospital;
pub mod ledger;
pub mod notification;
pub mod patient;
pub mod repositories;
pub mod seed;
pub mod validation;

pub use action::{Action, WorldSnapshot};
pub use allocator::{EmergencyOccupancy, ResourceAllocator, Slot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CoreConfig, CoreEnv};
pub use error::{CareError, CareResult, ErrorCategory};
pub use hospital::{
    registration_notifications, service_request_notification, Hospital, SharedHospital,
};
pub use ledger::{FinancialRecord, Ledger, RecordKind};
pub use notification::{
    FanoutSink, Notification, NotificationLevel, NotificationSink, RecordingSink, TracingSink,
};
pub use patient::{NewPatient, Patient, PatientUpdate};
pub use repositories::doctors::{Doctor, DoctorDirectory, ReferralNote, StoredDoctorDirectory};
pub use repositories::instruments::{
    InstrumentSet, StageAdvance, SterilizationPipeline, SterilizationStage,
};
pub use repositories::patients::{
    DepartmentCensus, Discharge, EmergencyAdmission, PatientRegistry, ReferralOutcome,
    Registration, Transfer,
};
pub use repositories::service_requests::{ServiceDesk, ServiceRequest, ServiceRequestStatus};
pub use repositories::store::{JsonFileStore, MemoryStore, SnapshotStore};

pub use wardflow_types::{Department, DischargeStatus, NonEmptyText, PatientStatus, TriageLevel};
pub use wardflow_uuid::{RecordId, TimestampId};
