//! The `Hospital` aggregate: one owner for every collection.
//!
//! `Hospital` bundles the patient registry, sterilization pipeline, service desk and doctor
//! directory behind a single value so that callers (the orchestrator, REST handlers, the CLI)
//! have exactly one thing to lock. It also hosts [`Hospital::apply`], which turns a proposed
//! [`Action`] into a validated state transition plus the notifications describing it.
//!
//! Nothing in here is async. Shared use goes through [`SharedHospital`], and the lock must be
//! released before any `.await`.

use crate::action::{Action, WorldSnapshot};
use crate::config::CoreConfig;
use crate::ledger::{FinancialRecord, RecordKind};
use crate::notification::Notification;
use crate::patient::{NewPatient, Patient, PatientUpdate};
use crate::repositories::doctors::{Doctor, DoctorDirectory, StoredDoctorDirectory};
use crate::repositories::instruments::{InstrumentSet, StageAdvance, SterilizationPipeline};
use crate::repositories::patients::{
    Discharge, EmergencyAdmission, PatientRegistry, ReferralOutcome, Registration, Transfer,
};
use crate::repositories::service_requests::{ServiceDesk, ServiceRequest, ServiceRequestStatus};
use crate::repositories::store::{JsonFileStore, SnapshotStore};
use crate::{seed, CareError, CareResult};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wardflow_types::{Department, DischargeStatus, TriageLevel};
use wardflow_uuid::RecordId;

pub type SharedHospital = Arc<Mutex<Hospital>>;

/// Locks the shared hospital, recovering the guard if a previous holder panicked.
///
/// Every mutation validates before it writes, so a panic mid-operation cannot leave a
/// half-applied transition behind.
pub fn lock(hospital: &SharedHospital) -> MutexGuard<'_, Hospital> {
    hospital.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Hospital {
    cfg: CoreConfig,
    registry: PatientRegistry,
    sterilization: SterilizationPipeline,
    services: ServiceDesk,
    doctors: Box<dyn DoctorDirectory>,
}

impl Hospital {
    /// Loads every collection from `store`, seeding starter data for missing ones.
    ///
    /// Doctors load first so that seeded patients can reference real doctor ids.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any collection cannot be read, decoded or seeded.
    pub fn load(
        cfg: CoreConfig,
        store: Arc<dyn SnapshotStore>,
        now: DateTime<Utc>,
    ) -> CareResult<Self> {
        let seed_doctors = seed::doctors()?;
        let doctors = StoredDoctorDirectory::load(store.clone(), move || seed_doctors)?;

        let seed_patients = seed::patients(
            &doctors.list(),
            cfg.icu_admission_fee(),
            cfg.ward_admission_fee(),
            now,
        )?;
        let registry = PatientRegistry::load(&cfg, store.clone(), move || seed_patients)?;

        let seed_sets = seed::instrument_sets(cfg.sterilization_cycle_secs(), now)?;
        let sterilization = SterilizationPipeline::load(
            store.clone(),
            cfg.sterilization_cycle_secs(),
            move || seed_sets,
        )?;

        let services = ServiceDesk::load(store)?;

        tracing::info!(
            "hospital loaded: {} patients, {} doctors, {} instrument sets, {} service requests",
            registry.list().len(),
            doctors.list().len(),
            sterilization.list().len(),
            services.list().len()
        );

        Ok(Self {
            cfg,
            registry,
            sterilization,
            services,
            doctors: Box::new(doctors),
        })
    }

    /// Opens a [`JsonFileStore`] under the configured data directory and loads from it.
    pub fn open(cfg: CoreConfig, now: DateTime<Utc>) -> CareResult<Self> {
        let store = JsonFileStore::open(cfg.data_dir())?;
        Self::load(cfg, Arc::new(store), now)
    }

    pub fn into_shared(self) -> SharedHospital {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &PatientRegistry {
        &self.registry
    }

    pub fn sterilization(&self) -> &SterilizationPipeline {
        &self.sterilization
    }

    pub fn services(&self) -> &ServiceDesk {
        &self.services
    }

    pub fn doctors(&self) -> Vec<Doctor> {
        self.doctors.list()
    }

    // ------------------------------------------------------------------------
    // Patient flow
    // ------------------------------------------------------------------------

    pub fn register(&mut self, new: NewPatient, now: DateTime<Utc>) -> CareResult<Registration> {
        self.registry.register(new, self.doctors.as_mut(), now)
    }

    pub fn admit_to_emergency(
        &mut self,
        patient_id: RecordId,
        triage_level: Option<TriageLevel>,
        now: DateTime<Utc>,
    ) -> CareResult<EmergencyAdmission> {
        self.registry.admit_to_emergency(patient_id, triage_level, now)
    }

    pub fn transfer_to_icu(
        &mut self,
        patient_id: RecordId,
        bed: u8,
        now: DateTime<Utc>,
    ) -> CareResult<Transfer> {
        self.registry.transfer_to_icu(patient_id, bed, now)
    }

    pub fn transfer_to_ward(
        &mut self,
        patient_id: RecordId,
        floor: u8,
        room: u8,
        now: DateTime<Utc>,
    ) -> CareResult<Transfer> {
        self.registry.transfer_to_ward(patient_id, floor, room, now)
    }

    pub fn discharge(
        &mut self,
        patient_id: RecordId,
        outcome: DischargeStatus,
        now: DateTime<Utc>,
    ) -> CareResult<Discharge> {
        self.registry.discharge(patient_id, outcome, now)
    }

    pub fn update_patient(
        &mut self,
        patient_id: RecordId,
        update: PatientUpdate,
        now: DateTime<Utc>,
    ) -> CareResult<Patient> {
        self.registry.update(patient_id, update, now)
    }

    pub fn append_record(
        &mut self,
        patient_id: RecordId,
        kind: RecordKind,
        description: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> CareResult<FinancialRecord> {
        self.registry
            .append_record(patient_id, kind, description, amount, now)
    }

    // ------------------------------------------------------------------------
    // Sterilization
    // ------------------------------------------------------------------------

    pub fn request_instruments(
        &mut self,
        name: &str,
        department: Department,
        cycle_duration_secs: Option<u32>,
        now: DateTime<Utc>,
    ) -> CareResult<InstrumentSet> {
        self.sterilization
            .request(name, department, cycle_duration_secs, now)
    }

    pub fn advance_instruments(
        &mut self,
        set_id: RecordId,
        now: DateTime<Utc>,
    ) -> CareResult<StageAdvance> {
        self.sterilization.advance(set_id, now)
    }

    pub fn sweep_sterilization(&mut self, now: DateTime<Utc>) -> CareResult<Vec<InstrumentSet>> {
        self.sterilization.sweep_complete(now)
    }

    // ------------------------------------------------------------------------
    // Service requests
    // ------------------------------------------------------------------------

    /// Raises a service request for an active patient in their current department.
    ///
    /// # Errors
    ///
    /// [`CareError::NotFound`] / [`CareError::AlreadyDischarged`] for unknown or archived
    /// patients, [`CareError::Validation`] for a blank description.
    pub fn create_service_request(
        &mut self,
        patient_id: RecordId,
        description: &str,
        now: DateTime<Utc>,
    ) -> CareResult<ServiceRequest> {
        let patient = self.registry.require(patient_id)?;
        if !patient.is_active() {
            return Err(CareError::AlreadyDischarged(patient_id));
        }
        let department = patient.department;
        self.services
            .create(patient_id, department, description, now)
    }

    pub fn advance_service_request(
        &mut self,
        request_id: RecordId,
        now: DateTime<Utc>,
    ) -> CareResult<ServiceRequest> {
        self.services.advance(request_id, now)
    }

    // ------------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------------

    /// Consistent copy of the world for a decision source.
    pub fn snapshot(&self, now: DateTime<Utc>) -> WorldSnapshot {
        WorldSnapshot {
            taken_at: now,
            patients: self.registry.list().to_vec(),
            doctors: self.doctors.list(),
            departments: self.registry.census(),
            pending_service_requests: self.services.pending(),
            pending_instrument_sets: self.sterilization.pending(),
        }
    }

    /// Applies one proposed action against the *current* state.
    ///
    /// The action is validated afresh: a snapshot may be stale by the time its decisions come
    /// back, so a target that has since been discharged, or a slot that has since been taken,
    /// is rejected here exactly as a direct call would be.
    ///
    /// Returns the notifications describing the transition. An over-capacity emergency intake
    /// adds a warning alongside the info notification.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns; state is unchanged on error.
    pub fn apply(&mut self, action: &Action, now: DateTime<Utc>) -> CareResult<Vec<Notification>> {
        let mut notifications = Vec::new();

        match action {
            Action::AdmitToEmergency {
                patient_id,
                triage_level,
                ..
            } => {
                let admission = self.admit_to_emergency(*patient_id, *triage_level, now)?;
                let triage = admission
                    .patient
                    .triage_level
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                notifications.push(Notification::info(
                    "Emergency admission",
                    format!("{} admitted to emergency ({triage})", admission.patient.name),
                    now,
                ));
                if admission.over_capacity() {
                    notifications.push(over_capacity_warning(
                        admission.count,
                        admission.capacity,
                        now,
                    ));
                }
            }
            Action::TransferToIcu {
                patient_id, bed, ..
            } => {
                let transfer = self.transfer_to_icu(*patient_id, *bed, now)?;
                notifications.push(transfer_notification(&transfer, now));
            }
            Action::TransferToWard {
                patient_id,
                floor,
                room,
                ..
            } => {
                let transfer = self.transfer_to_ward(*patient_id, *floor, *room, now)?;
                notifications.push(transfer_notification(&transfer, now));
            }
            Action::Discharge {
                patient_id, status, ..
            } => {
                let discharge = self.discharge(*patient_id, *status, now)?;
                notifications.push(Notification::info(
                    "Patient discharged",
                    format!("{} discharged ({status})", discharge.patient.name),
                    now,
                ));
            }
            Action::CreateServiceRequest {
                patient_id,
                details,
            } => {
                let name = self.registry.require(*patient_id)?.name.clone();
                let description = details
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("Service request for {name}"));
                let request = self.create_service_request(*patient_id, &description, now)?;
                notifications.push(service_request_notification(&request, now));
            }
            Action::AdvanceServiceRequest { request_id, .. } => {
                let request = self.advance_service_request(*request_id, now)?;
                notifications.push(service_request_notification(&request, now));
            }
        }

        Ok(notifications)
    }
}

fn transfer_notification(transfer: &Transfer, now: DateTime<Utc>) -> Notification {
    if transfer.unchanged() {
        return Notification::info(
            "No change",
            format!("{} already in {}", transfer.patient.name, transfer.slot),
            now,
        );
    }
    Notification::info(
        "Patient transferred",
        format!("{} moved to {}", transfer.patient.name, transfer.slot),
        now,
    )
}

/// Describes a service request that was just raised or moved forward.
pub fn service_request_notification(request: &ServiceRequest, now: DateTime<Utc>) -> Notification {
    match request.status {
        ServiceRequestStatus::Pending => Notification::info(
            "Service request created",
            format!("{} ({})", request.description, request.department),
            now,
        ),
        status => Notification::info(
            "Service request updated",
            format!("{} is now {}", request.description, status),
            now,
        ),
    }
}

fn over_capacity_warning(count: usize, capacity: usize, now: DateTime<Utc>) -> Notification {
    Notification::warning(
        "Emergency over capacity",
        format!("{count} patients in emergency, advisory capacity is {capacity}"),
        now,
    )
}

/// Describes a registration outcome, including an emergency intake above capacity and a
/// referral that could not be recorded.
pub fn registration_notifications(
    registration: &Registration,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut notifications = vec![Notification::info(
        "Patient registered",
        format!(
            "{} registered in {}",
            registration.patient.name, registration.patient.department
        ),
        now,
    )];
    if let Some(occupancy) = registration.emergency.filter(|e| e.over_capacity()) {
        notifications.push(over_capacity_warning(occupancy.count, occupancy.capacity, now));
    }
    if let ReferralOutcome::Failed { doctor_id, reason } = &registration.referral {
        notifications.push(Notification::warning(
            "Referral not recorded",
            format!("doctor {doctor_id}: {reason}"),
            now,
        ));
    }
    notifications
}
