//! Patient registry and lifecycle transitions.
//!
//! The registry is the only owner of patient records. Every lifecycle operation (register,
//! admit to emergency, transfer to ICU or ward, discharge, field edit, ledger append) goes
//! through it, and it keeps the [`ResourceAllocator`] in step with each patient's slot
//! reference.
//!
//! ## Lifecycle
//!
//! ```text
//! register ──> Outpatient|Emergency (Waiting)
//!                 │
//!   admit_to_emergency / transfer_to_icu / transfer_to_ward   (any order, repeatable)
//!                 │
//!             discharge ──> MedicalRecords (Discharged)   terminal
//! ```
//!
//! Every operation validates against the *current* state before touching anything, so a
//! rejected call (unknown id, archived patient, occupied slot, bad input) leaves the registry
//! and the allocator exactly as they were.
//!
//! ## Persistence
//!
//! The whole patient collection is rewritten to the snapshot store after each mutation, and
//! the mutation only stands once that write succeeds. A failed write returns the error and
//! restores the collection and slot occupancy to what they were before the call.

use crate::allocator::{EmergencyOccupancy, ResourceAllocator, Slot};
use crate::config::CoreConfig;
use crate::constants::PATIENTS_KEY;
use crate::ledger::{FinancialRecord, RecordKind};
use crate::patient::{NewPatient, Patient, PatientUpdate};
use crate::repositories::doctors::DoctorDirectory;
use crate::repositories::store::{load_collection, save_collection, SnapshotStore};
use crate::validation::validate_date_of_birth;
use crate::{CareError, CareResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use wardflow_types::{Department, DischargeStatus, NonEmptyText, PatientStatus, TriageLevel};
use wardflow_uuid::RecordId;

/// What happened to the referral side effect of a registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferralOutcome {
    NotRequested,
    Recorded { doctor_id: RecordId, referral_count: u32 },
    /// The patient exists; the doctor's counter was not updated.
    Failed { doctor_id: RecordId, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub patient: Patient,
    pub referral: ReferralOutcome,
    /// Emergency headcount after the intake, for patients registered into emergency.
    pub emergency: Option<EmergencyOccupancy>,
}

impl Registration {
    pub fn over_capacity(&self) -> bool {
        self.emergency.is_some_and(|e| e.over_capacity())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyAdmission {
    pub patient: Patient,
    pub released: Option<Slot>,
    pub count: usize,
    pub capacity: usize,
}

impl EmergencyAdmission {
    pub fn over_capacity(&self) -> bool {
        self.count > self.capacity
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    pub patient: Patient,
    pub slot: Slot,
    pub released: Option<Slot>,
    /// `None` when the patient already held `slot` and nothing changed.
    pub fee_charged: Option<i64>,
}

impl Transfer {
    pub fn unchanged(&self) -> bool {
        self.fee_charged.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Discharge {
    pub patient: Patient,
    pub released: Option<Slot>,
}

/// Head count and capacity of one department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct DepartmentCensus {
    pub department: Department,
    pub count: usize,
    /// Advisory for emergency; `None` where unbounded.
    pub capacity: Option<usize>,
}

pub struct PatientRegistry {
    store: Arc<dyn SnapshotStore>,
    patients: Vec<Patient>,
    index: HashMap<RecordId, usize>,
    allocator: ResourceAllocator,
    icu_admission_fee: i64,
    ward_admission_fee: i64,
}

impl PatientRegistry {
    /// Loads the patient collection and rebuilds slot occupancy from it.
    ///
    /// A missing collection is seeded from `seed()` and written back immediately. When slot
    /// references collide in persisted data the first holder in list order keeps the slot; the
    /// others lose it, go back to waiting in outpatient, and the repaired collection is
    /// written back.
    pub fn load(
        cfg: &CoreConfig,
        store: Arc<dyn SnapshotStore>,
        seed: impl FnOnce() -> Vec<Patient>,
    ) -> CareResult<Self> {
        let (mut patients, seeded) =
            match load_collection::<Patient>(store.as_ref(), PATIENTS_KEY)? {
                Some(patients) => (patients, false),
                None => (seed(), true),
            };

        let (mut allocator, evicted) =
            ResourceAllocator::rebuild(&patients, cfg.emergency_capacity());
        for patient in patients.iter_mut().filter(|p| evicted.contains(&p.id)) {
            tracing::warn!(
                "patient {} lost its slot in {} on load; moved to waiting in outpatient",
                patient.id,
                patient.department
            );
            allocator.leave_emergency(patient.id);
            patient.slot = None;
            patient.department = Department::Outpatient;
            patient.status = PatientStatus::Waiting;
            patient.triage_level = None;
        }

        let index = patients
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();

        let registry = Self {
            store,
            patients,
            index,
            allocator,
            icu_admission_fee: cfg.icu_admission_fee(),
            ward_admission_fee: cfg.ward_admission_fee(),
        };

        if seeded || !evicted.is_empty() {
            if seeded {
                tracing::info!(
                    "seeding patient registry with {} patients",
                    registry.patients.len()
                );
            }
            registry.persist()?;
        }

        Ok(registry)
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn get(&self, patient_id: RecordId) -> Option<&Patient> {
        self.index.get(&patient_id).map(|&i| &self.patients[i])
    }

    /// Like [`get`](Self::get) but a missing patient is an error.
    pub fn require(&self, patient_id: RecordId) -> CareResult<&Patient> {
        self.get(patient_id)
            .ok_or_else(|| CareError::not_found("patient", patient_id))
    }

    /// All patients in registration order, archived ones included.
    pub fn list(&self) -> &[Patient] {
        &self.patients
    }

    pub fn active(&self) -> impl Iterator<Item = &Patient> {
        self.patients.iter().filter(|p| p.is_active())
    }

    pub fn allocator(&self) -> &ResourceAllocator {
        &self.allocator
    }

    pub fn balance(&self, patient_id: RecordId) -> CareResult<i64> {
        Ok(self.require(patient_id)?.balance())
    }

    /// Per-department head count and capacity.
    pub fn census(&self) -> Vec<DepartmentCensus> {
        Department::ALL
            .iter()
            .map(|&department| {
                let count = self
                    .patients
                    .iter()
                    .filter(|p| p.department == department)
                    .count();
                DepartmentCensus {
                    department,
                    count,
                    capacity: self.allocator.capacity(department),
                }
            })
            .collect()
    }

    // ========================================================================
    // LIFECYCLE OPERATIONS
    // ========================================================================

    /// Registers a new patient.
    ///
    /// The patient is created and persisted first. If a referring doctor is named, the
    /// directory's referral counter is then incremented; that second step is best-effort and
    /// its outcome is reported in [`Registration::referral`] rather than undoing the patient.
    ///
    /// # Errors
    ///
    /// [`CareError::Validation`] for a blank name, an implausible date of birth, or an initial
    /// department other than emergency or outpatient.
    pub fn register(
        &mut self,
        new: NewPatient,
        doctors: &mut dyn DoctorDirectory,
        now: DateTime<Utc>,
    ) -> CareResult<Registration> {
        let name = NonEmptyText::new(&new.name)?;
        validate_date_of_birth(new.date_of_birth, now)?;

        let department = new.department.unwrap_or(Department::Outpatient);
        if !matches!(department, Department::Emergency | Department::Outpatient) {
            return Err(CareError::Validation(format!(
                "patients are registered into emergency or outpatient, not {department}"
            )));
        }

        let triage_level = match department {
            Department::Emergency => Some(new.triage_level.unwrap_or(TriageLevel::Stable)),
            _ => None,
        };

        let patient = Patient {
            id: RecordId::new(),
            name,
            date_of_birth: new.date_of_birth,
            department,
            status: PatientStatus::Waiting,
            triage_level,
            slot: None,
            attending_doctor_id: new.referring_doctor_id,
            discharge_status: None,
            financial_records: Default::default(),
            registered_at: now,
            updated_at: now,
            discharged_at: None,
        };

        let id = patient.id;
        let note = format!("Referred {} on registration", patient.name);
        let emergency = self.commit(|registry| {
            registry.index.insert(id, registry.patients.len());
            registry.patients.push(patient);
            Ok((department == Department::Emergency)
                .then(|| registry.allocator.enter_emergency(id)))
        })?;
        tracing::info!("registered patient {} into {}", id, department);

        let referral = match new.referring_doctor_id {
            None => ReferralOutcome::NotRequested,
            Some(doctor_id) => {
                match doctors.increment_referral(doctor_id, id, &note, now) {
                    Ok(referral_count) => ReferralOutcome::Recorded {
                        doctor_id,
                        referral_count,
                    },
                    Err(e) => {
                        tracing::warn!(
                            "patient {} registered but referral to doctor {} failed: {}",
                            id,
                            doctor_id,
                            e
                        );
                        ReferralOutcome::Failed {
                            doctor_id,
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        Ok(Registration {
            patient: self.patients[self.patients.len() - 1].clone(),
            referral,
            emergency,
        })
    }

    /// Moves a patient into emergency intake with status Waiting.
    ///
    /// Emergency has no hard slots: any ICU bed or ward room the patient held is released, and
    /// the intake is counted against the advisory capacity without ever being refused.
    ///
    /// # Errors
    ///
    /// [`CareError::NotFound`] for an unknown id, [`CareError::AlreadyDischarged`] for an
    /// archived patient.
    pub fn admit_to_emergency(
        &mut self,
        patient_id: RecordId,
        triage_level: Option<TriageLevel>,
        now: DateTime<Utc>,
    ) -> CareResult<EmergencyAdmission> {
        let idx = self.active_index(patient_id)?;

        let admission = self.commit(|registry| {
            let released = registry.release_slot_of(idx);
            let EmergencyOccupancy { count, capacity } =
                registry.allocator.enter_emergency(patient_id);

            let patient = &mut registry.patients[idx];
            patient.triage_level = triage_level
                .or(patient.triage_level)
                .or(Some(TriageLevel::Stable));
            patient.department = Department::Emergency;
            patient.status = PatientStatus::Waiting;
            patient.updated_at = now;

            Ok(EmergencyAdmission {
                patient: patient.clone(),
                released,
                count,
                capacity,
            })
        })?;
        tracing::info!("patient {} admitted to emergency", patient_id);

        Ok(admission)
    }

    /// Admits a patient to an ICU bed.
    ///
    /// On success the patient is Admitted in ICU, any previously held slot is released, triage
    /// is cleared and the ICU admission fee is appended to the ledger. Asking for the bed the
    /// patient already holds succeeds without change and without a second fee.
    ///
    /// # Errors
    ///
    /// - [`CareError::Validation`] if `bed` is outside `1..=12`.
    /// - [`CareError::NotFound`] / [`CareError::AlreadyDischarged`] for unknown or archived
    ///   patients.
    /// - [`CareError::Conflict`] if another active patient holds the bed.
    pub fn transfer_to_icu(
        &mut self,
        patient_id: RecordId,
        bed: u8,
        now: DateTime<Utc>,
    ) -> CareResult<Transfer> {
        let slot = Slot::icu_bed(bed)?;
        self.move_into_slot(patient_id, slot, self.icu_admission_fee, now)
    }

    /// Admits a patient to a ward room addressed by `(floor, room)`.
    ///
    /// Same semantics as [`transfer_to_icu`](Self::transfer_to_icu) with the ward fee.
    pub fn transfer_to_ward(
        &mut self,
        patient_id: RecordId,
        floor: u8,
        room: u8,
        now: DateTime<Utc>,
    ) -> CareResult<Transfer> {
        let slot = Slot::ward_room(floor, room)?;
        self.move_into_slot(patient_id, slot, self.ward_admission_fee, now)
    }

    /// Discharges a patient into the archival department.
    ///
    /// Releases any held slot, records the outcome and timestamp. Discharging an archived
    /// patient is rejected with [`CareError::AlreadyDischarged`] and changes nothing.
    pub fn discharge(
        &mut self,
        patient_id: RecordId,
        outcome: DischargeStatus,
        now: DateTime<Utc>,
    ) -> CareResult<Discharge> {
        let idx = self.active_index(patient_id)?;

        let discharge = self.commit(|registry| {
            let released = registry.release_slot_of(idx);
            registry.allocator.leave_emergency(patient_id);

            let patient = &mut registry.patients[idx];
            patient.status = PatientStatus::Discharged;
            patient.discharge_status = Some(outcome);
            patient.department = Department::MedicalRecords;
            patient.triage_level = None;
            patient.discharged_at = Some(now);
            patient.updated_at = now;

            Ok(Discharge {
                patient: patient.clone(),
                released,
            })
        })?;
        tracing::info!("patient {} discharged ({})", patient_id, outcome);

        Ok(discharge)
    }

    /// Merges editable fields into a patient record. Last write wins.
    ///
    /// Archived records may still have their name, date of birth and attending doctor
    /// corrected; status and triage edits require an active patient. Triage is only kept
    /// while the patient is in emergency.
    ///
    /// # Errors
    ///
    /// [`CareError::Validation`] for an empty update, invalid values, or a status outside
    /// waiting/in_treatment/observation.
    pub fn update(
        &mut self,
        patient_id: RecordId,
        update: PatientUpdate,
        now: DateTime<Utc>,
    ) -> CareResult<Patient> {
        if update.is_empty() {
            return Err(CareError::Validation("update contains no fields".into()));
        }

        let idx = *self
            .index
            .get(&patient_id)
            .ok_or_else(|| CareError::not_found("patient", patient_id))?;

        let name = update.name.as_deref().map(NonEmptyText::new).transpose()?;
        if let Some(dob) = update.date_of_birth {
            validate_date_of_birth(dob, now)?;
        }
        if let Some(status) = update.status {
            if !matches!(
                status,
                PatientStatus::Waiting | PatientStatus::InTreatment | PatientStatus::Observation
            ) {
                return Err(CareError::Validation(format!(
                    "status '{status}' is only reachable through admission or discharge"
                )));
            }
        }
        if (update.status.is_some() || update.triage_level.is_some())
            && !self.patients[idx].is_active()
        {
            return Err(CareError::AlreadyDischarged(patient_id));
        }

        self.commit(|registry| {
            let patient = &mut registry.patients[idx];
            if let Some(name) = name {
                patient.name = name;
            }
            if let Some(dob) = update.date_of_birth {
                patient.date_of_birth = dob;
            }
            if let Some(doctor) = update.attending_doctor_id {
                patient.attending_doctor_id = Some(doctor);
            }
            if let Some(status) = update.status {
                patient.status = status;
            }
            if let Some(triage) = update.triage_level {
                if patient.department == Department::Emergency {
                    patient.triage_level = Some(triage);
                } else {
                    tracing::debug!(
                        "ignoring triage level for patient {} outside emergency",
                        patient_id
                    );
                }
            }
            patient.updated_at = now;
            Ok(patient.clone())
        })
    }

    /// Appends a financial record to a patient's ledger.
    ///
    /// Archived patients can still be billed or receive payments.
    pub fn append_record(
        &mut self,
        patient_id: RecordId,
        kind: RecordKind,
        description: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> CareResult<FinancialRecord> {
        let idx = *self
            .index
            .get(&patient_id)
            .ok_or_else(|| CareError::not_found("patient", patient_id))?;
        let description = NonEmptyText::new(description)?;

        self.commit(|registry| {
            let record = registry.patients[idx]
                .financial_records
                .append(kind, description, amount, now)?;
            Ok(record.clone())
        })
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn active_index(&self, patient_id: RecordId) -> CareResult<usize> {
        let idx = *self
            .index
            .get(&patient_id)
            .ok_or_else(|| CareError::not_found("patient", patient_id))?;
        if !self.patients[idx].is_active() {
            return Err(CareError::AlreadyDischarged(patient_id));
        }
        Ok(idx)
    }

    fn release_slot_of(&mut self, idx: usize) -> Option<Slot> {
        let released = self.patients[idx].slot.take();
        if let Some(slot) = released {
            self.allocator.release(slot);
        }
        released
    }

    fn move_into_slot(
        &mut self,
        patient_id: RecordId,
        slot: Slot,
        fee: i64,
        now: DateTime<Utc>,
    ) -> CareResult<Transfer> {
        let idx = self.active_index(patient_id)?;

        if self.patients[idx].slot == Some(slot) {
            return Ok(Transfer {
                patient: self.patients[idx].clone(),
                slot,
                released: None,
                fee_charged: None,
            });
        }

        let transfer = self.commit(|registry| {
            registry.allocator.acquire(slot, patient_id)?;
            let released = registry.release_slot_of(idx);
            registry.allocator.leave_emergency(patient_id);

            let department = slot.department();
            let patient = &mut registry.patients[idx];
            patient.department = department;
            patient.status = PatientStatus::Admitted;
            patient.triage_level = None;
            patient.slot = Some(slot);
            patient.updated_at = now;

            if fee > 0 {
                let description = NonEmptyText::new(format!("{department} admission ({slot})"))?;
                patient
                    .financial_records
                    .append(RecordKind::Admission, description, fee, now)?;
            }

            Ok(Transfer {
                patient: patient.clone(),
                slot,
                released,
                fee_charged: Some(fee),
            })
        })?;
        tracing::info!("patient {} admitted to {}", patient_id, slot);

        Ok(transfer)
    }

    /// Runs `change` against the live collection and persists the result.
    ///
    /// If `change` fails or the write is refused, patients, index and occupancy are put back
    /// exactly as they were.
    fn commit<T>(&mut self, change: impl FnOnce(&mut Self) -> CareResult<T>) -> CareResult<T> {
        let patients = self.patients.clone();
        let index = self.index.clone();
        let allocator = self.allocator.clone();

        let result = match change(self) {
            Ok(value) => self.persist().map(|()| value),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.patients = patients;
            self.index = index;
            self.allocator = allocator;
        }
        result
    }

    fn persist(&self) -> CareResult<()> {
        save_collection(self.store.as_ref(), PATIENTS_KEY, &self.patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::doctors::{Doctor, StoredDoctorDirectory};
    use crate::repositories::store::{FailingStore, MemoryStore};
    use chrono::{NaiveDate, TimeZone};
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn config(emergency_capacity: usize) -> CoreConfig {
        CoreConfig::new(PathBuf::from("unused"), emergency_capacity, 5000, 2000, 1200).unwrap()
    }

    fn empty_registry(store: Arc<dyn SnapshotStore>, emergency_capacity: usize) -> PatientRegistry {
        PatientRegistry::load(&config(emergency_capacity), store, Vec::new).unwrap()
    }

    fn no_doctors() -> StoredDoctorDirectory {
        StoredDoctorDirectory::load(Arc::new(MemoryStore::new()), Vec::new).unwrap()
    }

    fn new_patient(name: &str, department: Option<Department>) -> NewPatient {
        NewPatient {
            name: name.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 6, 1).unwrap(),
            department,
            triage_level: None,
            referring_doctor_id: None,
        }
    }

    fn register(registry: &mut PatientRegistry, name: &str) -> RecordId {
        registry
            .register(new_patient(name, None), &mut no_doctors(), now())
            .unwrap()
            .patient
            .id
    }

    #[test]
    fn registration_defaults_to_waiting_outpatient() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let registration = registry
            .register(new_patient("Ada Obi", None), &mut no_doctors(), now())
            .unwrap();

        let patient = registration.patient;
        assert_eq!(patient.department, Department::Outpatient);
        assert_eq!(patient.status, PatientStatus::Waiting);
        assert!(patient.slot.is_none());
        assert!(patient.financial_records.is_empty());
        assert_eq!(registration.referral, ReferralOutcome::NotRequested);
    }

    #[test]
    fn registration_rejects_slotted_departments_and_blank_names() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let err = registry
            .register(new_patient("Ada", Some(Department::Icu)), &mut no_doctors(), now())
            .unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));

        let err = registry
            .register(new_patient("   ", None), &mut no_doctors(), now())
            .unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn failed_referral_keeps_the_patient() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let missing_doctor = RecordId::new();
        let mut input = new_patient("Ada Obi", None);
        input.referring_doctor_id = Some(missing_doctor);

        let registration = registry.register(input, &mut no_doctors(), now()).unwrap();
        assert!(matches!(
            registration.referral,
            ReferralOutcome::Failed { doctor_id, .. } if doctor_id == missing_doctor
        ));
        assert!(registry.get(registration.patient.id).is_some());
    }

    #[test]
    fn referral_is_recorded_against_the_doctor() {
        let doctor = Doctor {
            id: RecordId::new(),
            name: NonEmptyText::new("Dr Mensah").unwrap(),
            specialty: NonEmptyText::new("General medicine").unwrap(),
            department: Department::Wards,
            referral_count: 0,
            notes: vec![],
        };
        let doctor_id = doctor.id;
        let mut doctors =
            StoredDoctorDirectory::load(Arc::new(MemoryStore::new()), || vec![doctor]).unwrap();
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);

        let mut input = new_patient("Ada Obi", Some(Department::Emergency));
        input.referring_doctor_id = Some(doctor_id);
        let registration = registry.register(input, &mut doctors, now()).unwrap();

        assert_eq!(
            registration.referral,
            ReferralOutcome::Recorded {
                doctor_id,
                referral_count: 1
            }
        );
        assert_eq!(registration.patient.attending_doctor_id, Some(doctor_id));
        assert_eq!(registration.patient.triage_level, Some(TriageLevel::Stable));
        assert_eq!(doctors.get(doctor_id).unwrap().notes.len(), 1);
    }

    #[test]
    fn occupied_bed_rejects_second_patient_without_side_effects() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let first = register(&mut registry, "First");
        let second = register(&mut registry, "Second");

        registry.transfer_to_icu(first, 3, now()).unwrap();
        let before = registry.get(second).unwrap().clone();

        let err = registry.transfer_to_icu(second, 3, now()).unwrap_err();
        assert!(matches!(err, CareError::Conflict { occupant, .. } if occupant == first));
        assert_eq!(registry.get(second).unwrap(), &before);
        assert_eq!(registry.allocator().occupant(Slot::IcuBed { bed: 3 }), Some(first));
    }

    #[test]
    fn transfer_moves_slot_and_charges_each_admission() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");

        let to_icu = registry.transfer_to_icu(id, 3, now()).unwrap();
        assert_eq!(to_icu.patient.status, PatientStatus::Admitted);
        assert_eq!(to_icu.fee_charged, Some(5000));

        let to_ward = registry.transfer_to_ward(id, 2, 5, now()).unwrap();
        assert_eq!(to_ward.released, Some(Slot::IcuBed { bed: 3 }));
        assert_eq!(to_ward.patient.department, Department::Wards);
        assert!(registry.allocator().occupant(Slot::IcuBed { bed: 3 }).is_none());
        assert_eq!(
            registry.allocator().occupant(Slot::WardRoom { floor: 2, room: 5 }),
            Some(id)
        );
        assert_eq!(registry.balance(id).unwrap(), 7000);
    }

    #[test]
    fn repeating_the_same_transfer_changes_nothing() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");

        registry.transfer_to_icu(id, 4, now()).unwrap();
        let again = registry.transfer_to_icu(id, 4, now()).unwrap();

        assert!(again.unchanged());
        assert_eq!(again.patient.financial_records.len(), 1);
        assert_eq!(registry.balance(id).unwrap(), 5000);
    }

    #[test]
    fn out_of_range_slots_are_validation_errors() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");

        assert!(matches!(
            registry.transfer_to_icu(id, 13, now()),
            Err(CareError::Validation(_))
        ));
        assert!(matches!(
            registry.transfer_to_ward(id, 21, 1, now()),
            Err(CareError::Validation(_))
        ));
        assert_eq!(registry.get(id).unwrap().department, Department::Outpatient);
    }

    #[test]
    fn discharge_is_final_and_frees_the_slot() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");
        registry.transfer_to_icu(id, 1, now()).unwrap();

        let discharge = registry
            .discharge(id, DischargeStatus::Recovered, now())
            .unwrap();
        assert_eq!(discharge.released, Some(Slot::IcuBed { bed: 1 }));
        assert_eq!(discharge.patient.department, Department::MedicalRecords);
        assert_eq!(discharge.patient.discharge_status, Some(DischargeStatus::Recovered));
        assert!(registry.allocator().occupant(Slot::IcuBed { bed: 1 }).is_none());

        let archived = registry.get(id).unwrap().clone();
        assert!(matches!(
            registry.discharge(id, DischargeStatus::Deceased, now()),
            Err(CareError::AlreadyDischarged(_))
        ));
        assert!(matches!(
            registry.transfer_to_ward(id, 1, 1, now()),
            Err(CareError::AlreadyDischarged(_))
        ));
        assert!(matches!(
            registry.admit_to_emergency(id, None, now()),
            Err(CareError::AlreadyDischarged(_))
        ));
        assert_eq!(registry.get(id).unwrap(), &archived);
    }

    #[test]
    fn emergency_overflow_is_admitted_and_reported() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 1);
        let first = register(&mut registry, "First");
        let second = register(&mut registry, "Second");

        let within = registry
            .admit_to_emergency(first, Some(TriageLevel::Urgent), now())
            .unwrap();
        assert!(!within.over_capacity());

        let over = registry
            .admit_to_emergency(second, Some(TriageLevel::Critical), now())
            .unwrap();
        assert!(over.over_capacity());
        assert_eq!(over.patient.department, Department::Emergency);
        assert_eq!(over.patient.triage_level, Some(TriageLevel::Critical));
    }

    #[test]
    fn admission_clears_triage_and_emergency_headcount() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");
        registry
            .admit_to_emergency(id, Some(TriageLevel::Critical), now())
            .unwrap();
        assert_eq!(registry.allocator().emergency_occupancy().count, 1);

        let transfer = registry.transfer_to_icu(id, 2, now()).unwrap();
        assert!(transfer.patient.triage_level.is_none());
        assert_eq!(registry.allocator().emergency_occupancy().count, 0);
    }

    #[test]
    fn update_rejects_lifecycle_statuses() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");

        let update = PatientUpdate {
            status: Some(PatientStatus::Admitted),
            ..Default::default()
        };
        assert!(matches!(
            registry.update(id, update, now()),
            Err(CareError::Validation(_))
        ));

        let update = PatientUpdate {
            name: Some("Ada N. Obi".into()),
            status: Some(PatientStatus::Observation),
            ..Default::default()
        };
        let patient = registry.update(id, update, now()).unwrap();
        assert_eq!(patient.name.as_str(), "Ada N. Obi");
        assert_eq!(patient.status, PatientStatus::Observation);

        assert!(matches!(
            registry.update(id, PatientUpdate::default(), now()),
            Err(CareError::Validation(_))
        ));
    }

    #[test]
    fn ledger_appends_after_discharge_and_keeps_history() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let id = register(&mut registry, "Ada Obi");
        registry.transfer_to_ward(id, 1, 1, now()).unwrap();
        let first = registry.get(id).unwrap().financial_records.records()[0].clone();

        registry
            .discharge(id, DischargeStatus::Recovered, now())
            .unwrap();
        registry
            .append_record(id, RecordKind::Payment, "Card payment", -1500, now())
            .unwrap();

        let ledger = &registry.get(id).unwrap().financial_records;
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[0], first);
        assert_eq!(registry.balance(id).unwrap(), 500);

        assert!(registry
            .append_record(id, RecordKind::Payment, "Wrong sign", 100, now())
            .is_err());
        assert_eq!(registry.get(id).unwrap().financial_records.len(), 2);
    }

    #[test]
    fn reload_restores_occupancy_from_the_store() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let mut registry = empty_registry(store.clone(), 50);
        let id = register(&mut registry, "Ada Obi");
        registry.transfer_to_icu(id, 7, now()).unwrap();

        let reloaded = PatientRegistry::load(&config(50), store, || {
            panic!("existing collection must not be reseeded")
        })
        .unwrap();
        assert_eq!(reloaded.allocator().occupant(Slot::IcuBed { bed: 7 }), Some(id));
        assert_eq!(reloaded.balance(id).unwrap(), 5000);
    }

    #[test]
    fn colliding_slots_in_seed_are_cleared_on_load() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let first = register(&mut registry, "First");
        let second = register(&mut registry, "Second");
        let mut patients = registry.list().to_vec();
        for patient in &mut patients {
            patient.department = Department::Icu;
            patient.status = PatientStatus::Admitted;
            patient.slot = Some(Slot::IcuBed { bed: 1 });
        }

        let loaded =
            PatientRegistry::load(&config(50), Arc::new(MemoryStore::new()), || patients)
                .unwrap();
        assert_eq!(loaded.allocator().occupant(Slot::IcuBed { bed: 1 }), Some(first));
        let evicted = loaded.get(second).unwrap();
        assert!(evicted.slot.is_none());
        assert_eq!(evicted.department, Department::Outpatient);
        assert_eq!(evicted.status, PatientStatus::Waiting);
        let outpatient = loaded
            .census()
            .into_iter()
            .find(|c| c.department == Department::Outpatient)
            .unwrap();
        assert_eq!(outpatient.count, 1);
    }

    #[test]
    fn refused_write_rolls_back_every_transition() {
        let store = Arc::new(FailingStore::default());
        let mut registry = empty_registry(store.clone(), 50);
        let ward_patient = register(&mut registry, "Ward patient");
        let emergency_patient = register(&mut registry, "Emergency patient");
        registry.transfer_to_ward(ward_patient, 4, 2, now()).unwrap();
        registry
            .admit_to_emergency(emergency_patient, Some(TriageLevel::Urgent), now())
            .unwrap();
        let before = registry.list().to_vec();
        store.refuse_writes();

        let err = registry.transfer_to_icu(ward_patient, 9, now()).unwrap_err();
        assert!(matches!(err, CareError::FileWrite { .. }));
        assert!(registry.transfer_to_icu(emergency_patient, 9, now()).is_err());
        assert!(registry.admit_to_emergency(ward_patient, None, now()).is_err());
        assert!(registry
            .discharge(ward_patient, DischargeStatus::Recovered, now())
            .is_err());
        assert!(registry
            .append_record(ward_patient, RecordKind::Payment, "Card", -100, now())
            .is_err());
        let update = PatientUpdate {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(registry.update(ward_patient, update, now()).is_err());

        assert_eq!(registry.list(), &before[..]);
        let allocator = registry.allocator();
        assert!(allocator.occupant(Slot::IcuBed { bed: 9 }).is_none());
        assert_eq!(
            allocator.occupant(Slot::WardRoom { floor: 4, room: 2 }),
            Some(ward_patient)
        );
        assert_eq!(allocator.emergency_occupancy().count, 1);
        assert_eq!(registry.balance(ward_patient).unwrap(), 2000);
    }

    #[test]
    fn refused_write_does_not_keep_the_registration_or_referral() {
        let doctor = Doctor {
            id: RecordId::new(),
            name: NonEmptyText::new("Dr Mensah").unwrap(),
            specialty: NonEmptyText::new("General medicine").unwrap(),
            department: Department::Wards,
            referral_count: 0,
            notes: vec![],
        };
        let doctor_id = doctor.id;
        let mut doctors =
            StoredDoctorDirectory::load(Arc::new(MemoryStore::new()), || vec![doctor]).unwrap();
        let store = Arc::new(FailingStore::default());
        let mut registry = empty_registry(store.clone(), 50);
        register(&mut registry, "Existing");
        store.refuse_writes();

        let mut input = new_patient("Ada Obi", Some(Department::Emergency));
        input.referring_doctor_id = Some(doctor_id);
        assert!(registry.register(input, &mut doctors, now()).is_err());

        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.allocator().emergency_occupancy().count, 0);
        assert_eq!(doctors.get(doctor_id).unwrap().referral_count, 0);
    }

    #[test]
    fn emergency_registration_reports_occupancy() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 1);
        let first = registry
            .register(
                new_patient("First", Some(Department::Emergency)),
                &mut no_doctors(),
                now(),
            )
            .unwrap();
        assert!(!first.over_capacity());

        let second = registry
            .register(
                new_patient("Second", Some(Department::Emergency)),
                &mut no_doctors(),
                now(),
            )
            .unwrap();
        assert!(second.over_capacity());
        assert_eq!(second.emergency.map(|e| (e.count, e.capacity)), Some((2, 1)));

        let outpatient = registry
            .register(new_patient("Third", None), &mut no_doctors(), now())
            .unwrap();
        assert!(outpatient.emergency.is_none());
    }

    #[test]
    fn transitions_on_one_patient_leave_another_ledger_alone() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let billed = register(&mut registry, "Billed");
        let other = register(&mut registry, "Other");
        registry.transfer_to_ward(billed, 1, 1, now()).unwrap();
        registry
            .append_record(billed, RecordKind::Payment, "Deposit", -500, now())
            .unwrap();
        let balance = registry.balance(billed).unwrap();
        let records = registry.get(billed).unwrap().financial_records.clone();

        registry.transfer_to_icu(other, 2, now()).unwrap();
        registry.transfer_to_ward(other, 1, 2, now()).unwrap();
        registry
            .discharge(other, DischargeStatus::Recovered, now())
            .unwrap();

        assert_eq!(registry.balance(billed).unwrap(), balance);
        assert_eq!(registry.get(billed).unwrap().financial_records, records);
        assert_eq!(registry.balance(other).unwrap(), 7000);
    }

    #[test]
    fn census_counts_every_department() {
        let mut registry = empty_registry(Arc::new(MemoryStore::new()), 50);
        let a = register(&mut registry, "A");
        register(&mut registry, "B");
        registry.transfer_to_icu(a, 1, now()).unwrap();

        let census = registry.census();
        assert_eq!(census.len(), Department::ALL.len());
        let icu = census
            .iter()
            .find(|c| c.department == Department::Icu)
            .unwrap();
        assert_eq!((icu.count, icu.capacity), (1, Some(12)));
        let outpatient = census
            .iter()
            .find(|c| c.department == Department::Outpatient)
            .unwrap();
        assert_eq!((outpatient.count, outpatient.capacity), (1, None));
    }
}
