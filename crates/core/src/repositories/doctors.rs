//! Doctor directory.
//!
//! Doctors are an external collaborator of patient flow. The registry only ever holds a doctor
//! *id* (`attending_doctor_id`) and talks to the directory through [`DoctorDirectory`], so there
//! is no owning or cyclic object graph between patients and doctors.

use crate::constants::DOCTORS_KEY;
use crate::repositories::store::{load_collection, save_collection, SnapshotStore};
use crate::{CareError, CareResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wardflow_types::{Department, NonEmptyText};
use wardflow_uuid::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub specialty: NonEmptyText,
    pub department: Department,
    #[serde(default)]
    pub referral_count: u32,
    #[serde(default)]
    pub notes: Vec<ReferralNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralNote {
    pub patient_id: RecordId,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Lookup and referral bookkeeping for doctors.
pub trait DoctorDirectory: Send {
    fn list(&self) -> Vec<Doctor>;

    fn get(&self, id: RecordId) -> Option<Doctor>;

    /// Increments the doctor's referral counter and appends a note.
    ///
    /// Returns the new referral count.
    fn increment_referral(
        &mut self,
        doctor_id: RecordId,
        patient_id: RecordId,
        note: &str,
        now: DateTime<Utc>,
    ) -> CareResult<u32>;
}

/// Doctor directory persisted as one collection in the snapshot store.
pub struct StoredDoctorDirectory {
    store: Arc<dyn SnapshotStore>,
    doctors: Vec<Doctor>,
}

impl StoredDoctorDirectory {
    /// Loads the directory, seeding `seed()` when the store has no doctors yet.
    pub fn load(
        store: Arc<dyn SnapshotStore>,
        seed: impl FnOnce() -> Vec<Doctor>,
    ) -> CareResult<Self> {
        let doctors = match load_collection::<Doctor>(store.as_ref(), DOCTORS_KEY)? {
            Some(doctors) => doctors,
            None => {
                let doctors = seed();
                tracing::info!("seeding doctor directory with {} doctors", doctors.len());
                save_collection(store.as_ref(), DOCTORS_KEY, &doctors)?;
                doctors
            }
        };

        Ok(Self { store, doctors })
    }
}

impl DoctorDirectory for StoredDoctorDirectory {
    fn list(&self) -> Vec<Doctor> {
        self.doctors.clone()
    }

    fn get(&self, id: RecordId) -> Option<Doctor> {
        self.doctors.iter().find(|d| d.id == id).cloned()
    }

    fn increment_referral(
        &mut self,
        doctor_id: RecordId,
        patient_id: RecordId,
        note: &str,
        now: DateTime<Utc>,
    ) -> CareResult<u32> {
        let mut doctors = self.doctors.clone();
        let doctor = doctors
            .iter_mut()
            .find(|d| d.id == doctor_id)
            .ok_or_else(|| CareError::not_found("doctor", doctor_id))?;

        doctor.referral_count = doctor.referral_count.saturating_add(1);
        doctor.notes.push(ReferralNote {
            patient_id,
            note: note.to_string(),
            at: now,
        });
        let count = doctor.referral_count;

        save_collection(self.store.as_ref(), DOCTORS_KEY, &doctors)?;
        self.doctors = doctors;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::store::MemoryStore;
    use chrono::TimeZone;

    fn doctor(name: &str) -> Doctor {
        Doctor {
            id: RecordId::new(),
            name: NonEmptyText::new(name).unwrap(),
            specialty: NonEmptyText::new("Intensive care").unwrap(),
            department: Department::Icu,
            referral_count: 0,
            notes: vec![],
        }
    }

    #[test]
    fn seeds_once_and_then_reads_back() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let first = StoredDoctorDirectory::load(store.clone(), || vec![doctor("Dr Okafor")])
            .unwrap();
        assert_eq!(first.list().len(), 1);

        let second =
            StoredDoctorDirectory::load(store, || panic!("must not reseed an existing store"))
                .unwrap();
        assert_eq!(second.list(), first.list());
    }

    #[test]
    fn referral_increments_and_persists() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let seeded = doctor("Dr Okafor");
        let id = seeded.id;
        let mut directory = StoredDoctorDirectory::load(store.clone(), || vec![seeded]).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap();

        let patient = RecordId::new();
        assert_eq!(directory.increment_referral(id, patient, "chest pain", now).unwrap(), 1);
        assert_eq!(directory.increment_referral(id, patient, "follow-up", now).unwrap(), 2);

        let reloaded = StoredDoctorDirectory::load(store, Vec::new).unwrap();
        let stored = reloaded.get(id).unwrap();
        assert_eq!(stored.referral_count, 2);
        assert_eq!(stored.notes.len(), 2);
        assert_eq!(stored.notes[0].note, "chest pain");
    }

    #[test]
    fn unknown_doctor_is_not_found() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let mut directory = StoredDoctorDirectory::load(store, Vec::new).unwrap();
        let err = directory
            .increment_referral(RecordId::new(), RecordId::new(), "x", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CareError::NotFound { kind: "doctor", .. }));
    }
}
