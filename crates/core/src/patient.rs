//! Patient records and the inputs that create or edit them.

use crate::allocator::Slot;
use crate::ledger::Ledger;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use wardflow_types::{Department, DischargeStatus, NonEmptyText, PatientStatus, TriageLevel};
use wardflow_uuid::RecordId;

/// Canonical patient record.
///
/// Patients are never deleted. Discharge moves them into [`Department::MedicalRecords`] with an
/// empty slot and a discharge outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub department: Department,
    pub status: PatientStatus,
    /// Only meaningful, and only retained, while the patient is in emergency.
    #[serde(default)]
    pub triage_level: Option<TriageLevel>,
    #[serde(default)]
    pub slot: Option<Slot>,
    /// Weak reference into the doctor directory; lookup only.
    #[serde(default)]
    pub attending_doctor_id: Option<RecordId>,
    #[serde(default)]
    pub discharge_status: Option<DischargeStatus>,
    #[serde(default)]
    pub financial_records: Ledger,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub discharged_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// Active means not yet discharged.
    pub fn is_active(&self) -> bool {
        !self.status.is_discharged()
    }

    pub fn balance(&self) -> i64 {
        self.financial_records.balance()
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today
            .years_since(self.date_of_birth)
            .unwrap_or_default()
    }
}

/// Input for [`crate::PatientRegistry::register`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub date_of_birth: NaiveDate,
    /// Outpatient when absent. Only `emergency` and `outpatient` are accepted at registration.
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub triage_level: Option<TriageLevel>,
    /// Becomes the attending doctor and receives a referral note.
    #[serde(default)]
    pub referring_doctor_id: Option<RecordId>,
}

/// Partial field edit; `None` leaves a field as it is.
///
/// Location, discharge state and the ledger are not editable here; they only change
/// through admit/transfer/discharge and ledger appends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub triage_level: Option<TriageLevel>,
    #[serde(default)]
    pub attending_doctor_id: Option<RecordId>,
    /// One of waiting, in_treatment, observation.
    #[serde(default)]
    pub status: Option<PatientStatus>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.date_of_birth.is_none()
            && self.triage_level.is_none()
            && self.attending_doctor_id.is_none()
            && self.status.is_none()
    }
}
