//! Actions proposed by a decision source, and the world snapshot it decides over.
//!
//! An [`Action`] is a *request* for a state transition, not a transition. It names its target
//! by id only and carries no state of its own, so it can be serialized to and from an external
//! decision service and re-validated against the current world at apply time.

use crate::patient::Patient;
use crate::repositories::doctors::Doctor;
use crate::repositories::instruments::InstrumentSet;
use crate::repositories::patients::DepartmentCensus;
use crate::repositories::service_requests::ServiceRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use wardflow_types::{DischargeStatus, TriageLevel};
use wardflow_uuid::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AdmitToEmergency {
        patient_id: RecordId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        triage_level: Option<TriageLevel>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    TransferToIcu {
        patient_id: RecordId,
        bed: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    TransferToWard {
        patient_id: RecordId,
        floor: u8,
        room: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Discharge {
        patient_id: RecordId,
        status: DischargeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    CreateServiceRequest {
        patient_id: RecordId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    AdvanceServiceRequest {
        request_id: RecordId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl Action {
    /// Free-text rationale supplied by the decision source, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            Action::AdmitToEmergency { details, .. }
            | Action::TransferToIcu { details, .. }
            | Action::TransferToWard { details, .. }
            | Action::Discharge { details, .. }
            | Action::CreateServiceRequest { details, .. }
            | Action::AdvanceServiceRequest { details, .. } => details.as_deref(),
        }
    }

    /// The patient this action targets, when it targets one directly.
    pub fn patient_id(&self) -> Option<RecordId> {
        match self {
            Action::AdmitToEmergency { patient_id, .. }
            | Action::TransferToIcu { patient_id, .. }
            | Action::TransferToWard { patient_id, .. }
            | Action::Discharge { patient_id, .. }
            | Action::CreateServiceRequest { patient_id, .. } => Some(*patient_id),
            Action::AdvanceServiceRequest { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AdmitToEmergency { patient_id, .. } => {
                write!(f, "admit {} to emergency", patient_id.short())
            }
            Action::TransferToIcu {
                patient_id, bed, ..
            } => write!(f, "transfer {} to ICU bed {bed}", patient_id.short()),
            Action::TransferToWard {
                patient_id,
                floor,
                room,
                ..
            } => write!(
                f,
                "transfer {} to ward floor {floor} room {room}",
                patient_id.short()
            ),
            Action::Discharge {
                patient_id, status, ..
            } => write!(f, "discharge {} ({status})", patient_id.short()),
            Action::CreateServiceRequest { patient_id, .. } => {
                write!(f, "create service request for {}", patient_id.short())
            }
            Action::AdvanceServiceRequest { request_id, .. } => {
                write!(f, "advance service request {}", request_id.short())
            }
        }
    }
}

/// Consistent read-only copy of the world handed to a decision source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Active and archived patients.
    pub patients: Vec<Patient>,
    pub doctors: Vec<Doctor>,
    pub departments: Vec<DepartmentCensus>,
    pub pending_service_requests: Vec<ServiceRequest>,
    /// Every set not yet in storage.
    pub pending_instrument_sets: Vec<InstrumentSet>,
}

impl WorldSnapshot {
    pub fn active_patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.iter().filter(|p| p.is_active())
    }

    pub fn census(&self, department: wardflow_types::Department) -> Option<&DepartmentCensus> {
        self.departments.iter().find(|c| c.department == department)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_use_tagged_snake_case_json() {
        let patient_id = RecordId::new();
        let action: Action = serde_json::from_value(json!({
            "type": "transfer_to_ward",
            "patient_id": patient_id.to_string(),
            "floor": 3,
            "room": 7,
        }))
        .unwrap();

        assert_eq!(
            action,
            Action::TransferToWard {
                patient_id,
                floor: 3,
                room: 7,
                details: None
            }
        );
        assert_eq!(action.patient_id(), Some(patient_id));
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let parsed = serde_json::from_value::<Action>(json!({
            "type": "teleport",
            "patient_id": RecordId::new().to_string(),
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn details_are_exposed_for_every_variant() {
        let action = Action::Discharge {
            patient_id: RecordId::new(),
            status: DischargeStatus::Recovered,
            details: Some("stable for 48h".into()),
        };
        assert_eq!(action.details(), Some("stable for 48h"));
        assert!(action.to_string().starts_with("discharge "));
    }
}
