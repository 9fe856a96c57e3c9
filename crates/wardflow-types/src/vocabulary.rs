//! Closed sets used across patient flow.
//!
//! Labels are snake_case on the wire. Parsing also accepts kebab-case so CLI input such as
//! `medical-records` works without quoting games.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a label does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct VocabularyError {
    kind: &'static str,
    value: String,
}

fn normalise(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

macro_rules! labelled_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The snake_case label used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = VocabularyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match normalise(s).as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(VocabularyError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// A care unit a patient currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Emergency,
    Icu,
    Wards,
    Outpatient,
    /// Archival unit that receives every discharged patient.
    MedicalRecords,
}

labelled_enum!(Department, "department", {
    Emergency => "emergency",
    Icu => "icu",
    Wards => "wards",
    Outpatient => "outpatient",
    MedicalRecords => "medical_records",
});

impl Department {
    /// Departments whose capacity is a pool of exclusively occupied slots.
    pub fn is_slotted(&self) -> bool {
        matches!(self, Department::Icu | Department::Wards)
    }

    pub fn is_archival(&self) -> bool {
        matches!(self, Department::MedicalRecords)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Waiting,
    InTreatment,
    Observation,
    Admitted,
    Discharged,
}

labelled_enum!(PatientStatus, "patient status", {
    Waiting => "waiting",
    InTreatment => "in_treatment",
    Observation => "observation",
    Admitted => "admitted",
    Discharged => "discharged",
});

impl PatientStatus {
    pub fn is_discharged(&self) -> bool {
        matches!(self, PatientStatus::Discharged)
    }
}

/// Emergency-only urgency classification, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageLevel {
    Minor,
    Stable,
    Urgent,
    Critical,
}

labelled_enum!(TriageLevel, "triage level", {
    Minor => "minor",
    Stable => "stable",
    Urgent => "urgent",
    Critical => "critical",
});

/// Outcome recorded when a patient is discharged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeStatus {
    Recovered,
    Deceased,
}

labelled_enum!(DischargeStatus, "discharge status", {
    Recovered => "recovered",
    Deceased => "deceased",
});
