//! Starter data written into an empty store on first run.

use crate::allocator::Slot;
use crate::ledger::{Ledger, RecordKind};
use crate::patient::Patient;
use crate::repositories::doctors::Doctor;
use crate::repositories::instruments::{InstrumentSet, SterilizationStage};
use crate::CareResult;
use chrono::{DateTime, NaiveDate, Utc};
use wardflow_types::{Department, NonEmptyText, PatientStatus, TriageLevel};
use wardflow_uuid::RecordId;

const DOCTORS: &[(&str, &str, Department)] = &[
    ("Dr Amara Okafor", "Emergency medicine", Department::Emergency),
    ("Dr Tomasz Nowak", "Intensive care", Department::Icu),
    ("Dr Priya Raman", "General medicine", Department::Wards),
    ("Dr Lena Fischer", "Family medicine", Department::Outpatient),
];

const INSTRUMENT_SETS: &[(&str, Department)] = &[
    ("Laparotomy tray", Department::Wards),
    ("Airway kit", Department::Emergency),
    ("Central line set", Department::Icu),
];

pub fn doctors() -> CareResult<Vec<Doctor>> {
    DOCTORS
        .iter()
        .map(|&(name, specialty, department)| -> CareResult<Doctor> {
            Ok(Doctor {
                id: RecordId::new(),
                name: NonEmptyText::new(name)?,
                specialty: NonEmptyText::new(specialty)?,
                department,
                referral_count: 0,
                notes: Vec::new(),
            })
        })
        .collect()
}

/// One patient per active department, with attending doctors drawn from `doctors` by
/// department when available.
pub fn patients(
    doctors: &[Doctor],
    icu_admission_fee: i64,
    ward_admission_fee: i64,
    now: DateTime<Utc>,
) -> CareResult<Vec<Patient>> {
    let doctor_for = |department: Department| {
        doctors
            .iter()
            .find(|d| d.department == department)
            .map(|d| d.id)
    };

    let base = |name: &str, dob: (i32, u32, u32), department: Department| -> CareResult<Patient> {
        let date_of_birth = NaiveDate::from_ymd_opt(dob.0, dob.1, dob.2).ok_or_else(|| {
            crate::CareError::Validation(format!("bad seed birth date for {name}"))
        })?;
        Ok(Patient {
            id: RecordId::new(),
            name: NonEmptyText::new(name)?,
            date_of_birth,
            department,
            status: PatientStatus::Waiting,
            triage_level: None,
            slot: None,
            attending_doctor_id: doctor_for(department),
            discharge_status: None,
            financial_records: Ledger::new(),
            registered_at: now,
            updated_at: now,
            discharged_at: None,
        })
    };

    let mut icu = base("Samuel Adeyemi", (1958, 2, 11), Department::Icu)?;
    icu.status = PatientStatus::Admitted;
    let icu_bed = Slot::IcuBed { bed: 1 };
    icu.slot = Some(icu_bed);
    if icu_admission_fee > 0 {
        icu.financial_records.append(
            RecordKind::Admission,
            NonEmptyText::new(format!("{} admission ({icu_bed})", Department::Icu))?,
            icu_admission_fee,
            now,
        )?;
    }

    let mut emergency = base("Mei Lin", (1991, 9, 23), Department::Emergency)?;
    emergency.triage_level = Some(TriageLevel::Critical);

    let mut ward = base("Jonas Berg", (1975, 5, 2), Department::Wards)?;
    ward.status = PatientStatus::Admitted;
    let ward_room = Slot::WardRoom { floor: 1, room: 1 };
    ward.slot = Some(ward_room);
    if ward_admission_fee > 0 {
        ward.financial_records.append(
            RecordKind::Admission,
            NonEmptyText::new(format!("{} admission ({ward_room})", Department::Wards))?,
            ward_admission_fee,
            now,
        )?;
    }

    let outpatient = base("Rosa Delgado", (2002, 12, 30), Department::Outpatient)?;

    Ok(vec![icu, emergency, ward, outpatient])
}

/// A few sets already spread across the early stages.
pub fn instrument_sets(
    cycle_duration_secs: u32,
    now: DateTime<Utc>,
) -> CareResult<Vec<InstrumentSet>> {
    INSTRUMENT_SETS
        .iter()
        .zip([
            SterilizationStage::Cleaning,
            SterilizationStage::Packaging,
            SterilizationStage::Cleaning,
        ])
        .map(|(&(name, department), stage)| -> CareResult<InstrumentSet> {
            Ok(InstrumentSet {
                id: RecordId::new(),
                name: NonEmptyText::new(name)?,
                department,
                stage,
                cycle_start: None,
                cycle_duration_secs,
                requested_at: now,
                completed_at: None,
            })
        })
        .collect()
}
