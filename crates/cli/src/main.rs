use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use wardflow_core::{
    CoreEnv, Department, DischargeStatus, Hospital, NewPatient, Patient, RecordId, RecordKind,
    ReferralOutcome, TriageLevel,
};

#[derive(Parser)]
#[command(name = "wardflow")]
#[command(about = "WardFlow patient flow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Show one patient with their ledger
    Show {
        patient_id: RecordId,
    },
    /// Register a new patient
    Register {
        name: String,
        /// Date of birth (YYYY-MM-DD)
        date_of_birth: NaiveDate,
        /// emergency or outpatient (default)
        #[arg(long)]
        department: Option<Department>,
        #[arg(long)]
        triage: Option<TriageLevel>,
        /// Referring doctor id
        #[arg(long)]
        doctor: Option<RecordId>,
    },
    /// Admit a patient to emergency
    Admit {
        patient_id: RecordId,
        #[arg(long)]
        triage: Option<TriageLevel>,
    },
    /// Transfer a patient to an ICU bed (1-12)
    TransferIcu {
        patient_id: RecordId,
        bed: u8,
    },
    /// Transfer a patient to a ward room
    TransferWard {
        patient_id: RecordId,
        /// Floor (1-20)
        floor: u8,
        /// Room (1-10)
        room: u8,
    },
    /// Discharge a patient (recovered or deceased)
    Discharge {
        patient_id: RecordId,
        status: DischargeStatus,
    },
    /// Append a charge or payment to a patient's ledger
    Charge {
        patient_id: RecordId,
        kind: RecordKind,
        /// Positive for charges, negative for payments
        #[arg(allow_hyphen_values = true)]
        amount: i64,
        description: String,
    },
    /// Print a patient's balance
    Balance {
        patient_id: RecordId,
    },
    /// Per-department occupancy
    Census,
    /// List instrument sets with sterilization progress
    Instruments,
    /// Request a new instrument set
    RequestInstruments {
        name: String,
        department: Department,
        /// Override the configured sterilization cycle
        #[arg(long)]
        cycle_secs: Option<u32>,
    },
    /// Move an instrument set one stage forward
    AdvanceInstruments {
        set_id: RecordId,
    },
    /// Move every finished sterilization cycle into storage
    Sweep,
    /// List doctors
    Doctors,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("wardflow_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'wardflow --help' for commands");
        return Ok(());
    };

    let now = Utc::now();
    let cfg = CoreEnv::from_process_env().resolve()?;
    let mut hospital = Hospital::open(cfg, now)?;

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = run(command, &mut hospital, now, &mut stdout) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run(
    command: Commands,
    hospital: &mut Hospital,
    now: DateTime<Utc>,
    out: &mut dyn Write,
) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::List => {
            let patients = hospital.registry().list();
            if patients.is_empty() {
                writeln!(out, "No patients found.")?;
            }
            for patient in patients {
                write_patient_line(out, patient)?;
            }
        }
        Commands::Show { patient_id } => {
            let patient = hospital.registry().require(patient_id)?;
            write_patient_line(out, patient)?;
            writeln!(
                out,
                "  born {} (age {})",
                patient.date_of_birth,
                patient.age_on(now.date_naive())
            )?;
            if let Some(doctor) = patient.attending_doctor_id {
                writeln!(out, "  attending doctor {}", doctor)?;
            }
            for record in patient.financial_records.records() {
                writeln!(
                    out,
                    "  {} {:>14} {:>8}  {}",
                    record.recorded_at.format("%Y-%m-%d %H:%M"),
                    format!("{:?}", record.kind),
                    record.amount,
                    record.description
                )?;
            }
            writeln!(out, "  balance {}", patient.balance())?;
        }
        Commands::Register {
            name,
            date_of_birth,
            department,
            triage,
            doctor,
        } => {
            let registration = hospital.register(
                NewPatient {
                    name,
                    date_of_birth,
                    department,
                    triage_level: triage,
                    referring_doctor_id: doctor,
                },
                now,
            )?;
            writeln!(
                out,
                "Registered {} with ID: {}",
                registration.patient.name, registration.patient.id
            )?;
            if let Some(emergency) = registration.emergency.filter(|e| e.over_capacity()) {
                writeln!(
                    out,
                    "Warning: emergency at {} of {} places",
                    emergency.count, emergency.capacity
                )?;
            }
            if let ReferralOutcome::Failed { doctor_id, reason } = registration.referral {
                writeln!(
                    out,
                    "Warning: referral to doctor {} not recorded: {}",
                    doctor_id, reason
                )?;
            }
        }
        Commands::Admit { patient_id, triage } => {
            let admission = hospital.admit_to_emergency(patient_id, triage, now)?;
            writeln!(out, "Admitted {} to emergency", admission.patient.name)?;
            if admission.over_capacity() {
                writeln!(
                    out,
                    "Warning: emergency at {} of {} places",
                    admission.count, admission.capacity
                )?;
            }
        }
        Commands::TransferIcu { patient_id, bed } => {
            let transfer = hospital.transfer_to_icu(patient_id, bed, now)?;
            writeln!(out, "{} is in {}", transfer.patient.name, transfer.slot)?;
        }
        Commands::TransferWard {
            patient_id,
            floor,
            room,
        } => {
            let transfer = hospital.transfer_to_ward(patient_id, floor, room, now)?;
            writeln!(out, "{} is in {}", transfer.patient.name, transfer.slot)?;
        }
        Commands::Discharge { patient_id, status } => {
            let discharge = hospital.discharge(patient_id, status, now)?;
            writeln!(out, "Discharged {} ({})", discharge.patient.name, status)?;
        }
        Commands::Charge {
            patient_id,
            kind,
            amount,
            description,
        } => {
            let record = hospital.append_record(patient_id, kind, &description, amount, now)?;
            writeln!(out, "Recorded {} ({})", record.amount, record.id)?;
        }
        Commands::Balance { patient_id } => {
            writeln!(out, "{}", hospital.registry().balance(patient_id)?)?;
        }
        Commands::Census => {
            for census in hospital.registry().census() {
                match census.capacity {
                    Some(capacity) => writeln!(
                        out,
                        "{:<16} {:>4} / {}",
                        census.department, census.count, capacity
                    )?,
                    None => writeln!(out, "{:<16} {:>4}", census.department, census.count)?,
                }
            }
        }
        Commands::Instruments => {
            for set in hospital.sterilization().list() {
                let progress = set
                    .progress(now)
                    .map(|p| format!(" {:.0}%", p))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "ID: {}, {} [{}] {}{}",
                    set.id, set.name, set.department, set.stage, progress
                )?;
            }
        }
        Commands::RequestInstruments {
            name,
            department,
            cycle_secs,
        } => {
            let set = hospital.request_instruments(&name, department, cycle_secs, now)?;
            writeln!(out, "Requested {} with ID: {}", set.name, set.id)?;
        }
        Commands::AdvanceInstruments { set_id } => {
            let advance = hospital.advance_instruments(set_id, now)?;
            if advance.moved() {
                writeln!(out, "{}: {} -> {}", advance.set.name, advance.from, advance.to)?;
            } else {
                writeln!(out, "{} is already in {}", advance.set.name, advance.to)?;
            }
        }
        Commands::Sweep => {
            let completed = hospital.sweep_sterilization(now)?;
            if completed.is_empty() {
                writeln!(out, "No sterilization cycles finished.")?;
            }
            for set in completed {
                writeln!(out, "{} moved to storage", set.name)?;
            }
        }
        Commands::Doctors => {
            for doctor in hospital.doctors() {
                writeln!(
                    out,
                    "ID: {}, {} ({}, {}), referrals: {}",
                    doctor.id,
                    doctor.name,
                    doctor.specialty,
                    doctor.department,
                    doctor.referral_count
                )?;
            }
        }
    }
    Ok(())
}

fn write_patient_line(out: &mut dyn Write, patient: &Patient) -> std::io::Result<()> {
    let location = match patient.slot {
        Some(slot) => slot.to_string(),
        None => patient.department.to_string(),
    };
    writeln!(
        out,
        "ID: {}, Name: {}, Status: {}, Location: {}",
        patient.id, patient.name, patient.status, location
    )
}
