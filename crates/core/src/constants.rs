//! Constants used throughout the WardFlow core crate.
//!
//! Slot geometry, default tariffs and snapshot keys live here so that the registry, the
//! allocator and the binaries agree on them.

/// Number of addressable ICU beds (numbered `1..=ICU_BED_COUNT`).
pub const ICU_BED_COUNT: u8 = 12;

/// Number of ward floors (numbered `1..=WARD_FLOOR_COUNT`).
pub const WARD_FLOOR_COUNT: u8 = 20;

/// Rooms per ward floor (numbered `1..=WARD_ROOMS_PER_FLOOR`).
pub const WARD_ROOMS_PER_FLOOR: u8 = 10;

/// Advisory emergency intake capacity when none is configured.
pub const DEFAULT_EMERGENCY_CAPACITY: usize = 50;

/// Fee appended to the ledger on admission to an ICU bed, in currency units.
pub const DEFAULT_ICU_ADMISSION_FEE: i64 = 5_000;

/// Fee appended to the ledger on admission to a ward room, in currency units.
pub const DEFAULT_WARD_ADMISSION_FEE: i64 = 2_000;

/// Length of a sterilization cycle when the caller does not ask for one.
pub const DEFAULT_STERILIZATION_CYCLE_SECS: u32 = 1_200;

/// Default directory for snapshot storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "ward_data";

/// Snapshot key for the patient collection.
pub const PATIENTS_KEY: &str = "patients";

/// Snapshot key for the instrument-set collection.
pub const INSTRUMENTS_KEY: &str = "instruments";

/// Snapshot key for the service-request collection.
pub const SERVICE_REQUESTS_KEY: &str = "service_requests";

/// Snapshot key for the doctor directory.
pub const DOCTORS_KEY: &str = "doctors";

/// File extension used by [`crate::JsonFileStore`].
pub const SNAPSHOT_FILE_EXTENSION: &str = "json";
