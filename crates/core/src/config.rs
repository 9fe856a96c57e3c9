//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Nothing in this crate reads process-wide environment variables while handling a request;
//! binaries read the environment and hand the raw values to the pure parsing helpers below,
//! which keeps tests independent of the process environment.

use crate::constants::{
    DEFAULT_EMERGENCY_CAPACITY, DEFAULT_ICU_ADMISSION_FEE, DEFAULT_STERILIZATION_CYCLE_SECS,
    DEFAULT_WARD_ADMISSION_FEE,
};
use crate::{CareError, CareResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    emergency_capacity: usize,
    icu_admission_fee: i64,
    ward_admission_fee: i64,
    sterilization_cycle_secs: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] if the emergency capacity or the sterilization cycle is
    /// zero, or if either admission fee is negative.
    pub fn new(
        data_dir: PathBuf,
        emergency_capacity: usize,
        icu_admission_fee: i64,
        ward_admission_fee: i64,
        sterilization_cycle_secs: u32,
    ) -> CareResult<Self> {
        if emergency_capacity == 0 {
            return Err(CareError::Validation(
                "emergency capacity must be at least 1".into(),
            ));
        }
        if icu_admission_fee < 0 || ward_admission_fee < 0 {
            return Err(CareError::Validation(
                "admission fees cannot be negative".into(),
            ));
        }
        if sterilization_cycle_secs == 0 {
            return Err(CareError::Validation(
                "sterilization cycle must last at least one second".into(),
            ));
        }

        Ok(Self {
            data_dir,
            emergency_capacity,
            icu_admission_fee,
            ward_admission_fee,
            sterilization_cycle_secs,
        })
    }

    /// Configuration with every tunable at its default, storing under `data_dir`.
    pub fn with_defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            emergency_capacity: DEFAULT_EMERGENCY_CAPACITY,
            icu_admission_fee: DEFAULT_ICU_ADMISSION_FEE,
            ward_admission_fee: DEFAULT_WARD_ADMISSION_FEE,
            sterilization_cycle_secs: DEFAULT_STERILIZATION_CYCLE_SECS,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn emergency_capacity(&self) -> usize {
        self.emergency_capacity
    }

    pub fn icu_admission_fee(&self) -> i64 {
        self.icu_admission_fee
    }

    pub fn ward_admission_fee(&self) -> i64 {
        self.ward_admission_fee
    }

    pub fn sterilization_cycle_secs(&self) -> u32 {
        self.sterilization_cycle_secs
    }
}

/// Parse an optional raw environment value, falling back to `default` when it is missing or
/// blank.
///
/// # Errors
///
/// Returns [`CareError::Validation`] naming `name` when the value is present but does not parse.
pub fn parse_env_value<T>(name: &str, value: Option<String>, default: T) -> CareResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| CareError::Validation(format!("{name}='{raw}' is invalid: {e}"))),
    }
}

/// Raw values for every core setting, as read from the environment by a binary.
#[derive(Clone, Debug, Default)]
pub struct CoreEnv {
    pub data_dir: Option<String>,
    pub emergency_capacity: Option<String>,
    pub icu_admission_fee: Option<String>,
    pub ward_admission_fee: Option<String>,
    pub sterilization_cycle_secs: Option<String>,
}

impl CoreEnv {
    /// Read the `WARDFLOW_*` core variables from the process environment.
    pub fn from_process_env() -> Self {
        Self {
            data_dir: std::env::var("WARDFLOW_DATA_DIR").ok(),
            emergency_capacity: std::env::var("WARDFLOW_EMERGENCY_CAPACITY").ok(),
            icu_admission_fee: std::env::var("WARDFLOW_ICU_FEE").ok(),
            ward_admission_fee: std::env::var("WARDFLOW_WARD_FEE").ok(),
            sterilization_cycle_secs: std::env::var("WARDFLOW_STERILIZATION_CYCLE_SECS").ok(),
        }
    }

    /// Resolve the raw values into a validated [`CoreConfig`].
    pub fn resolve(self) -> CareResult<CoreConfig> {
        let data_dir = parse_env_value::<PathBuf>(
            "WARDFLOW_DATA_DIR",
            self.data_dir,
            PathBuf::from(crate::constants::DEFAULT_DATA_DIR),
        )?;

        CoreConfig::new(
            data_dir,
            parse_env_value(
                "WARDFLOW_EMERGENCY_CAPACITY",
                self.emergency_capacity,
                DEFAULT_EMERGENCY_CAPACITY,
            )?,
            parse_env_value(
                "WARDFLOW_ICU_FEE",
                self.icu_admission_fee,
                DEFAULT_ICU_ADMISSION_FEE,
            )?,
            parse_env_value(
                "WARDFLOW_WARD_FEE",
                self.ward_admission_fee,
                DEFAULT_WARD_ADMISSION_FEE,
            )?,
            parse_env_value(
                "WARDFLOW_STERILIZATION_CYCLE_SECS",
                self.sterilization_cycle_secs,
                DEFAULT_STERILIZATION_CYCLE_SECS,
            )?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let cfg = CoreEnv::default().resolve().unwrap();

        assert_eq!(cfg.data_dir(), Path::new("ward_data"));
        assert_eq!(cfg.emergency_capacity(), DEFAULT_EMERGENCY_CAPACITY);
        assert_eq!(cfg.icu_admission_fee(), DEFAULT_ICU_ADMISSION_FEE);
        assert_eq!(cfg.ward_admission_fee(), DEFAULT_WARD_ADMISSION_FEE);
        assert_eq!(cfg.sterilization_cycle_secs(), DEFAULT_STERILIZATION_CYCLE_SECS);
    }

    #[test]
    fn blank_values_are_treated_as_missing() {
        let value = parse_env_value("X", Some("   ".into()), 7usize).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let env = CoreEnv {
            emergency_capacity: Some("lots".into()),
            ..CoreEnv::default()
        };
        let err = env.resolve().unwrap_err();
        assert!(err.to_string().contains("WARDFLOW_EMERGENCY_CAPACITY"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = CoreConfig::new(PathBuf::from("x"), 0, 1, 1, 1);
        assert!(matches!(result, Err(CareError::Validation(_))));
    }

    #[test]
    fn negative_fee_is_rejected() {
        let result = CoreConfig::new(PathBuf::from("x"), 5, -1, 1, 1);
        assert!(matches!(result, Err(CareError::Validation(_))));
    }
}
