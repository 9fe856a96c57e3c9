//! Input validation utilities.
//!
//! These checks run before any state is touched, so a rejected input never leaves a partial
//! change behind.

use crate::{CareError, CareResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Validates that a snapshot key is safe to use as a file stem.
///
/// Keys become `<data_dir>/<key>.json`, so they are restricted to a conservative ASCII set:
/// - Rejects empty strings
/// - Bounds the length
/// - Allows only lowercase alphanumerics and `_`
///
/// # Errors
///
/// Returns a `CareError::Validation` if the key is invalid.
pub fn validate_store_key(key: &str) -> CareResult<()> {
    const MAX_KEY_LEN: usize = 64;

    if key.is_empty() {
        return Err(CareError::Validation("store key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(CareError::Validation(format!(
            "store key exceeds maximum length of {} characters",
            MAX_KEY_LEN
        )));
    }

    let ok = key
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'_'));

    if !ok {
        return Err(CareError::Validation(format!(
            "store key '{key}' contains invalid characters (only a-z, 0-9 and '_' allowed)"
        )));
    }

    Ok(())
}

/// Validates a date of birth against the current instant.
///
/// # Errors
///
/// Returns a `CareError::Validation` for dates in the future or implausibly far in the past.
pub fn validate_date_of_birth(date_of_birth: NaiveDate, now: DateTime<Utc>) -> CareResult<()> {
    const MAX_AGE_YEARS: i32 = 130;

    let today = now.date_naive();
    if date_of_birth > today {
        return Err(CareError::Validation(format!(
            "date of birth {date_of_birth} is in the future"
        )));
    }

    let oldest = today
        .with_year(today.year() - MAX_AGE_YEARS)
        .unwrap_or(NaiveDate::MIN);
    if date_of_birth < oldest {
        return Err(CareError::Validation(format!(
            "date of birth {date_of_birth} is more than {MAX_AGE_YEARS} years ago"
        )));
    }

    Ok(())
}
