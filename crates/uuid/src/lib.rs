//! Identifier types for WardFlow records.
//!
//! Every patient, doctor, instrument set and service request is keyed by a [`RecordId`]: a v4
//! UUID held in *canonical* form, **32 lowercase hexadecimal characters** with no hyphens.
//!
//! Financial records use a [`TimestampId`] instead, a time-prefixed identifier that sorts in
//! append order within a single patient's ledger.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (CLI arguments, REST path
//! segments, oracle actions). Use [`RecordId::parse`] to validate an input string; uppercase,
//! hyphenated, wrong-length and non-hex values are rejected rather than normalised.

mod service;

pub use service::{RecordId, TimestampId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
