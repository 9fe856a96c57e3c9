use crate::allocator::Slot;
use wardflow_uuid::RecordId;

/// Coarse classification of [`CareError`], used by callers that only need to know how to
/// react (skip the action, answer 409, retry the write).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or missing transition input. No state change.
    Validation,
    /// A slot is held by a different active patient. Prior occupant untouched.
    Conflict,
    /// Unknown or archived reference. The action is skipped.
    NotFound,
    /// Durable store failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{slot} is occupied by patient {occupant}")]
    Conflict { slot: Slot, occupant: RecordId },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("patient {0} has already been discharged")]
    AlreadyDischarged(RecordId),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write snapshot '{key}': {source}")]
    FileWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read snapshot '{key}': {source}")]
    FileRead {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize snapshot '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to deserialize snapshot '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CareError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CareError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CareError::Validation(_) => ErrorCategory::Validation,
            CareError::Conflict { .. } => ErrorCategory::Conflict,
            CareError::NotFound { .. } | CareError::AlreadyDischarged(_) => {
                ErrorCategory::NotFound
            }
            CareError::StorageDirCreation(_)
            | CareError::FileWrite { .. }
            | CareError::FileRead { .. }
            | CareError::Serialization { .. }
            | CareError::Deserialization { .. } => ErrorCategory::Storage,
        }
    }
}

impl From<wardflow_types::TextError> for CareError {
    fn from(e: wardflow_types::TextError) -> Self {
        CareError::Validation(e.to_string())
    }
}

impl From<wardflow_types::VocabularyError> for CareError {
    fn from(e: wardflow_types::VocabularyError) -> Self {
        CareError::Validation(e.to_string())
    }
}

impl From<wardflow_uuid::UuidError> for CareError {
    fn from(e: wardflow_uuid::UuidError) -> Self {
        CareError::Validation(e.to_string())
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;
