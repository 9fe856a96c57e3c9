use std::time::Duration;

/// Failure to obtain a decision batch. Never fatal to the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("decision source did not answer within {0:?}")]
    Timeout(Duration),
    #[error("decision source transport failure: {0}")]
    Transport(String),
    #[error("could not parse decision batch: {0}")]
    Parse(String),
    #[error("decision source unavailable: {0}")]
    Unavailable(String),
}

pub type OracleResult<T> = std::result::Result<T, OracleError>;
