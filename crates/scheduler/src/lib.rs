//! # WardFlow Scheduler
//!
//! The decision loop that drives a [`wardflow_core::Hospital`] on its own:
//! - [`Orchestrator`]: periodic decision and sterilization-sweep ticks
//! - [`DecisionOracle`]: pluggable source of proposed actions
//! - [`RuleBasedOracle`]: deterministic triage policy
//! - [`HttpOracle`]: external decision service over HTTP

mod config;
mod error;
mod http;
mod oracle;
mod orchestrator;

pub use config::{
    SchedulerConfig, SchedulerEnv, DEFAULT_DECISION_INTERVAL_SECS, DEFAULT_ORACLE_TIMEOUT_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
pub use error::{OracleError, OracleResult};
pub use http::HttpOracle;
pub use oracle::{DecisionFut, DecisionOracle, RuleBasedOracle};
pub use orchestrator::{Orchestrator, RunState, TickOutcome, TickReport};
