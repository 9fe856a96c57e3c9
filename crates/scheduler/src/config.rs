//! Orchestrator timing and decision-source configuration.

use std::time::Duration;
use wardflow_core::config::parse_env_value;
use wardflow_core::{CareError, CareResult};

pub const DEFAULT_DECISION_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    decision_interval: Duration,
    sweep_interval: Duration,
    oracle_timeout: Duration,
    oracle_url: Option<String>,
}

impl SchedulerConfig {
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] if any duration is zero.
    pub fn new(
        decision_interval: Duration,
        sweep_interval: Duration,
        oracle_timeout: Duration,
        oracle_url: Option<String>,
    ) -> CareResult<Self> {
        for (name, value) in [
            ("decision interval", decision_interval),
            ("sweep interval", sweep_interval),
            ("oracle timeout", oracle_timeout),
        ] {
            if value.is_zero() {
                return Err(CareError::Validation(format!("{name} must be non-zero")));
            }
        }

        Ok(Self {
            decision_interval,
            sweep_interval,
            oracle_timeout,
            oracle_url,
        })
    }

    pub fn decision_interval(&self) -> Duration {
        self.decision_interval
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn oracle_timeout(&self) -> Duration {
        self.oracle_timeout
    }

    /// `None` selects the built-in rule-based oracle.
    pub fn oracle_url(&self) -> Option<&str> {
        self.oracle_url.as_deref()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            decision_interval: Duration::from_secs(DEFAULT_DECISION_INTERVAL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            oracle_url: None,
        }
    }
}

/// Raw scheduler settings as read from the environment.
#[derive(Clone, Debug, Default)]
pub struct SchedulerEnv {
    pub decision_interval_secs: Option<String>,
    pub sweep_interval_secs: Option<String>,
    pub oracle_timeout_secs: Option<String>,
    pub oracle_url: Option<String>,
}

impl SchedulerEnv {
    pub fn from_process_env() -> Self {
        Self {
            decision_interval_secs: std::env::var("WARDFLOW_DECISION_INTERVAL_SECS").ok(),
            sweep_interval_secs: std::env::var("WARDFLOW_SWEEP_INTERVAL_SECS").ok(),
            oracle_timeout_secs: std::env::var("WARDFLOW_ORACLE_TIMEOUT_SECS").ok(),
            oracle_url: std::env::var("WARDFLOW_ORACLE_URL").ok(),
        }
    }

    pub fn resolve(self) -> CareResult<SchedulerConfig> {
        let secs = |name: &str, value: Option<String>, default: u64| {
            parse_env_value::<u64>(name, value, default).map(Duration::from_secs)
        };

        SchedulerConfig::new(
            secs(
                "WARDFLOW_DECISION_INTERVAL_SECS",
                self.decision_interval_secs,
                DEFAULT_DECISION_INTERVAL_SECS,
            )?,
            secs(
                "WARDFLOW_SWEEP_INTERVAL_SECS",
                self.sweep_interval_secs,
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?,
            secs(
                "WARDFLOW_ORACLE_TIMEOUT_SECS",
                self.oracle_timeout_secs,
                DEFAULT_ORACLE_TIMEOUT_SECS,
            )?,
            self.oracle_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        )
    }
}
