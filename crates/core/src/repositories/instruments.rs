//! Instrument sterilization pipeline.
//!
//! Instrument sets move strictly forward through four stages:
//!
//! ```text
//! Cleaning -> Packaging -> Sterilizing -> Storage
//! ```
//!
//! Progress through the Sterilizing stage is a pure function of wall-clock time,
//! `(now - cycle_start) / cycle_duration`, rather than a counter advanced by a timer. Whoever
//! samples it (REST poll, CLI, sweep tick) gets the same value for the same `now`, and a
//! process that was suspended or restarted picks up exactly where the clock says it is.

use crate::constants::INSTRUMENTS_KEY;
use crate::repositories::store::{load_collection, save_collection, SnapshotStore};
use crate::{CareError, CareResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wardflow_types::{Department, NonEmptyText};
use wardflow_uuid::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SterilizationStage {
    Cleaning,
    Packaging,
    Sterilizing,
    Storage,
}

impl SterilizationStage {
    /// The following stage, or `None` at Storage.
    pub fn next(self) -> Option<Self> {
        match self {
            SterilizationStage::Cleaning => Some(SterilizationStage::Packaging),
            SterilizationStage::Packaging => Some(SterilizationStage::Sterilizing),
            SterilizationStage::Sterilizing => Some(SterilizationStage::Storage),
            SterilizationStage::Storage => None,
        }
    }
}

impl fmt::Display for SterilizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SterilizationStage::Cleaning => "cleaning",
            SterilizationStage::Packaging => "packaging",
            SterilizationStage::Sterilizing => "sterilizing",
            SterilizationStage::Storage => "storage",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSet {
    pub id: RecordId,
    pub name: NonEmptyText,
    /// Owning unit.
    pub department: Department,
    pub stage: SterilizationStage,
    /// Stamped on entering Sterilizing.
    #[serde(default)]
    pub cycle_start: Option<DateTime<Utc>>,
    pub cycle_duration_secs: u32,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl InstrumentSet {
    /// Percentage of the sterilization cycle elapsed at `now`, clamped to `[0, 100]`.
    ///
    /// Defined only while the set is Sterilizing; `None` in every other stage.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.stage != SterilizationStage::Sterilizing {
            return None;
        }
        let start = self.cycle_start?;
        let elapsed_ms = (now - start).num_milliseconds() as f64;
        let duration_ms = f64::from(self.cycle_duration_secs) * 1_000.0;
        if duration_ms <= 0.0 {
            return Some(100.0);
        }
        Some((100.0 * elapsed_ms / duration_ms).clamp(0.0, 100.0))
    }

    /// True once a Sterilizing set has run for its full cycle.
    pub fn is_cycle_complete(&self, now: DateTime<Utc>) -> bool {
        match (self.stage, self.cycle_start) {
            (SterilizationStage::Sterilizing, Some(start)) => {
                (now - start).num_milliseconds() >= i64::from(self.cycle_duration_secs) * 1_000
            }
            _ => false,
        }
    }

    /// Seconds left in the cycle, or `None` outside Sterilizing.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.stage != SterilizationStage::Sterilizing {
            return None;
        }
        let start = self.cycle_start?;
        let elapsed = (now - start).num_seconds();
        Some((i64::from(self.cycle_duration_secs) - elapsed).max(0))
    }

    fn enter(&mut self, stage: SterilizationStage, now: DateTime<Utc>) {
        self.stage = stage;
        match stage {
            SterilizationStage::Sterilizing => self.cycle_start = Some(now),
            SterilizationStage::Storage => self.completed_at = Some(now),
            _ => {}
        }
    }
}

/// Outcome of [`SterilizationPipeline::advance`].
#[derive(Debug, Clone)]
pub struct StageAdvance {
    pub set: InstrumentSet,
    pub from: SterilizationStage,
    pub to: SterilizationStage,
}

impl StageAdvance {
    /// False when the set was already in Storage and nothing changed.
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

pub struct SterilizationPipeline {
    store: Arc<dyn SnapshotStore>,
    sets: Vec<InstrumentSet>,
    default_cycle_secs: u32,
}

impl SterilizationPipeline {
    /// Loads instrument sets from the store, seeding `seed()` when none exist yet.
    pub fn load(
        store: Arc<dyn SnapshotStore>,
        default_cycle_secs: u32,
        seed: impl FnOnce() -> Vec<InstrumentSet>,
    ) -> CareResult<Self> {
        let sets = match load_collection::<InstrumentSet>(store.as_ref(), INSTRUMENTS_KEY)? {
            Some(sets) => sets,
            None => {
                let sets = seed();
                tracing::info!("seeding sterilization pipeline with {} sets", sets.len());
                save_collection(store.as_ref(), INSTRUMENTS_KEY, &sets)?;
                sets
            }
        };

        Ok(Self {
            store,
            sets,
            default_cycle_secs,
        })
    }

    /// Creates a new set at the Cleaning stage.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] for a blank name or a zero-length cycle.
    pub fn request(
        &mut self,
        name: &str,
        department: Department,
        cycle_duration_secs: Option<u32>,
        now: DateTime<Utc>,
    ) -> CareResult<InstrumentSet> {
        let name = NonEmptyText::new(name)?;
        let cycle_duration_secs = cycle_duration_secs.unwrap_or(self.default_cycle_secs);
        if cycle_duration_secs == 0 {
            return Err(CareError::Validation(
                "sterilization cycle must last at least one second".into(),
            ));
        }

        let set = InstrumentSet {
            id: RecordId::new(),
            name,
            department,
            stage: SterilizationStage::Cleaning,
            cycle_start: None,
            cycle_duration_secs,
            requested_at: now,
            completed_at: None,
        };
        let mut sets = self.sets.clone();
        sets.push(set.clone());
        self.replace(sets)?;

        tracing::info!("instrument set {} '{}' requested", set.id, set.name);
        Ok(set)
    }

    /// Moves a set exactly one stage forward. A set already in Storage is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::NotFound`] for an unknown id.
    pub fn advance(&mut self, set_id: RecordId, now: DateTime<Utc>) -> CareResult<StageAdvance> {
        let mut sets = self.sets.clone();
        let set = sets
            .iter_mut()
            .find(|s| s.id == set_id)
            .ok_or_else(|| CareError::not_found("instrument set", set_id))?;

        let from = set.stage;
        let Some(to) = from.next() else {
            return Ok(StageAdvance {
                set: set.clone(),
                from,
                to: from,
            });
        };

        set.enter(to, now);
        let advanced = StageAdvance {
            set: set.clone(),
            from,
            to,
        };
        self.replace(sets)?;

        tracing::info!("instrument set {} moved {} -> {}", set_id, from, to);
        Ok(advanced)
    }

    /// Moves every Sterilizing set whose cycle has elapsed into Storage and returns them.
    ///
    /// A set is returned by exactly one sweep: once in Storage it no longer matches.
    pub fn sweep_complete(&mut self, now: DateTime<Utc>) -> CareResult<Vec<InstrumentSet>> {
        let mut sets = self.sets.clone();
        let mut completed = Vec::new();
        for set in sets.iter_mut().filter(|s| s.is_cycle_complete(now)) {
            set.enter(SterilizationStage::Storage, now);
            completed.push(set.clone());
        }

        if !completed.is_empty() {
            self.replace(sets)?;
            tracing::info!("sterilization sweep completed {} sets", completed.len());
        }
        Ok(completed)
    }

    pub fn get(&self, set_id: RecordId) -> Option<&InstrumentSet> {
        self.sets.iter().find(|s| s.id == set_id)
    }

    pub fn list(&self) -> &[InstrumentSet] {
        &self.sets
    }

    /// Every set not yet in Storage.
    pub fn pending(&self) -> Vec<InstrumentSet> {
        self.sets
            .iter()
            .filter(|s| s.stage != SterilizationStage::Storage)
            .cloned()
            .collect()
    }

    fn replace(&mut self, sets: Vec<InstrumentSet>) -> CareResult<()> {
        save_collection(self.store.as_ref(), INSTRUMENTS_KEY, &sets)?;
        self.sets = sets;
        Ok(())
    }
}
