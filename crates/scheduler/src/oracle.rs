//! Decision sources.
//!
//! A [`DecisionOracle`] looks at a [`WorldSnapshot`] and proposes an ordered batch of
//! [`Action`]s. It is treated as opaque: the orchestrator never trusts a proposal, it
//! re-validates each one when applying it.

use crate::OracleResult;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use wardflow_core::constants::DEFAULT_EMERGENCY_CAPACITY;
use wardflow_core::{
    Action, Department, RecordId, ResourceAllocator, Slot, TriageLevel, WorldSnapshot,
};

/// Decision future type alias.
pub type DecisionFut<'a> = Pin<Box<dyn Future<Output = OracleResult<Vec<Action>>> + Send + 'a>>;

pub trait DecisionOracle: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide<'a>(&'a self, snapshot: &'a WorldSnapshot) -> DecisionFut<'a>;
}

/// Deterministic triage policy.
///
/// Critical emergency patients are proposed for the first free ICU bed, urgent ones for the
/// first free ward room. Patients are considered most severe first, then by registration
/// time. Each patient and each slot appears in at most one proposal per batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedOracle;

impl RuleBasedOracle {
    pub fn propose(snapshot: &WorldSnapshot) -> Vec<Action> {
        let capacity = snapshot
            .census(Department::Emergency)
            .and_then(|c| c.capacity)
            .unwrap_or(DEFAULT_EMERGENCY_CAPACITY);
        let (mut allocator, _) = ResourceAllocator::rebuild(&snapshot.patients, capacity);

        let mut candidates: Vec<_> = snapshot
            .active_patients()
            .filter(|p| p.department == Department::Emergency)
            .filter_map(|p| p.triage_level.map(|t| (t, p)))
            .filter(|(t, _)| *t >= TriageLevel::Urgent)
            .collect();
        candidates.sort_by(|(ta, a), (tb, b)| {
            tb.cmp(ta).then(a.registered_at.cmp(&b.registered_at))
        });

        let mut proposed: HashSet<RecordId> = HashSet::new();
        let mut actions = Vec::new();
        for (triage, patient) in candidates {
            if !proposed.insert(patient.id) {
                continue;
            }
            let target = match triage {
                TriageLevel::Critical => Department::Icu,
                _ => Department::Wards,
            };
            let Some(slot) = allocator.find_free(target) else {
                tracing::debug!("no free slot in {} for patient {}", target, patient.id);
                continue;
            };
            if allocator.acquire(slot, patient.id).is_err() {
                continue;
            }

            let details = Some(format!("{triage} triage in emergency"));
            actions.push(match slot {
                Slot::IcuBed { bed } => Action::TransferToIcu {
                    patient_id: patient.id,
                    bed,
                    details,
                },
                Slot::WardRoom { floor, room } => Action::TransferToWard {
                    patient_id: patient.id,
                    floor,
                    room,
                    details,
                },
            });
        }
        actions
    }
}

impl DecisionOracle for RuleBasedOracle {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    fn decide<'a>(&'a self, snapshot: &'a WorldSnapshot) -> DecisionFut<'a> {
        Box::pin(async move { Ok(Self::propose(snapshot)) })
    }
}
