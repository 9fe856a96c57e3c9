//! Finite, exclusively occupied capacity per care unit.
//!
//! ICU beds and ward rooms are *hard* slots: each holds at most one active patient, and a
//! patient holds at most one slot. Emergency intake is a *soft* pool: occupancy is counted
//! against an advisory capacity but never refused, because emergency arrivals cannot be turned
//! away.
//!
//! The allocator holds no durable state of its own. Occupancy is derived from the persisted
//! patient list by [`ResourceAllocator::rebuild`] on load and then kept in step by the
//! registry.

use crate::constants::{ICU_BED_COUNT, WARD_FLOOR_COUNT, WARD_ROOMS_PER_FLOOR};
use crate::patient::Patient;
use crate::{CareError, CareResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use wardflow_types::Department;
use wardflow_uuid::RecordId;

/// An addressable, exclusively occupiable unit of physical capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    IcuBed { bed: u8 },
    WardRoom { floor: u8, room: u8 },
}

impl Slot {
    /// Validated ICU bed slot.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] unless `1 <= bed <= ICU_BED_COUNT`.
    pub fn icu_bed(bed: u8) -> CareResult<Self> {
        if !(1..=ICU_BED_COUNT).contains(&bed) {
            return Err(CareError::Validation(format!(
                "ICU bed must be between 1 and {ICU_BED_COUNT}, got {bed}"
            )));
        }
        Ok(Slot::IcuBed { bed })
    }

    /// Validated ward room slot.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] when the floor or room lies outside the ward grid.
    pub fn ward_room(floor: u8, room: u8) -> CareResult<Self> {
        if !(1..=WARD_FLOOR_COUNT).contains(&floor) {
            return Err(CareError::Validation(format!(
                "ward floor must be between 1 and {WARD_FLOOR_COUNT}, got {floor}"
            )));
        }
        if !(1..=WARD_ROOMS_PER_FLOOR).contains(&room) {
            return Err(CareError::Validation(format!(
                "ward room must be between 1 and {WARD_ROOMS_PER_FLOOR}, got {room}"
            )));
        }
        Ok(Slot::WardRoom { floor, room })
    }

    /// Re-checks bounds on a slot that came from outside (deserialized input).
    pub fn validate(self) -> CareResult<Self> {
        match self {
            Slot::IcuBed { bed } => Slot::icu_bed(bed),
            Slot::WardRoom { floor, room } => Slot::ward_room(floor, room),
        }
    }

    pub fn department(&self) -> Department {
        match self {
            Slot::IcuBed { .. } => Department::Icu,
            Slot::WardRoom { .. } => Department::Wards,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::IcuBed { bed } => write!(f, "ICU bed {bed}"),
            Slot::WardRoom { floor, room } => write!(f, "ward floor {floor} room {room}"),
        }
    }
}

/// Result of recording an emergency intake against the advisory capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmergencyOccupancy {
    pub count: usize,
    pub capacity: usize,
}

impl EmergencyOccupancy {
    pub fn over_capacity(&self) -> bool {
        self.count > self.capacity
    }
}

#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    icu: BTreeMap<u8, RecordId>,
    wards: BTreeMap<(u8, u8), RecordId>,
    emergency: BTreeSet<RecordId>,
    emergency_capacity: usize,
}

impl ResourceAllocator {
    pub fn new(emergency_capacity: usize) -> Self {
        Self {
            icu: BTreeMap::new(),
            wards: BTreeMap::new(),
            emergency: BTreeSet::new(),
            emergency_capacity,
        }
    }

    /// Rebuilds occupancy from a persisted patient list.
    ///
    /// Discharged patients never occupy anything. If two active patients claim the same slot,
    /// the first one in list order keeps it and the ids of the losers are returned so the
    /// caller can clear their dangling slot references.
    pub fn rebuild(patients: &[Patient], emergency_capacity: usize) -> (Self, Vec<RecordId>) {
        let mut allocator = Self::new(emergency_capacity);
        let mut evicted = Vec::new();

        for patient in patients.iter().filter(|p| p.is_active()) {
            if patient.department == Department::Emergency {
                allocator.emergency.insert(patient.id);
            }

            let Some(slot) = patient.slot else { continue };
            let valid = slot.validate().is_ok();
            if !valid || allocator.acquire(slot, patient.id).is_err() {
                tracing::warn!(
                    "dropping slot reference {} held by patient {} while rebuilding occupancy",
                    slot,
                    patient.id
                );
                evicted.push(patient.id);
            }
        }

        (allocator, evicted)
    }

    /// Claims `slot` for `patient_id`.
    ///
    /// Re-acquiring a slot the patient already holds succeeds without change.
    ///
    /// # Errors
    ///
    /// - [`CareError::Validation`] if the slot lies outside the department's grid.
    /// - [`CareError::Conflict`] if a different patient holds the slot. The holder is untouched.
    pub fn acquire(&mut self, slot: Slot, patient_id: RecordId) -> CareResult<()> {
        let slot = slot.validate()?;

        if let Some(occupant) = self.occupant(slot) {
            if occupant == patient_id {
                return Ok(());
            }
            return Err(CareError::Conflict { slot, occupant });
        }

        match slot {
            Slot::IcuBed { bed } => {
                self.icu.insert(bed, patient_id);
            }
            Slot::WardRoom { floor, room } => {
                self.wards.insert((floor, room), patient_id);
            }
        }
        Ok(())
    }

    /// Clears occupancy unconditionally and returns the previous occupant, if any.
    pub fn release(&mut self, slot: Slot) -> Option<RecordId> {
        match slot {
            Slot::IcuBed { bed } => self.icu.remove(&bed),
            Slot::WardRoom { floor, room } => self.wards.remove(&(floor, room)),
        }
    }

    pub fn occupant(&self, slot: Slot) -> Option<RecordId> {
        match slot {
            Slot::IcuBed { bed } => self.icu.get(&bed).copied(),
            Slot::WardRoom { floor, room } => self.wards.get(&(floor, room)).copied(),
        }
    }

    /// First unoccupied slot of `department` in scan order, or `None` at capacity.
    ///
    /// ICU beds are scanned `1..=12`; ward rooms floor-major over the 20×10 grid. Departments
    /// without hard slots always return `None`.
    pub fn find_free(&self, department: Department) -> Option<Slot> {
        match department {
            Department::Icu => (1..=ICU_BED_COUNT)
                .find(|bed| !self.icu.contains_key(bed))
                .map(|bed| Slot::IcuBed { bed }),
            Department::Wards => (1..=WARD_FLOOR_COUNT)
                .flat_map(|floor| (1..=WARD_ROOMS_PER_FLOOR).map(move |room| (floor, room)))
                .find(|key| !self.wards.contains_key(key))
                .map(|(floor, room)| Slot::WardRoom { floor, room }),
            _ => None,
        }
    }

    /// Records a patient entering emergency intake. Never refused.
    pub fn enter_emergency(&mut self, patient_id: RecordId) -> EmergencyOccupancy {
        self.emergency.insert(patient_id);
        let occupancy = self.emergency_occupancy();
        if occupancy.over_capacity() {
            tracing::warn!(
                "emergency intake at {} exceeds advisory capacity {}",
                occupancy.count,
                occupancy.capacity
            );
        }
        occupancy
    }

    pub fn leave_emergency(&mut self, patient_id: RecordId) {
        self.emergency.remove(&patient_id);
    }

    pub fn emergency_occupancy(&self) -> EmergencyOccupancy {
        EmergencyOccupancy {
            count: self.emergency.len(),
            capacity: self.emergency_capacity,
        }
    }

    pub fn occupied_count(&self, department: Department) -> usize {
        match department {
            Department::Icu => self.icu.len(),
            Department::Wards => self.wards.len(),
            Department::Emergency => self.emergency.len(),
            Department::Outpatient | Department::MedicalRecords => 0,
        }
    }

    /// Capacity of `department`; advisory for emergency, `None` where unbounded.
    pub fn capacity(&self, department: Department) -> Option<usize> {
        match department {
            Department::Icu => Some(ICU_BED_COUNT as usize),
            Department::Wards => Some(WARD_FLOOR_COUNT as usize * WARD_ROOMS_PER_FLOOR as usize),
            Department::Emergency => Some(self.emergency_capacity),
            Department::Outpatient | Department::MedicalRecords => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_bounds_are_enforced() {
        assert!(Slot::icu_bed(0).is_err());
        assert!(Slot::icu_bed(13).is_err());
        assert!(Slot::icu_bed(12).is_ok());
        assert!(Slot::ward_room(21, 1).is_err());
        assert!(Slot::ward_room(1, 11).is_err());
        assert!(Slot::ward_room(20, 10).is_ok());
    }

    #[test]
    fn acquire_conflicts_on_a_different_occupant() {
        let mut allocator = ResourceAllocator::new(50);
        let x = RecordId::new();
        let y = RecordId::new();
        let bed = Slot::icu_bed(5).unwrap();

        allocator.acquire(bed, x).unwrap();
        let err = allocator.acquire(bed, y).unwrap_err();

        assert!(matches!(err, CareError::Conflict { occupant, .. } if occupant == x));
        assert_eq!(allocator.occupant(bed), Some(x));
    }

    #[test]
    fn reacquire_by_same_patient_is_idempotent() {
        let mut allocator = ResourceAllocator::new(50);
        let x = RecordId::new();
        let room = Slot::ward_room(3, 7).unwrap();

        allocator.acquire(room, x).unwrap();
        allocator.acquire(room, x).unwrap();

        assert_eq!(allocator.occupied_count(Department::Wards), 1);
    }

    #[test]
    fn acquire_rejects_out_of_range_slot() {
        let mut allocator = ResourceAllocator::new(50);
        let err = allocator
            .acquire(Slot::IcuBed { bed: 40 }, RecordId::new())
            .unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
    }

    #[test]
    fn release_is_safe_on_free_slot() {
        let mut allocator = ResourceAllocator::new(50);
        let bed = Slot::icu_bed(2).unwrap();
        assert_eq!(allocator.release(bed), None);

        let x = RecordId::new();
        allocator.acquire(bed, x).unwrap();
        assert_eq!(allocator.release(bed), Some(x));
        assert_eq!(allocator.occupant(bed), None);
    }

    #[test]
    fn find_free_scans_in_order_and_reports_capacity() {
        let mut allocator = ResourceAllocator::new(50);
        assert_eq!(allocator.find_free(Department::Icu), Some(Slot::IcuBed { bed: 1 }));

        allocator.acquire(Slot::IcuBed { bed: 1 }, RecordId::new()).unwrap();
        assert_eq!(allocator.find_free(Department::Icu), Some(Slot::IcuBed { bed: 2 }));

        for bed in 2..=ICU_BED_COUNT {
            allocator.acquire(Slot::IcuBed { bed }, RecordId::new()).unwrap();
        }
        assert_eq!(allocator.find_free(Department::Icu), None);
    }

    #[test]
    fn find_free_wards_moves_to_next_floor() {
        let mut allocator = ResourceAllocator::new(50);
        for room in 1..=WARD_ROOMS_PER_FLOOR {
            allocator
                .acquire(Slot::WardRoom { floor: 1, room }, RecordId::new())
                .unwrap();
        }
        assert_eq!(
            allocator.find_free(Department::Wards),
            Some(Slot::WardRoom { floor: 2, room: 1 })
        );
        assert_eq!(allocator.find_free(Department::Emergency), None);
    }

    #[test]
    fn emergency_capacity_is_advisory() {
        let mut allocator = ResourceAllocator::new(2);
        allocator.enter_emergency(RecordId::new());
        allocator.enter_emergency(RecordId::new());
        let third = allocator.enter_emergency(RecordId::new());

        assert_eq!(third.count, 3);
        assert!(third.over_capacity());
        assert_eq!(allocator.occupied_count(Department::Emergency), 3);
    }
}
