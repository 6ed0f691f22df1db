//! Derived views over the selection and zone snapshots. Everything here is a
//! pure function of its inputs and is recomputed on every read.

use serde::Serialize;

use crate::plant::SelectedPlant;
use crate::watering::{GroupInfo, WateringLevel};
use crate::zones::IrrigationZone;

#[derive(Debug, Clone, Serialize)]
pub struct PlantGroup {
    #[serde(flatten)]
    pub info: GroupInfo,
    pub plants: Vec<SelectedPlant>,
    /// Sum of quantities across the group's plants.
    pub total_quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneWithPlants {
    #[serde(flatten)]
    pub zone: IrrigationZone,
    pub group: GroupInfo,
    pub plants: Vec<SelectedPlant>,
}

impl ZoneWithPlants {
    pub fn total_quantity(&self) -> u64 {
        self.plants.iter().map(|p| u64::from(p.quantity)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignmentProgress {
    pub assigned: usize,
    pub active: usize,
}

/// Everything the zone-configuration view needs in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GroupingReport {
    pub groups: Vec<PlantGroup>,
    pub active_groups: Vec<WateringLevel>,
    pub unassigned_groups: Vec<WateringLevel>,
    pub progress: AssignmentProgress,
    pub can_proceed: bool,
}

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// Partition plants into all four buckets (in `WateringLevel::ALL` order).
/// Empty buckets are kept.
pub fn group_by_level(plants: &[SelectedPlant]) -> Vec<PlantGroup> {
    WateringLevel::ALL
        .iter()
        .map(|&level| {
            let members: Vec<SelectedPlant> = plants
                .iter()
                .filter(|p| p.watering_level() == level)
                .cloned()
                .collect();
            PlantGroup {
                info: level.info(),
                total_quantity: members.iter().map(|p| u64::from(p.quantity)).sum(),
                plants: members,
            }
        })
        .collect()
}

/// Levels with at least one selected plant.
pub fn active_groups(plants: &[SelectedPlant]) -> Vec<WateringLevel> {
    WateringLevel::ALL
        .into_iter()
        .filter(|&level| plants.iter().any(|p| p.watering_level() == level))
        .collect()
}

fn is_assigned(level: WateringLevel, zones: &[IrrigationZone]) -> bool {
    zones.iter().any(|z| z.assigned_group == Some(level))
}

/// Active levels that no zone carries yet.
pub fn unassigned_groups(plants: &[SelectedPlant], zones: &[IrrigationZone]) -> Vec<WateringLevel> {
    active_groups(plants)
        .into_iter()
        .filter(|&level| !is_assigned(level, zones))
        .collect()
}

/// True iff every active level has a zone. With nothing selected this is
/// vacuously true.
pub fn can_proceed(plants: &[SelectedPlant], zones: &[IrrigationZone]) -> bool {
    active_groups(plants)
        .into_iter()
        .all(|level| is_assigned(level, zones))
}

pub fn assignment_progress(plants: &[SelectedPlant], zones: &[IrrigationZone]) -> AssignmentProgress {
    let active = active_groups(plants);
    let assigned = active.iter().filter(|&&l| is_assigned(l, zones)).count();
    AssignmentProgress {
        assigned,
        active: active.len(),
    }
}

/// Join assigned zones (creation order) with the plants of their level.
/// Unassigned zones are skipped; levels without a zone do not appear.
pub fn zones_with_plants(plants: &[SelectedPlant], zones: &[IrrigationZone]) -> Vec<ZoneWithPlants> {
    zones
        .iter()
        .filter_map(|zone| {
            let level = zone.assigned_group?;
            Some(ZoneWithPlants {
                zone: zone.clone(),
                group: level.info(),
                plants: plants
                    .iter()
                    .filter(|p| p.watering_level() == level)
                    .cloned()
                    .collect(),
            })
        })
        .collect()
}

pub fn report(plants: &[SelectedPlant], zones: &[IrrigationZone]) -> GroupingReport {
    GroupingReport {
        groups: group_by_level(plants),
        active_groups: active_groups(plants),
        unassigned_groups: unassigned_groups(plants, zones),
        progress: assignment_progress(plants, zones),
        can_proceed: can_proceed(plants, zones),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
