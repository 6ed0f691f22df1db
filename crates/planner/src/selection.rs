//! Plant selection store: which catalog plants the user picked, and how many.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::db::{Db, SELECTION_KEY};
use crate::plant::{Plant, SelectedPlant};
use crate::watering::WateringLevel;

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout: explicit (id, plant) pairs rather than a JSON object, so
/// integer keys survive untouched.
#[derive(Serialize, Deserialize)]
struct SelectionDocument {
    version: u32,
    entries: Vec<(i64, SelectedPlant)>,
}

pub struct SelectionStore {
    plants: BTreeMap<i64, SelectedPlant>,
    db: Db,
}

impl SelectionStore {
    /// Load the persisted selection. A missing or unreadable document yields
    /// an empty store; the app must still start.
    pub async fn load(db: Db) -> Self {
        let plants = match db.load_json::<SelectionDocument>(SELECTION_KEY).await {
            Ok(Some(doc)) => doc.entries.into_iter().collect(),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("selection: ignoring persisted state: {e:#}");
                BTreeMap::new()
            }
        };
        Self { plants, db }
    }

    // ----------------------------
    // Mutations
    // ----------------------------

    /// Add `plant` with quantity 1. Selecting an already selected plant does
    /// not bump its quantity. Returns whether the plant was newly added.
    pub async fn select(&mut self, plant: Plant) -> bool {
        if self.plants.contains_key(&plant.id) {
            return false;
        }
        debug!(plant_id = plant.id, name = %plant.common_name, "selection: select");
        self.plants.insert(
            plant.id,
            SelectedPlant::new(plant, OffsetDateTime::now_utc()),
        );
        self.persist().await;
        true
    }

    pub async fn deselect(&mut self, plant_id: i64) -> bool {
        if self.plants.remove(&plant_id).is_none() {
            return false;
        }
        debug!(plant_id, "selection: deselect");
        self.persist().await;
        true
    }

    /// Set the quantity of a selected plant, clamped to at least 1. Absent
    /// plants are left alone. Returns the stored quantity, if present.
    ///
    /// Removal on a decrement to zero is the caller's decision; this never
    /// deselects.
    pub async fn set_quantity(&mut self, plant_id: i64, quantity: i64) -> Option<u32> {
        let entry = self.plants.get_mut(&plant_id)?;
        let clamped = quantity.clamp(1, i64::from(u32::MAX)) as u32;
        entry.quantity = clamped;
        debug!(plant_id, quantity = clamped, "selection: set quantity");
        self.persist().await;
        Some(clamped)
    }

    pub async fn clear(&mut self) {
        self.plants.clear();
        debug!("selection: clear");
        self.persist().await;
    }

    // ----------------------------
    // Queries
    // ----------------------------

    pub fn get(&self, plant_id: i64) -> Option<&SelectedPlant> {
        self.plants.get(&plant_id)
    }

    /// All selected plants, oldest selection first.
    pub fn to_vec(&self) -> Vec<SelectedPlant> {
        let mut v: Vec<SelectedPlant> = self.plants.values().cloned().collect();
        v.sort_by(|a, b| a.selected_at.cmp(&b.selected_at).then(a.id().cmp(&b.id())));
        v
    }

    pub fn by_level(&self, level: WateringLevel) -> Vec<SelectedPlant> {
        self.to_vec()
            .into_iter()
            .filter(|p| p.watering_level() == level)
            .collect()
    }

    /// Sum of quantities, not the number of distinct plants.
    pub fn total_quantity(&self) -> u64 {
        self.plants.values().map(|p| u64::from(p.quantity)).sum()
    }

    /// Number of distinct species selected.
    pub fn unique_count(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    // ----------------------------
    // Persistence
    // ----------------------------

    /// Best-effort write; a failed save is logged and the in-memory state
    /// stays authoritative.
    async fn persist(&self) {
        let doc = SelectionDocument {
            version: DOCUMENT_VERSION,
            entries: self
                .plants
                .iter()
                .map(|(id, p)| (*id, p.clone()))
                .collect(),
        };
        if let Err(e) = self.db.save_json(SELECTION_KEY, &doc).await {
            error!("selection: persist failed: {e:#}");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_db;
    use crate::plant::tests::plant;

    async fn empty_store() -> SelectionStore {
        SelectionStore::load(memory_db().await).await
    }

    // -- select / deselect ------------------------------------------------

    #[tokio::test]
    async fn select_inserts_with_quantity_one() {
        let mut store = empty_store().await;
        assert!(store.select(plant(1, "Aloe", "Minimum")).await);
        assert_eq!(store.get(1).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn reselect_does_not_bump_quantity() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        store.set_quantity(1, 4).await;
        assert!(!store.select(plant(1, "Aloe", "Minimum")).await);
        assert_eq!(store.get(1).unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn deselect_absent_is_noop() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        assert!(!store.deselect(99).await);
        assert_eq!(store.unique_count(), 1);
    }

    #[tokio::test]
    async fn select_deselect_sequence_keeps_net_selection() {
        let mut store = empty_store().await;
        let ops: &[(bool, i64)] = &[
            (true, 1),
            (true, 2),
            (true, 3),
            (false, 2),
            (true, 2),
            (false, 1),
            (false, 1),
            (true, 4),
            (false, 3),
        ];
        for &(select, id) in ops {
            if select {
                store.select(plant(id, &format!("p{id}"), "Average")).await;
            } else {
                store.deselect(id).await;
            }
        }
        let ids: Vec<i64> = store.to_vec().iter().map(|p| p.id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, vec![2, 4]);
        assert!(store.to_vec().iter().all(|p| p.quantity >= 1));
    }

    // -- set_quantity -----------------------------------------------------

    #[tokio::test]
    async fn set_quantity_clamps_to_one() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        assert_eq!(store.set_quantity(1, 0).await, Some(1));
        assert_eq!(store.set_quantity(1, -5).await, Some(1));
        assert_eq!(store.get(1).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn set_quantity_stores_positive_value() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        assert_eq!(store.set_quantity(1, 12).await, Some(12));
        assert_eq!(store.get(1).unwrap().quantity, 12);
    }

    #[tokio::test]
    async fn set_quantity_on_absent_plant_changes_nothing() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        assert_eq!(store.set_quantity(2, 5).await, None);
        assert_eq!(store.unique_count(), 1);
        assert!(store.get(2).is_none());
    }

    // -- derived queries --------------------------------------------------

    #[tokio::test]
    async fn totals_sum_quantities_and_count_species() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        store.select(plant(2, "Fern", "Frequent")).await;
        store.set_quantity(2, 3).await;
        assert_eq!(store.total_quantity(), 4);
        assert_eq!(store.unique_count(), 2);
    }

    #[tokio::test]
    async fn by_level_uses_normalized_watering() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "low")).await;
        store.select(plant(2, "Fern", "keep moist")).await;
        store.select(plant(3, "Agave", "Minimum")).await;
        let low: Vec<i64> = store
            .by_level(WateringLevel::Minimum)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(low.len(), 2);
        assert!(low.contains(&1) && low.contains(&3));
        assert!(store.by_level(WateringLevel::None).is_empty());
    }

    #[tokio::test]
    async fn clear_empties_selection() {
        let mut store = empty_store().await;
        store.select(plant(1, "Aloe", "Minimum")).await;
        store.clear().await;
        assert!(store.is_empty());
        assert_eq!(store.total_quantity(), 0);
    }

    // -- persistence ------------------------------------------------------

    #[tokio::test]
    async fn reload_restores_selection() {
        let db = memory_db().await;
        {
            let mut store = SelectionStore::load(db.clone()).await;
            store.select(plant(5, "Rosemary", "Minimum")).await;
            store.select(plant(6, "Mint", "Frequent")).await;
            store.set_quantity(6, 3).await;
            store.deselect(5).await;
        }
        let store = SelectionStore::load(db).await;
        assert_eq!(store.unique_count(), 1);
        assert_eq!(store.get(6).unwrap().quantity, 3);
        assert_eq!(store.get(6).unwrap().plant.common_name, "Mint");
    }

    #[tokio::test]
    async fn persisted_layout_is_ordered_pairs() {
        let db = memory_db().await;
        let mut store = SelectionStore::load(db.clone()).await;
        store.select(plant(42, "Thyme", "Minimum")).await;

        let raw: serde_json::Value = db.load_json(SELECTION_KEY).await.unwrap().unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"][0][0], 42);
        assert_eq!(raw["entries"][0][1]["common_name"], "Thyme");
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty() {
        let db = memory_db().await;
        db.save_document(SELECTION_KEY, "{broken").await.unwrap();
        let store = SelectionStore::load(db).await;
        assert!(store.is_empty());
    }
}
