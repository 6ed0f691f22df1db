//! Irrigation zone store: user-defined zones and the watering group each one
//! carries.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::{Db, ZONES_KEY};
use crate::watering::WateringLevel;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationZone {
    pub id: String,
    pub name: String,
    /// Controller station number. Not unique, not range-checked.
    pub zone_number: i64,
    pub assigned_group: Option<WateringLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update; `None` fields are left untouched. An empty `notes`
/// string clears the notes.
#[derive(Debug, Default, Deserialize)]
pub struct ZoneUpdate {
    pub name: Option<String>,
    pub zone_number: Option<i64>,
    pub notes: Option<String>,
}

impl ZoneUpdate {
    /// Apply the creation rule to a renamed zone: the name is trimmed and
    /// must not be blank.
    pub fn validated(mut self) -> Result<Self, ZoneInputError> {
        if let Some(name) = self.name.take() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ZoneInputError::EmptyName);
            }
            self.name = Some(name.to_string());
        }
        Ok(self)
    }
}

#[derive(Serialize, Deserialize)]
struct ZoneDocument {
    version: u32,
    zones: Vec<IrrigationZone>,
}

// ---------------------------------------------------------------------------
// Input validation (zone creation form)
// ---------------------------------------------------------------------------

/// Zone number as submitted: a JSON number or the raw text of a form field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ZoneNumberInput {
    Number(i64),
    Text(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneInputError {
    #[error("zone name is required")]
    EmptyName,
    #[error("zone number must be numeric, got '{0}'")]
    InvalidNumber(String),
}

/// Check a new-zone submission: non-empty name and a numeric zone number.
/// Returns the trimmed name and parsed number.
pub fn validate_new_zone(
    name: &str,
    number: &ZoneNumberInput,
) -> Result<(String, i64), ZoneInputError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ZoneInputError::EmptyName);
    }
    let number = match number {
        ZoneNumberInput::Number(n) => *n,
        ZoneNumberInput::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ZoneInputError::InvalidNumber(s.clone()))?,
    };
    Ok((name.to_string(), number))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct ZoneStore {
    zones: Vec<IrrigationZone>,
    db: Db,
}

impl ZoneStore {
    pub async fn load(db: Db) -> Self {
        let zones = match db.load_json::<ZoneDocument>(ZONES_KEY).await {
            Ok(Some(doc)) => doc.zones,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("zones: ignoring persisted state: {e:#}");
                Vec::new()
            }
        };
        Self { zones, db }
    }

    /// Create an unassigned zone. Duplicate names and numbers are allowed.
    pub async fn add_zone(&mut self, name: &str, zone_number: i64) -> IrrigationZone {
        let zone = IrrigationZone {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            zone_number,
            assigned_group: None,
            notes: None,
        };
        debug!(zone_id = %zone.id, name, zone_number, "zones: add");
        self.zones.push(zone.clone());
        self.persist().await;
        zone
    }

    pub async fn update_zone(&mut self, id: &str, update: ZoneUpdate) -> Option<IrrigationZone> {
        let zone = self.zones.iter_mut().find(|z| z.id == id)?;
        if let Some(name) = update.name {
            zone.name = name;
        }
        if let Some(n) = update.zone_number {
            zone.zone_number = n;
        }
        if let Some(notes) = update.notes {
            zone.notes = if notes.is_empty() { None } else { Some(notes) };
        }
        let updated = zone.clone();
        debug!(zone_id = %id, "zones: update");
        self.persist().await;
        Some(updated)
    }

    /// Remove a zone. Whatever group it held simply becomes unassigned.
    pub async fn delete_zone(&mut self, id: &str) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != id);
        if self.zones.len() == before {
            return false;
        }
        debug!(zone_id = %id, "zones: delete");
        self.persist().await;
        true
    }

    /// Assign `level` (or nothing) to a zone.
    ///
    /// A level is held by at most one zone: assigning it here first takes it
    /// away from any other zone, and both changes land in a single write.
    /// Unknown zone ids change nothing.
    pub async fn assign_group(&mut self, zone_id: &str, level: Option<WateringLevel>) -> bool {
        if !self.zones.iter().any(|z| z.id == zone_id) {
            return false;
        }
        for zone in &mut self.zones {
            if zone.id == zone_id {
                zone.assigned_group = level;
            } else if level.is_some() && zone.assigned_group == level {
                debug!(zone_id = %zone.id, ?level, "zones: releasing group from previous zone");
                zone.assigned_group = None;
            }
        }
        debug!(zone_id, ?level, "zones: assign group");
        self.persist().await;
        true
    }

    pub async fn clear(&mut self) {
        self.zones.clear();
        debug!("zones: clear");
        self.persist().await;
    }

    // ----------------------------
    // Queries
    // ----------------------------

    /// Zones in creation order.
    pub fn zones(&self) -> &[IrrigationZone] {
        &self.zones
    }

    pub fn get(&self, id: &str) -> Option<&IrrigationZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zone_for(&self, level: WateringLevel) -> Option<&IrrigationZone> {
        self.zones.iter().find(|z| z.assigned_group == Some(level))
    }

    /// Levels currently held by some zone, in zone order.
    pub fn assigned_levels(&self) -> Vec<WateringLevel> {
        self.zones.iter().filter_map(|z| z.assigned_group).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    async fn persist(&self) {
        let doc = ZoneDocument {
            version: DOCUMENT_VERSION,
            zones: self.zones.clone(),
        };
        if let Err(e) = self.db.save_json(ZONES_KEY, &doc).await {
            error!("zones: persist failed: {e:#}");
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

    async fn empty_store() -> ZoneStore {
        ZoneStore::load(memory_db().await).await
    }

    // -- validation -------------------------------------------------------

    #[test]
    fn validate_accepts_number_and_numeric_text() {
        assert_eq!(
            validate_new_zone("Front", &ZoneNumberInput::Number(3)),
            Ok(("Front".to_string(), 3))
        );
        assert_eq!(
            validate_new_zone("  Back ", &ZoneNumberInput::Text(" 12 ".into())),
            Ok(("Back".to_string(), 12))
        );
    }

    #[test]
    fn validate_rejects_blank_name() {
        assert_eq!(
            validate_new_zone("   ", &ZoneNumberInput::Number(1)),
            Err(ZoneInputError::EmptyName)
        );
    }

    #[test]
    fn validate_rejects_non_numeric_number() {
        assert_eq!(
            validate_new_zone("Front", &ZoneNumberInput::Text("".into())),
            Err(ZoneInputError::InvalidNumber("".into()))
        );
        assert!(validate_new_zone("Front", &ZoneNumberInput::Text("one".into())).is_err());
    }

    #[test]
    fn update_rejects_blank_name_and_trims() {
        let blank = ZoneUpdate {
            name: Some("  ".into()),
            ..ZoneUpdate::default()
        };
        assert_eq!(blank.validated().unwrap_err(), ZoneInputError::EmptyName);

        let padded = ZoneUpdate {
            name: Some(" Side Bed ".into()),
            zone_number: Some(2),
            ..ZoneUpdate::default()
        }
        .validated()
        .unwrap();
        assert_eq!(padded.name.as_deref(), Some("Side Bed"));
        assert_eq!(padded.zone_number, Some(2));

        assert!(ZoneUpdate::default().validated().unwrap().name.is_none());
    }

    #[test]
    fn zone_number_input_deserializes_both_forms() {
        let n: ZoneNumberInput = serde_json::from_str("4").unwrap();
        assert!(matches!(n, ZoneNumberInput::Number(4)));
        let t: ZoneNumberInput = serde_json::from_str("\"4\"").unwrap();
        assert!(matches!(t, ZoneNumberInput::Text(ref s) if s == "4"));
    }

    // -- add / update / delete --------------------------------------------

    #[tokio::test]
    async fn add_zone_generates_unique_ids_and_allows_duplicates() {
        let mut store = empty_store().await;
        let a = store.add_zone("Front", 1).await;
        let b = store.add_zone("Front", 1).await;
        assert_ne!(a.id, b.id);
        assert_eq!(store.zones().len(), 2);
        assert!(a.assigned_group.is_none());
    }

    #[tokio::test]
    async fn zones_keep_creation_order() {
        let mut store = empty_store().await;
        store.add_zone("C", 3).await;
        store.add_zone("A", 1).await;
        store.add_zone("B", 2).await;
        let names: Vec<&str> = store.zones().iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn update_zone_patches_fields() {
        let mut store = empty_store().await;
        let z = store.add_zone("Front", 1).await;
        let updated = store
            .update_zone(
                &z.id,
                ZoneUpdate {
                    name: Some("Front Bed".into()),
                    zone_number: None,
                    notes: Some("drip line".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Front Bed");
        assert_eq!(updated.zone_number, 1);
        assert_eq!(updated.notes.as_deref(), Some("drip line"));

        let cleared = store
            .update_zone(
                &z.id,
                ZoneUpdate {
                    notes: Some(String::new()),
                    ..ZoneUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.notes.is_none());
    }

    #[tokio::test]
    async fn update_unknown_zone_is_none() {
        let mut store = empty_store().await;
        assert!(store.update_zone("nope", ZoneUpdate::default()).await.is_none());
    }

    #[tokio::test]
    async fn delete_zone_releases_its_group() {
        let mut store = empty_store().await;
        let z = store.add_zone("Front", 1).await;
        store.assign_group(&z.id, Some(WateringLevel::Minimum)).await;
        assert!(store.delete_zone(&z.id).await);
        assert!(store.zone_for(WateringLevel::Minimum).is_none());
        assert!(!store.delete_zone(&z.id).await);
    }

    // -- assign_group -----------------------------------------------------

    #[tokio::test]
    async fn assign_and_unassign() {
        let mut store = empty_store().await;
        let z = store.add_zone("Front", 1).await;
        assert!(store.assign_group(&z.id, Some(WateringLevel::Average)).await);
        assert_eq!(store.get(&z.id).unwrap().assigned_group, Some(WateringLevel::Average));
        assert!(store.assign_group(&z.id, None).await);
        assert_eq!(store.get(&z.id).unwrap().assigned_group, None);
    }

    #[tokio::test]
    async fn reassigning_level_moves_it_between_zones() {
        let mut store = empty_store().await;
        let a = store.add_zone("Front", 1).await;
        let b = store.add_zone("Back", 2).await;
        store.assign_group(&a.id, Some(WateringLevel::Frequent)).await;
        store.assign_group(&b.id, Some(WateringLevel::Frequent)).await;

        assert_eq!(store.get(&a.id).unwrap().assigned_group, None);
        assert_eq!(store.get(&b.id).unwrap().assigned_group, Some(WateringLevel::Frequent));
        let holders = store
            .zones()
            .iter()
            .filter(|z| z.assigned_group == Some(WateringLevel::Frequent))
            .count();
        assert_eq!(holders, 1);
    }

    #[tokio::test]
    async fn assigning_other_level_leaves_existing_assignments() {
        let mut store = empty_store().await;
        let a = store.add_zone("Front", 1).await;
        let b = store.add_zone("Back", 2).await;
        store.assign_group(&a.id, Some(WateringLevel::Minimum)).await;
        store.assign_group(&b.id, Some(WateringLevel::Frequent)).await;
        assert_eq!(store.get(&a.id).unwrap().assigned_group, Some(WateringLevel::Minimum));
    }

    #[tokio::test]
    async fn assigned_levels_follow_zone_order() {
        let mut store = empty_store().await;
        let a = store.add_zone("Front", 1).await;
        let b = store.add_zone("Back", 2).await;
        store.add_zone("Side", 3).await;
        assert!(store.assigned_levels().is_empty());

        store.assign_group(&b.id, Some(WateringLevel::Minimum)).await;
        store.assign_group(&a.id, Some(WateringLevel::Frequent)).await;
        assert_eq!(
            store.assigned_levels(),
            vec![WateringLevel::Frequent, WateringLevel::Minimum]
        );

        store.assign_group(&a.id, Some(WateringLevel::Minimum)).await;
        assert_eq!(store.assigned_levels(), vec![WateringLevel::Minimum]);
    }

    #[tokio::test]
    async fn assign_to_unknown_zone_changes_nothing() {
        let mut store = empty_store().await;
        let a = store.add_zone("Front", 1).await;
        store.assign_group(&a.id, Some(WateringLevel::Minimum)).await;
        assert!(!store.assign_group("missing", Some(WateringLevel::Minimum)).await);
        assert_eq!(store.get(&a.id).unwrap().assigned_group, Some(WateringLevel::Minimum));
    }

    #[tokio::test]
    async fn clear_removes_all_zones() {
        let mut store = empty_store().await;
        store.add_zone("Front", 1).await;
        store.clear().await;
        assert!(store.is_empty());
    }

    // -- persistence ------------------------------------------------------

    #[tokio::test]
    async fn reload_restores_zones_and_assignments() {
        let db = memory_db().await;
        let id = {
            let mut store = ZoneStore::load(db.clone()).await;
            let z = store.add_zone("Front", 1).await;
            store.add_zone("Back", 2).await;
            store.assign_group(&z.id, Some(WateringLevel::None)).await;
            z.id
        };
        let store = ZoneStore::load(db).await;
        assert_eq!(store.zones().len(), 2);
        assert_eq!(store.zones()[0].id, id);
        assert_eq!(store.zones()[0].assigned_group, Some(WateringLevel::None));
    }
}
