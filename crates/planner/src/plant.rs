use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::watering::{self, WateringLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlantCycle {
    #[default]
    Perennial,
    Annual,
    Biennial,
    Biannual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantImage {
    #[serde(default)]
    pub license: i64,
    #[serde(default)]
    pub license_name: String,
    #[serde(default)]
    pub license_url: String,
    pub original_url: String,
    pub regular_url: String,
    pub medium_url: String,
    pub small_url: String,
    pub thumbnail: String,
}

impl PlantImage {
    /// Image set where every size points at the same URL.
    pub fn single(url: &str) -> Self {
        Self {
            license: 0,
            license_name: String::new(),
            license_url: String::new(),
            original_url: url.to_string(),
            regular_url: url.to_string(),
            medium_url: url.to_string(),
            small_url: url.to_string(),
            thumbnail: url.to_string(),
        }
    }
}

/// A catalog record. Read-only to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: i64,
    pub common_name: String,
    #[serde(default)]
    pub scientific_name: Vec<String>,
    #[serde(default)]
    pub other_name: Option<Vec<String>>,
    #[serde(default)]
    pub cycle: PlantCycle,
    /// Raw descriptor as delivered by the catalog; see [`Plant::watering_level`].
    #[serde(default)]
    pub watering: Option<String>,
    #[serde(default)]
    pub sunlight: Vec<String>,
    #[serde(default)]
    pub default_image: Option<PlantImage>,
    /// Botanical family, kept for client-side type filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

impl Plant {
    pub fn watering_level(&self) -> WateringLevel {
        watering::normalize(self.watering.as_deref())
    }

    pub fn primary_scientific_name(&self) -> &str {
        self.scientific_name.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPlant {
    #[serde(flatten)]
    pub plant: Plant,
    /// Always >= 1.
    pub quantity: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub selected_at: OffsetDateTime,
}

impl SelectedPlant {
    pub fn new(plant: Plant, selected_at: OffsetDateTime) -> Self {
        Self {
            plant,
            quantity: 1,
            selected_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.plant.id
    }

    pub fn watering_level(&self) -> WateringLevel {
        self.plant.watering_level()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::macros::datetime;

    /// Minimal plant fixture used across the crate's tests.
    pub(crate) fn plant(id: i64, name: &str, watering: &str) -> Plant {
        Plant {
            id,
            common_name: name.to_string(),
            scientific_name: vec![format!("{name} sp.")],
            other_name: None,
            cycle: PlantCycle::Perennial,
            watering: Some(watering.to_string()),
            sunlight: vec!["full_sun".to_string()],
            default_image: None,
            family: None,
        }
    }

    #[test]
    fn selected_plant_starts_at_quantity_one() {
        let sp = SelectedPlant::new(plant(1, "Aloe", "Minimum"), OffsetDateTime::now_utc());
        assert_eq!(sp.quantity, 1);
        assert_eq!(sp.id(), 1);
        assert_eq!(sp.watering_level(), WateringLevel::Minimum);
    }

    #[test]
    fn selected_plant_serializes_flat_with_rfc3339_timestamp() {
        let sp = SelectedPlant {
            plant: plant(7, "Sage", "Average"),
            quantity: 2,
            selected_at: datetime!(2024-03-01 12:00:00 UTC),
        };
        let json = serde_json::to_value(&sp).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["common_name"], "Sage");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["selected_at"], "2024-03-01T12:00:00Z");
        assert!(json.get("family").is_none());
    }

    #[test]
    fn plant_deserializes_with_missing_optionals() {
        let json = r#"{"id":3,"common_name":"Date Palm"}"#;
        let p: Plant = serde_json::from_str(json).unwrap();
        assert_eq!(p.cycle, PlantCycle::Perennial);
        assert!(p.watering.is_none());
        assert_eq!(p.watering_level(), WateringLevel::Average);
        assert_eq!(p.primary_scientific_name(), "");
    }
}
