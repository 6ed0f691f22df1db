//! Plan summary and its three renderings: plain text (clipboard), JSON
//! (download) and a print-ready HTML page.

use askama::Template;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::grouping::{zones_with_plants, ZoneWithPlants};
use crate::plant::SelectedPlant;
use crate::zones::IrrigationZone;

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GardenPlan {
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub zones: Vec<ZoneWithPlants>,
}

impl GardenPlan {
    /// Build the summary from current snapshots. Only zones with an assigned
    /// group appear.
    pub fn build(plants: &[SelectedPlant], zones: &[IrrigationZone], now: OffsetDateTime) -> Self {
        Self {
            generated_at: now,
            zones: zones_with_plants(plants, zones),
        }
    }

    pub fn to_export(&self) -> PlanExport {
        PlanExport {
            export_date: self.generated_at,
            zones: self
                .zones
                .iter()
                .map(|z| ZoneExport {
                    name: z.zone.name.clone(),
                    rainbird_zone_number: z.zone.zone_number,
                    watering_schedule: z.group.suggested_frequency.to_string(),
                    watering_level: z.group.label.to_string(),
                    plants: z
                        .plants
                        .iter()
                        .map(|p| PlantExport {
                            id: p.id(),
                            common_name: p.plant.common_name.clone(),
                            scientific_name: p.plant.primary_scientific_name().to_string(),
                            quantity: p.quantity,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_export())
    }

    /// Clipboard rendering: a header, a watering line and indented plants per
    /// zone, zones separated by a blank line.
    pub fn to_text(&self) -> String {
        self.zones
            .iter()
            .map(|z| {
                let mut block = format!(
                    "{} (RainBird Zone #{})\nWatering: {}\nPlants:",
                    z.zone.name, z.zone.zone_number, z.group.suggested_frequency
                );
                for p in &z.plants {
                    let _ = write!(block, "\n  - {} ({})", p.plant.common_name, p.quantity);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Print-ready page, rendered from `templates/print.html`.
    pub fn to_print_html(&self) -> askama::Result<String> {
        let date_fmt = format_description!("[year]-[month]-[day]");
        PrintPage {
            generated: self.generated_at.format(&date_fmt).unwrap_or_default(),
            zones: &self.zones,
        }
        .render()
    }
}

#[derive(Template)]
#[template(path = "print.html")]
struct PrintPage<'a> {
    generated: String,
    zones: &'a [ZoneWithPlants],
}

// ---------------------------------------------------------------------------
// JSON export document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExport {
    #[serde(with = "time::serde::rfc3339")]
    pub export_date: OffsetDateTime,
    pub zones: Vec<ZoneExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneExport {
    pub name: String,
    pub rainbird_zone_number: i64,
    pub watering_schedule: String,
    pub watering_level: String,
    pub plants: Vec<PlantExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantExport {
    pub id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub quantity: u32,
}

// ===========================================================================
// Tests
// ===========================================================================
