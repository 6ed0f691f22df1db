//! Watering levels: the four canonical buckets every plant is grouped into,
//! plus the normalizer that maps raw catalog descriptors onto them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Canonical levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WateringLevel {
    None,
    Minimum,
    Average,
    Frequent,
}

impl WateringLevel {
    /// All levels in display order (driest first).
    pub const ALL: [WateringLevel; 4] = [
        WateringLevel::None,
        WateringLevel::Minimum,
        WateringLevel::Average,
        WateringLevel::Frequent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WateringLevel::None => "None",
            WateringLevel::Minimum => "Minimum",
            WateringLevel::Average => "Average",
            WateringLevel::Frequent => "Frequent",
        }
    }

    /// Short user-facing label ("Minimal", "Low", ...).
    pub fn label(self) -> &'static str {
        match self {
            WateringLevel::None => "Minimal",
            WateringLevel::Minimum => "Low",
            WateringLevel::Average => "Medium",
            WateringLevel::Frequent => "High",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            WateringLevel::None => "Drought-tolerant, water only during establishment",
            WateringLevel::Minimum => "Water when soil is completely dry",
            WateringLevel::Average => "Regular watering, allow soil to dry between",
            WateringLevel::Frequent => "Keep soil consistently moist",
        }
    }

    /// Watering schedule shown on the summary and in exports.
    pub fn suggested_frequency(self) -> &'static str {
        match self {
            WateringLevel::None => "Once monthly or less",
            WateringLevel::Minimum => "Every 2-3 weeks",
            WateringLevel::Average => "Weekly",
            WateringLevel::Frequent => "2-3 times per week",
        }
    }

    /// Static group metadata, serialisable for the API.
    pub fn info(self) -> GroupInfo {
        GroupInfo {
            level: self,
            label: self.label(),
            description: self.description(),
            suggested_frequency: self.suggested_frequency(),
        }
    }
}

impl fmt::Display for WateringLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    pub level: WateringLevel,
    pub label: &'static str,
    pub description: &'static str,
    pub suggested_frequency: &'static str,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Map a raw watering descriptor onto a canonical level. Total: anything
/// unrecognised (including API placeholder text) lands on `Average`.
pub fn normalize(raw: Option<&str>) -> WateringLevel {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return WateringLevel::Average;
    };
    let s = raw.to_lowercase();

    if s == "none" || (s.contains("minimum") && s.contains("drought")) {
        WateringLevel::None
    } else if s == "minimum" || s.contains("low") {
        WateringLevel::Minimum
    } else if s == "frequent" || s.contains("high") || s.contains("moist") {
        WateringLevel::Frequent
    } else {
        WateringLevel::Average
    }
}

// ===========================================================================
// Tests
// ===========================================================================
