//! TOML config file loading, environment overrides, validation, and seeding
//! of initial irrigation zones.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::catalog::CatalogSettings;
use crate::watering::WateringLevel;
use crate::zones::{ZoneStore, ZoneUpdate};

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    /// Zones created on first start, when no zones are persisted yet.
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub db_url: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_url: "sqlite:garden-planner.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub base_url: String,
    pub token: Option<String>,
    pub cache_ttl_secs: u64,
    pub max_pages: usize,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            base_url: "https://trefle.io/api/v1".to_string(),
            token: None,
            cache_ttl_secs: 300,
            max_pages: 50,
        }
    }
}

impl CatalogSection {
    pub fn settings(&self) -> CatalogSettings {
        CatalogSettings {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            max_pages: self.max_pages,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneEntry {
    pub name: String,
    pub zone_number: i64,
    #[serde(default)]
    pub assigned_group: Option<WateringLevel>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_sections(&mut errors);
        self.validate_zones(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_sections(&self, errors: &mut Vec<String>) {
        if self.server.port == 0 {
            errors.push("server.port must be non-zero".to_string());
        }
        if self.storage.db_url.trim().is_empty() {
            errors.push("storage.db_url is empty".to_string());
        }

        let base = self.catalog.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push(format!(
                "catalog.base_url '{}' must start with http:// or https://",
                self.catalog.base_url
            ));
        }
        if self.catalog.cache_ttl_secs == 0 {
            errors.push("catalog.cache_ttl_secs must be positive".to_string());
        }
        if self.catalog.max_pages == 0 {
            errors.push("catalog.max_pages must be positive".to_string());
        }
    }

    fn validate_zones(&self, errors: &mut Vec<String>) {
        let mut holders: HashMap<WateringLevel, &str> = HashMap::new();

        for (i, z) in self.zones.iter().enumerate() {
            let ctx = || {
                if z.name.trim().is_empty() {
                    format!("zones[{i}]")
                } else {
                    format!("zone '{}'", z.name)
                }
            };

            if z.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            }
            if z.zone_number < 1 {
                errors.push(format!(
                    "{}: zone_number must be at least 1, got {}",
                    ctx(),
                    z.zone_number
                ));
            }

            // A watering group belongs to at most one zone.
            if let Some(level) = z.assigned_group {
                if let Some(prev) = holders.insert(level, z.name.as_str()) {
                    errors.push(format!(
                        "{}: group {level} is already assigned to zone '{prev}'",
                        ctx()
                    ));
                }
            }
        }
    }

    /// Environment variables win over file values.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(port) = env("WEB_PORT").and_then(|s| s.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = env("DB_URL") {
            self.storage.db_url = url;
        }
        if let Some(token) = env("TREFLE_TOKEN") {
            self.catalog.token = Some(token);
        }
        if let Some(url) = env("TREFLE_BASE_URL") {
            self.catalog.base_url = url;
        }
    }
}

// ---------------------------------------------------------------------------
// Load + apply
// ---------------------------------------------------------------------------

/// Read, parse, apply environment overrides, and validate. A missing file
/// means defaults.
pub fn load(path: &str) -> Result<Config> {
    let mut config: Config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?
    } else {
        tracing::info!(path, "no config file, using defaults");
        Config::default()
    };
    config.apply_env(|k| std::env::var(k).ok());
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Seed zones from the config into an empty zone store. Persisted zones
/// always win; nothing is merged.
pub async fn apply(config: &Config, zones: &mut ZoneStore) -> usize {
    if !zones.is_empty() || config.zones.is_empty() {
        return 0;
    }

    for entry in &config.zones {
        let zone = zones.add_zone(&entry.name, entry.zone_number).await;
        if entry.notes.is_some() {
            zones
                .update_zone(
                    &zone.id,
                    ZoneUpdate {
                        notes: entry.notes.clone(),
                        ..Default::default()
                    },
                )
                .await;
        }
        if entry.assigned_group.is_some() {
            zones.assign_group(&zone.id, entry.assigned_group).await;
        }
    }

    tracing::info!(zones = config.zones.len(), "seed zones applied");
    config.zones.len()
}

// ===========================================================================
// Tests
// ===========================================================================
