//! Plant catalog client for the Trefle API.
//!
//! Two browsing modes:
//! - `gulf`: every plant of the Gulf States distribution is fetched once,
//!   cached for a TTL, then filtered and paginated locally.
//! - `all`: the query is forwarded to Trefle's species/search endpoints and
//!   paginated server-side.
//!
//! Trefle has no watering data, so watering is estimated from the botanical
//! family. That estimate is catalog-side and best-effort.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::plant::{Plant, PlantCycle, PlantImage};

/// Page size used both upstream and for local pagination.
pub const PER_PAGE: usize = 20;

const DROUGHT_TOLERANT_FAMILIES: &[&str] = &[
    "Cactaceae",
    "Agavaceae",
    "Aizoaceae",
    "Euphorbiaceae",
    "Asphodelaceae",
    "Crassulaceae",
    "Apocynaceae",
];

const TREE_FAMILIES: &[&str] = &[
    "Fagaceae",
    "Pinaceae",
    "Cupressaceae",
    "Moraceae",
    "Oleaceae",
    "Sapindaceae",
    "Betulaceae",
    "Salicaceae",
    "Meliaceae",
    "Anacardiaceae",
];
const SHRUB_FAMILIES: &[&str] = &[
    "Rosaceae",
    "Caprifoliaceae",
    "Ericaceae",
    "Hydrangeaceae",
    "Rhamnaceae",
];
const GRASS_FAMILIES: &[&str] = &["Poaceae", "Cyperaceae", "Juncaceae"];
const VINE_FAMILIES: &[&str] = &["Vitaceae", "Convolvulaceae", "Passifloraceae"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("TREFLE_TOKEN is not configured. Set it in the environment or the [catalog] config section.")]
    MissingToken,
    #[error("API Error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("catalog request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to decode catalog response: {0}")]
    Decode(#[source] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Gulf,
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantQuery {
    pub page: Option<usize>,
    pub q: Option<String>,
    #[serde(default)]
    pub region: Region,
    /// tree, shrub, herb, vine, grass, or "all".
    pub plant_type: Option<String>,
    pub flower_color: Option<String>,
}

impl PlantQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn plant_type(&self) -> Option<&str> {
        self.plant_type.as_deref().filter(|t| !t.is_empty() && *t != "all")
    }

    fn flower_color(&self) -> Option<&str> {
        self.flower_color.as_deref().filter(|c| !c.is_empty() && *c != "all")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlantPage {
    pub data: Vec<Plant>,
    pub current_page: usize,
    pub per_page: usize,
    pub from: usize,
    pub to: usize,
    pub last_page: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreflePlant {
    pub(crate) id: i64,
    pub(crate) common_name: Option<String>,
    pub(crate) scientific_name: String,
    pub(crate) image_url: Option<String>,
    pub(crate) family: Option<String>,
    #[serde(default)]
    pub(crate) synonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrefleMeta {
    pub(crate) total: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrefleListResponse {
    pub(crate) data: Vec<TreflePlant>,
    pub(crate) meta: TrefleMeta,
}

// ---------------------------------------------------------------------------
// Mapping helpers
// ---------------------------------------------------------------------------

/// Trefle light (0-10, higher = more sun) to sunlight categories. Unknown
/// light defaults to full sun.
pub(crate) fn map_light_to_sunlight(light: Option<i64>) -> Vec<String> {
    let cats: &[&str] = match light {
        None => &["full_sun"],
        Some(l) if l >= 7 => &["full_sun"],
        Some(l) if l >= 4 => &["part_shade", "full_sun"],
        Some(_) => &["full_shade", "part_shade"],
    };
    cats.iter().map(|s| s.to_string()).collect()
}

/// Desert-adapted families need little water; everything else is average.
pub(crate) fn estimate_watering(family: Option<&str>) -> &'static str {
    match family {
        Some(f) if DROUGHT_TOLERANT_FAMILIES.contains(&f) => "Minimum",
        _ => "Average",
    }
}

pub(crate) fn transform(t: TreflePlant) -> Plant {
    let watering = estimate_watering(t.family.as_deref());
    Plant {
        id: t.id,
        common_name: t
            .common_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| t.scientific_name.clone()),
        scientific_name: vec![t.scientific_name],
        other_name: (!t.synonyms.is_empty()).then_some(t.synonyms),
        cycle: PlantCycle::Perennial,
        watering: Some(watering.to_string()),
        // List endpoints carry no light data.
        sunlight: map_light_to_sunlight(None),
        default_image: t.image_url.as_deref().map(PlantImage::single),
        family: t.family,
    }
}

fn matches_plant_type(family: &str, plant_type: &str) -> bool {
    match plant_type {
        "tree" => TREE_FAMILIES.contains(&family),
        "shrub" => SHRUB_FAMILIES.contains(&family),
        "grass" => GRASS_FAMILIES.contains(&family),
        "vine" => VINE_FAMILIES.contains(&family),
        "herb" => ![TREE_FAMILIES, SHRUB_FAMILIES, GRASS_FAMILIES, VINE_FAMILIES]
            .iter()
            .any(|set| set.contains(&family)),
        _ => true,
    }
}

/// Local filtering for gulf mode: name search and family-based plant type.
pub(crate) fn apply_filters(plants: &[Plant], query: &PlantQuery) -> Vec<Plant> {
    let needle = query.search().map(str::to_lowercase);
    plants
        .iter()
        .filter(|p| match &needle {
            Some(n) => {
                p.common_name.to_lowercase().contains(n)
                    || p.scientific_name.iter().any(|s| s.to_lowercase().contains(n))
            }
            None => true,
        })
        .filter(|p| match query.plant_type() {
            Some(t) => matches_plant_type(p.family.as_deref().unwrap_or(""), t),
            None => true,
        })
        .cloned()
        .collect()
}

/// Slice one page out of a fully materialised list.
pub(crate) fn paginate(plants: Vec<Plant>, page: usize, per_page: usize) -> PlantPage {
    let total = plants.len();
    let (start, from, to) = page_bounds(page, per_page, total);
    let data: Vec<Plant> = plants.into_iter().skip(start).take(per_page).collect();
    PlantPage {
        data,
        current_page: page,
        per_page,
        from,
        to,
        last_page: total.div_ceil(per_page),
        total,
    }
}

/// Zero-based start offset plus the 1-based `from`/`to` item numbers of a
/// page. `page` comes straight from the query string, so the math saturates.
fn page_bounds(page: usize, per_page: usize, total: usize) -> (usize, usize, usize) {
    let start = page.saturating_sub(1).saturating_mul(per_page);
    let to = page.saturating_mul(per_page).min(total);
    (start, start.saturating_add(1), to)
}

fn habit_filter(plant_type: &str) -> Option<&'static str> {
    match plant_type {
        "tree" => Some("Tree"),
        "shrub" => Some("Shrub"),
        "herb" => Some("Herb"),
        "vine" => Some("Vine"),
        "grass" => Some("Graminoid"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub cache_ttl: Duration,
    pub max_pages: usize,
}

struct CachedPlants {
    fetched_at: Instant,
    plants: Arc<Vec<Plant>>,
}

pub struct CatalogClient {
    http: Client,
    settings: CatalogSettings,
    gulf_cache: Mutex<Option<CachedPlants>>,
}

impl CatalogClient {
    pub fn new(settings: CatalogSettings) -> Self {
        Self {
            http: Client::builder()
                .user_agent(concat!("garden-planner/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            settings,
            gulf_cache: Mutex::new(None),
        }
    }

    fn token(&self) -> Result<&str, CatalogError> {
        self.settings
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(CatalogError::MissingToken)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = self.url(path);
        debug!(%url, "catalog: fetching");
        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(CatalogError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(CatalogError::Decode)
    }

    /// Fetch one page of plants for `query`.
    pub async fn fetch_plants(&self, query: &PlantQuery) -> Result<PlantPage, CatalogError> {
        let token = self.token()?;
        let page = query.page();

        match query.region {
            Region::Gulf => {
                let all = self.gulf_plants(token).await?;
                let filtered = apply_filters(&all, query);
                Ok(paginate(filtered, page, PER_PAGE))
            }
            Region::All => {
                let mut params = vec![("token", token.to_string()), ("page", page.to_string())];
                let mut endpoint = "/species";
                if let Some(q) = query.search() {
                    endpoint = "/plants/search";
                    params.push(("q", q.to_string()));
                }
                if let Some(habit) = query.plant_type().and_then(habit_filter) {
                    params.push(("filter[growth_habit]", habit.to_string()));
                }
                if let Some(color) = query.flower_color() {
                    params.push(("filter[flower_color]", color.to_string()));
                }

                let resp: TrefleListResponse = self.get_json(endpoint, &params).await?;
                let total = resp.meta.total;
                let (_, from, to) = page_bounds(page, PER_PAGE, total);
                Ok(PlantPage {
                    data: resp.data.into_iter().map(transform).collect(),
                    current_page: page,
                    per_page: PER_PAGE,
                    from,
                    to,
                    last_page: total.div_ceil(PER_PAGE),
                    total,
                })
            }
        }
    }

    /// Raw species document for the detail view.
    pub async fn fetch_plant_details(&self, plant_id: i64) -> Result<serde_json::Value, CatalogError> {
        let token = self.token()?;
        self.get_json(
            &format!("/species/{plant_id}"),
            &[("token", token.to_string())],
        )
        .await
    }

    /// All Gulf-distribution plants, served from cache while fresh. The lock
    /// is held across the fetch so concurrent callers share one download.
    async fn gulf_plants(&self, token: &str) -> Result<Arc<Vec<Plant>>, CatalogError> {
        let mut cache = self.gulf_cache.lock().await;
        if let Some(c) = cache.as_ref() {
            if c.fetched_at.elapsed() < self.settings.cache_ttl {
                return Ok(Arc::clone(&c.plants));
            }
        }

        let mut raw: Vec<TreflePlant> = Vec::new();
        let mut page = 1;
        loop {
            let resp: TrefleListResponse = self
                .get_json(
                    "/distributions/gst/plants",
                    &[("token", token.to_string()), ("page", page.to_string())],
                )
                .await?;
            let full_page = resp.data.len() == PER_PAGE;
            raw.extend(resp.data);
            page += 1;

            if !full_page || raw.len() >= resp.meta.total || page > self.settings.max_pages {
                break;
            }
        }

        let plants = Arc::new(raw.into_iter().map(transform).collect::<Vec<_>>());
        info!(plants = plants.len(), pages = page - 1, "catalog: gulf plants cached");
        *cache = Some(CachedPlants {
            fetched_at: Instant::now(),
            plants: Arc::clone(&plants),
        });
        Ok(plants)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
