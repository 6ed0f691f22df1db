use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::db::Db;
use crate::export::GardenPlan;
use crate::grouping::{self, GroupingReport};
use crate::selection::SelectionStore;
use crate::watering::WateringLevel;
use crate::zones::ZoneStore;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<Planner>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// The process-wide planner: both stores plus a short activity log.
pub struct Planner {
    pub started_at: Instant,
    pub selection: SelectionStore,
    pub zones: ZoneStore,
    pub events: VecDeque<PlannerEvent>,
}

#[derive(Clone, Serialize)]
pub struct PlannerEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Selection,
    Zone,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub unique_species: usize,
    pub total_plants: u64,
    pub zones: usize,
    pub assigned_levels: Vec<WateringLevel>,
    pub can_proceed: bool,
    pub events: Vec<PlannerEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl Planner {
    /// Load both stores from persisted state.
    pub async fn load(db: &Db) -> Self {
        Self {
            started_at: Instant::now(),
            selection: SelectionStore::load(db.clone()).await,
            zones: ZoneStore::load(db.clone()).await,
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Grouping, completeness and progress for the current snapshot.
    pub fn report(&self) -> GroupingReport {
        grouping::report(&self.selection.to_vec(), self.zones.zones())
    }

    pub fn plan(&self, now: OffsetDateTime) -> GardenPlan {
        GardenPlan::build(&self.selection.to_vec(), self.zones.zones(), now)
    }

    /// Start over: clear both stores. Two independent writes, not atomic.
    pub async fn reset(&mut self) {
        self.selection.clear().await;
        self.zones.clear().await;
        self.record_system("planner reset".to_string());
    }

    pub fn record_selection(&mut self, detail: String) {
        self.push_event(EventKind::Selection, detail);
    }

    pub fn record_zone(&mut self, detail: String) {
        self.push_event(EventKind::Zone, detail);
    }

    /// Record an error event.
    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    /// Build the JSON-serialisable status snapshot (newest events first).
    pub fn to_status(&self) -> StatusResponse {
        let plants = self.selection.to_vec();
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            unique_species: self.selection.unique_count(),
            total_plants: self.selection.total_quantity(),
            zones: self.zones.zones().len(),
            assigned_levels: self.zones.assigned_levels(),
            can_proceed: grouping::can_proceed(&plants, self.zones.zones()),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(PlannerEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail,
        });
    }
}

// ===========================================================================
// Tests
// ===========================================================================
