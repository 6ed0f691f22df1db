use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, CatalogError, PlantPage, PlantQuery};
use crate::export::GardenPlan;
use crate::grouping::GroupingReport;
use crate::plant::{Plant, SelectedPlant};
use crate::state::{SharedState, StatusResponse};
use crate::watering::{GroupInfo, WateringLevel};
use crate::zones::{validate_new_zone, IrrigationZone, ZoneInputError, ZoneNumberInput, ZoneUpdate};

#[derive(Clone)]
pub struct AppState {
    pub planner: SharedState,
    pub catalog: Arc<CatalogClient>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Validation(#[from] ZoneInputError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Catalog(CatalogError::MissingToken) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Catalog(_) => StatusCode::BAD_GATEWAY,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SelectionResponse {
    pub plants: Vec<SelectedPlant>,
    pub total_quantity: u64,
    pub unique_species: usize,
}

#[derive(Deserialize)]
pub struct QuantityBody {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct NewZoneBody {
    pub name: String,
    pub zone_number: ZoneNumberInput,
}

#[derive(Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub info: GroupInfo,
    pub zone: Option<IrrigationZone>,
    pub plants: Vec<SelectedPlant>,
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub group: Option<WateringLevel>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        // catalog
        .route("/api/plants", get(list_plants))
        .route("/api/plants/{id}", get(plant_details))
        // selection
        .route(
            "/api/selection",
            get(get_selection).post(select_plant).delete(clear_selection),
        )
        .route("/api/selection/{id}", axum::routing::delete(deselect_plant))
        .route("/api/selection/{id}/quantity", put(set_quantity))
        .route("/api/selection/{id}/increment", post(increment))
        .route("/api/selection/{id}/decrement", post(decrement))
        // zones
        .route(
            "/api/zones",
            get(list_zones).post(add_zone).delete(clear_zones),
        )
        .route(
            "/api/zones/{id}",
            get(get_zone).patch(update_zone).delete(delete_zone),
        )
        .route("/api/zones/{id}/group", put(assign_group))
        // derived views + export
        .route("/api/groups", get(groups))
        .route("/api/groups/{level}", get(group_detail))
        .route("/api/plan", get(plan))
        .route("/api/plan/export.json", get(export_json))
        .route("/api/plan/export.txt", get(export_text))
        .route("/api/plan/print", get(export_print))
        .route("/api/reset", post(reset))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let st = state.planner.read().await;
    Json(st.to_status())
}

// -- catalog ----------------------------------------------------------------

async fn list_plants(
    State(state): State<AppState>,
    Query(query): Query<PlantQuery>,
) -> Result<Json<PlantPage>, ApiError> {
    match state.catalog.fetch_plants(&query).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => {
            warn!("catalog fetch failed: {e}");
            state.planner.write().await.record_error(e.to_string());
            Err(e.into())
        }
    }
}

async fn plant_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.catalog.fetch_plant_details(id).await?))
}

// -- selection --------------------------------------------------------------

fn selection_response(st: &crate::state::Planner) -> Json<SelectionResponse> {
    Json(SelectionResponse {
        plants: st.selection.to_vec(),
        total_quantity: st.selection.total_quantity(),
        unique_species: st.selection.unique_count(),
    })
}

async fn get_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    let st = state.planner.read().await;
    selection_response(&st)
}

async fn select_plant(
    State(state): State<AppState>,
    Json(plant): Json<Plant>,
) -> (StatusCode, Json<SelectionResponse>) {
    let mut st = state.planner.write().await;
    let name = plant.common_name.clone();
    let status = if st.selection.select(plant).await {
        st.record_selection(format!("selected {name}"));
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, selection_response(&st))
}

async fn deselect_plant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<SelectionResponse> {
    let mut st = state.planner.write().await;
    if st.selection.deselect(id).await {
        st.record_selection(format!("deselected plant {id}"));
    }
    selection_response(&st)
}

async fn set_quantity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let mut st = state.planner.write().await;
    let q = st
        .selection
        .set_quantity(id, body.quantity)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("plant {id} is not selected")))?;
    st.record_selection(format!("plant {id} quantity {q}"));
    Ok(selection_response(&st))
}

async fn increment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let mut st = state.planner.write().await;
    let current = st
        .selection
        .get(id)
        .map(|p| p.quantity)
        .ok_or_else(|| ApiError::NotFound(format!("plant {id} is not selected")))?;
    if let Some(q) = st.selection.set_quantity(id, i64::from(current) + 1).await {
        st.record_selection(format!("plant {id} quantity {q}"));
    }
    Ok(selection_response(&st))
}

/// Decrement, deselecting instead of going below one.
async fn decrement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let mut st = state.planner.write().await;
    let current = st
        .selection
        .get(id)
        .map(|p| p.quantity)
        .ok_or_else(|| ApiError::NotFound(format!("plant {id} is not selected")))?;
    if current <= 1 {
        st.selection.deselect(id).await;
        st.record_selection(format!("deselected plant {id}"));
    } else if let Some(q) = st.selection.set_quantity(id, i64::from(current) - 1).await {
        st.record_selection(format!("plant {id} quantity {q}"));
    }
    Ok(selection_response(&st))
}

async fn clear_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    let mut st = state.planner.write().await;
    st.selection.clear().await;
    st.record_selection("selection cleared".to_string());
    selection_response(&st)
}

// -- zones ------------------------------------------------------------------

async fn list_zones(State(state): State<AppState>) -> Json<Vec<IrrigationZone>> {
    let st = state.planner.read().await;
    Json(st.zones.zones().to_vec())
}

async fn add_zone(
    State(state): State<AppState>,
    Json(body): Json<NewZoneBody>,
) -> Result<(StatusCode, Json<IrrigationZone>), ApiError> {
    let (name, number) = validate_new_zone(&body.name, &body.zone_number)?;
    let mut st = state.planner.write().await;
    let zone = st.zones.add_zone(&name, number).await;
    st.record_zone(format!("added zone {name} (#{number})"));
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IrrigationZone>, ApiError> {
    let st = state.planner.read().await;
    st.zones
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("zone {id} not found")))
}

async fn update_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ZoneUpdate>,
) -> Result<Json<IrrigationZone>, ApiError> {
    let update = update.validated()?;
    let mut st = state.planner.write().await;
    let zone = st
        .zones
        .update_zone(&id, update)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("zone {id} not found")))?;
    st.record_zone(format!("updated zone {}", zone.name));
    Ok(Json(zone))
}

async fn delete_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut st = state.planner.write().await;
    if !st.zones.delete_zone(&id).await {
        return Err(ApiError::NotFound(format!("zone {id} not found")));
    }
    st.record_zone(format!("deleted zone {id}"));
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Vec<IrrigationZone>>, ApiError> {
    let mut st = state.planner.write().await;
    if !st.zones.assign_group(&id, body.group).await {
        return Err(ApiError::NotFound(format!("zone {id} not found")));
    }
    let detail = match body.group {
        Some(level) => format!("zone {id} assigned {level}"),
        None => format!("zone {id} unassigned"),
    };
    st.record_zone(detail);
    Ok(Json(st.zones.zones().to_vec()))
}

async fn clear_zones(State(state): State<AppState>) -> StatusCode {
    let mut st = state.planner.write().await;
    st.zones.clear().await;
    st.record_zone("zones cleared".to_string());
    StatusCode::NO_CONTENT
}

// -- derived views + export -------------------------------------------------

async fn groups(State(state): State<AppState>) -> Json<GroupingReport> {
    let st = state.planner.read().await;
    Json(st.report())
}

async fn group_detail(
    State(state): State<AppState>,
    Path(level): Path<WateringLevel>,
) -> Json<GroupDetail> {
    let st = state.planner.read().await;
    Json(GroupDetail {
        info: level.info(),
        zone: st.zones.zone_for(level).cloned(),
        plants: st.selection.by_level(level),
    })
}

async fn current_plan(state: &AppState) -> GardenPlan {
    state.planner.read().await.plan(OffsetDateTime::now_utc())
}

async fn plan(State(state): State<AppState>) -> Json<GardenPlan> {
    Json(current_plan(&state).await)
}

async fn export_json(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = current_plan(&state)
        .await
        .to_json()
        .map_err(|e| ApiError::Internal(format!("failed to encode plan: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"garden-plan.json\"",
            ),
        ],
        body,
    ))
}

async fn export_text(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        current_plan(&state).await.to_text(),
    )
}

async fn export_print(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    current_plan(&state)
        .await
        .to_print_html()
        .map(Html)
        .map_err(|e| ApiError::Internal(format!("failed to render plan: {e}")))
}

async fn reset(State(state): State<AppState>) -> StatusCode {
    let mut st = state.planner.write().await;
    st.reset().await;
    info!("planner reset");
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    info!("planner api listening on http://{addr}");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================
