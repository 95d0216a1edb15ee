//! Shipment listing, status and carrier update endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Item, ShipmentStatus};
use event_store::EventStore;
use projections::ShipmentPage;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ListParams {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentResponse {
    pub id: String,
    pub status: ShipmentStatus,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<Item>,
}

#[derive(Serialize)]
pub struct StatusAcceptedResponse {
    pub id: String,
    pub status: ShipmentStatus,
}

// -- Handlers --

/// GET /shipments?offset&limit: active shipments, ordered by id.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ShipmentPage>, ApiError> {
    let Query(params) = params?;

    // The list is read from the event log; bring it up to date first.
    state
        .projection_processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let page = state
        .shipments
        .list(params.offset.unwrap_or(0), params.limit())
        .await;
    Ok(Json(page))
}

/// GET /shipments/{id}: live status of one shipment.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ShipmentResponse>, ApiError> {
    let shipment = state.engine.shipment(&AggregateId::new(id.as_str())).await?.state();

    Ok(Json(ShipmentResponse {
        id,
        status: shipment.status(),
        updated_at: shipment.updated_at(),
        items: shipment.items().to_vec(),
    }))
}

/// POST /shipments/{id}/status: relays a carrier status update.
///
/// Updates that would move the shipment backwards are accepted and ignored.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusAcceptedResponse>), ApiError> {
    let Json(req) = payload?;
    let status = ShipmentStatus::from_str(&req.status)?;

    state
        .engine
        .signal_shipment(&AggregateId::new(id.as_str()), status)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(StatusAcceptedResponse { id, status })))
}
