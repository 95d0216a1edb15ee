//! Order start, status and customer action endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{CustomerAction, CustomerId, Item, OrderStatus};
use event_store::EventStore;
use projections::OrderStatusReport;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

/// Missing fields are treated as empty and rejected by validation.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<Item>,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStartedResponse {
    pub id: String,
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct ActionAcceptedResponse {
    pub id: String,
    pub action: CustomerAction,
}

// -- Handlers --

/// POST /orders: starts an order.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderStartedResponse>), ApiError> {
    let Json(req) = payload?;

    let order = state
        .engine
        .start_order(
            AggregateId::new(req.id),
            CustomerId::new(req.customer_id),
            req.items,
        )
        .await?;

    let response = OrderStartedResponse {
        id: order.id().to_string(),
        status: order.state().status(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}: order status with per-fulfillment detail.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusReport>, ApiError> {
    let report = state.orders.order_status(&AggregateId::new(id)).await?;
    Ok(Json(report))
}

/// POST /orders/{id}/action: relays the customer's `amend` or `cancel`.
///
/// Accepted once delivered to the order; an order past its decision point
/// ignores it.
#[tracing::instrument(skip(state, payload))]
pub async fn action<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActionAcceptedResponse>), ApiError> {
    let Json(req) = payload?;
    let action = CustomerAction::from_str(&req.action)?;

    state
        .engine
        .signal_order(&AggregateId::new(id.as_str()), action)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ActionAcceptedResponse { id, action }),
    ))
}
