//! Standalone billing endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use domain::{ChargeInput, ChargeResult};
use event_store::EventStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /charge: invoices and charges `{customerId, orderReference, items}`.
///
/// A declined charge is a successful call with `success: false`. Charging
/// a reference again returns the first result.
#[tracing::instrument(skip(state, payload))]
pub async fn charge<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<ChargeInput>, JsonRejection>,
) -> Result<Json<ChargeResult>, ApiError> {
    let Json(input) = payload?;
    let result = state.engine.charge(input).await?;
    Ok(Json(result))
}
