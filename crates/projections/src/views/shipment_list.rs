//! Shipment list read model: active shipments with their latest status.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Shipment, ShipmentEvent, ShipmentStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One shipment in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentSummary {
    pub id: AggregateId,
    pub order_id: Option<AggregateId>,
    /// None when the shipment's events could not be read.
    #[serde(serialize_with = "serialize_status")]
    pub status: Option<ShipmentStatus>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    active: bool,
}

impl ShipmentSummary {
    /// The status name, or `"unknown"`.
    pub fn status_name(&self) -> &'static str {
        self.status.map_or("unknown", |status| status.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

fn serialize_status<S: serde::Serializer>(
    status: &Option<ShipmentStatus>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(status.map_or("unknown", |status| status.as_str()))
}

/// A page of active shipments.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPage {
    pub shipments: Vec<ShipmentSummary>,
    /// Offset of the next page, if there is one.
    pub next_offset: Option<usize>,
}

/// Read model of shipments that are still in progress.
///
/// Shipments leave the list once they complete or fail. An entry whose
/// events cannot be decoded stays listed with an unknown status.
#[derive(Clone)]
pub struct ShipmentListView {
    shipments: Arc<RwLock<BTreeMap<AggregateId, ShipmentSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl ShipmentListView {
    pub fn new() -> Self {
        Self {
            shipments: Arc::new(RwLock::new(BTreeMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Lists active shipments ordered by id.
    pub async fn list(&self, offset: usize, limit: usize) -> ShipmentPage {
        let shipments = self.shipments.read().await;
        let mut active = shipments.values().filter(|s| s.active).skip(offset);

        let page: Vec<ShipmentSummary> = active.by_ref().take(limit).cloned().collect();
        let next_offset = active.next().map(|_| offset + page.len());

        ShipmentPage {
            shipments: page,
            next_offset,
        }
    }

    fn shipment_id(stream: &AggregateId) -> AggregateId {
        let prefix = format!("{}:", Shipment::aggregate_type());
        AggregateId::new(stream.as_str().strip_prefix(&prefix).unwrap_or(stream.as_str()))
    }

    fn apply(summary: &mut ShipmentSummary, event: ShipmentEvent, at: DateTime<Utc>) {
        match event {
            ShipmentEvent::ShipmentStarted(data) => {
                summary.order_id = Some(data.order_id);
                summary.status = Some(ShipmentStatus::default());
            }
            // An unknown entry stays unknown: its history has a gap.
            ShipmentEvent::StatusUpdated(data) if summary.status.is_some() => {
                summary.status = Some(data.status);
                summary.updated_at = at;
            }
            ShipmentEvent::ShipmentCompleted(_) | ShipmentEvent::ShipmentFailed(_) => {
                summary.active = false;
            }
            ShipmentEvent::StatusUpdated(_)
            | ShipmentEvent::ShipmentBooked(_)
            | ShipmentEvent::NotificationSent(_) => {}
        }
    }
}

impl Default for ShipmentListView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for ShipmentListView {
    fn name(&self) -> &'static str {
        "ShipmentListView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type == Shipment::aggregate_type() {
            let shipment_id = Self::shipment_id(&event.aggregate_id);
            let mut shipments = self.shipments.write().await;
            let summary = shipments
                .entry(shipment_id.clone())
                .or_insert_with(|| ShipmentSummary {
                    id: shipment_id.clone(),
                    order_id: None,
                    status: None,
                    updated_at: event.timestamp,
                    active: true,
                });

            match serde_json::from_value::<ShipmentEvent>(event.payload.clone()) {
                Ok(shipment_event) => Self::apply(summary, shipment_event, event.timestamp),
                Err(err) => {
                    tracing::warn!(%shipment_id, error = %err, "Undecodable shipment event");
                    summary.status = None;
                }
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance(event);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }
}

impl ReadModel for ShipmentListView {
    fn name(&self) -> &'static str {
        "ShipmentListView"
    }

    fn count(&self) -> usize {
        self.shipments
            .try_read()
            .map(|s| s.values().filter(|s| s.active).count())
            .unwrap_or(0)
    }
}
