//! Fulfillments: the per-warehouse slices of an order.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::billing::ChargeResult;
use crate::failure::Failure;
use crate::shipment::ShipmentResult;
use crate::value_objects::Item;

/// Output of the allocation rule: one warehouse and the items it ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub location: String,
    pub items: Vec<Item>,
}

impl Allocation {
    pub fn new(location: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            location: location.into(),
            items,
        }
    }
}

/// A fulfillment as tracked by its order.
///
/// The shipment and billing outcomes arrive independently; the fulfillment
/// is resolved once both are in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    id: AggregateId,
    location: String,
    items: Vec<Item>,
    shipment_id: Option<AggregateId>,
    /// Starting the children failed; the fulfillment will not be retried.
    #[serde(default)]
    launch_failed: bool,
    shipment: Option<Result<ShipmentResult, Failure>>,
    charge: Option<Result<ChargeResult, Failure>>,
}

impl Fulfillment {
    pub(crate) fn planned(id: AggregateId, allocation: Allocation) -> Self {
        Self {
            id,
            location: allocation.location,
            items: allocation.items,
            shipment_id: None,
            launch_failed: false,
            shipment: None,
            charge: None,
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Warehouse the items ship from.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Set when the shipment and charge were launched.
    pub fn shipment_id(&self) -> Option<&AggregateId> {
        self.shipment_id.as_ref()
    }

    pub fn is_launched(&self) -> bool {
        self.shipment_id.is_some()
    }

    pub fn launch_failed(&self) -> bool {
        self.launch_failed
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.shipment, Some(Ok(_)))
    }

    pub fn courier_reference(&self) -> Option<&str> {
        match &self.shipment {
            Some(Ok(result)) => Some(&result.courier_reference),
            _ => None,
        }
    }

    /// The billing outcome, if billing finished successfully (approved or
    /// declined).
    pub fn charge(&self) -> Option<&ChargeResult> {
        match &self.charge {
            Some(Ok(result)) => Some(result),
            _ => None,
        }
    }

    /// The first recorded failure, shipment before billing.
    pub fn failure(&self) -> Option<&Failure> {
        self.shipment
            .as_ref()
            .and_then(|o| o.as_ref().err())
            .or_else(|| self.charge.as_ref().and_then(|o| o.as_ref().err()))
    }

    pub fn shipment_resolved(&self) -> bool {
        self.shipment.is_some()
    }

    pub fn billing_resolved(&self) -> bool {
        self.charge.is_some()
    }

    /// Both child processes have reported back.
    pub fn is_resolved(&self) -> bool {
        self.shipment_resolved() && self.billing_resolved()
    }

    pub(crate) fn launch(&mut self, shipment_id: AggregateId) {
        self.shipment_id = Some(shipment_id);
    }

    /// Resolves both outcomes with `failure`. Outcomes already reported by a
    /// child that did start are kept.
    pub(crate) fn fail_launch(&mut self, failure: Failure) {
        self.launch_failed = true;
        self.resolve_shipment(Err(failure.clone()));
        self.resolve_charge(Err(failure));
    }

    pub(crate) fn resolve_shipment(&mut self, outcome: Result<ShipmentResult, Failure>) {
        self.shipment.get_or_insert(outcome);
    }

    pub(crate) fn resolve_charge(&mut self, outcome: Result<ChargeResult, Failure>) {
        self.charge.get_or_insert(outcome);
    }
}
