//! Order aggregate implementation.

use std::collections::BTreeMap;

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::billing::ChargeResult;
use crate::error::{DomainError, ValidationError};
use crate::failure::Failure;
use crate::shipment::ShipmentResult;
use crate::value_objects::{CustomerId, Item, Sku, validate_items};

use super::{
    Allocation, CustomerAction, Fulfillment, FulfillmentStatus, OrderEvent, OrderStatus,
    events::AllocatedFulfillment,
};

/// Order aggregate root.
///
/// Tracks the orchestrator's progress: allocation, the customer decision
/// point, and the outcome of every fulfillment's shipment and billing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Customer who placed the order.
    customer_id: Option<CustomerId>,

    /// Items as requested.
    items: Vec<Item>,

    /// `None` until allocation has run. An empty list means nothing to ship.
    fulfillments: Option<Vec<Fulfillment>>,

    /// The order reached the customer decision point.
    action_requested: bool,

    /// First customer decision received.
    decision: Option<CustomerAction>,

    /// Orchestrator-level failure.
    failure: Option<Failure>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<&AggregateId> {
        self.id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderStarted(data) => {
                self.id = Some(data.order_id);
                self.customer_id = Some(data.customer_id);
                self.items = data.items;
            }
            OrderEvent::FulfillmentsAllocated(data) => {
                self.fulfillments = Some(
                    data.fulfillments
                        .into_iter()
                        .map(|planned| Fulfillment::planned(planned.id, planned.allocation))
                        .collect(),
                );
            }
            OrderEvent::CustomerActionRequested(_) => self.action_requested = true,
            OrderEvent::CustomerActionReceived(data) => {
                self.decision.get_or_insert(data.action);
            }
            OrderEvent::FulfillmentLaunched(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.launch(data.shipment_id);
                }
            }
            OrderEvent::FulfillmentLaunchFailed(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.fail_launch(data.failure);
                }
            }
            OrderEvent::ShipmentDelivered(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.resolve_shipment(Ok(ShipmentResult {
                        courier_reference: data.courier_reference,
                    }));
                }
            }
            OrderEvent::FulfillmentShipmentFailed(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.resolve_shipment(Err(data.failure));
                }
            }
            OrderEvent::FulfillmentCharged(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.resolve_charge(Ok(data.charge));
                }
            }
            OrderEvent::FulfillmentChargeFailed(data) => {
                if let Some(fulfillment) = self.fulfillment_mut(&data.fulfillment_id) {
                    fulfillment.resolve_charge(Err(data.failure));
                }
            }
            OrderEvent::OrderFailed(data) => {
                self.failure.get_or_insert(data.failure);
            }
        }
    }
}

impl SnapshotCapable for Order {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<&CustomerId> {
        self.customer_id.as_ref()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_allocated(&self) -> bool {
        self.fulfillments.is_some()
    }

    /// Fulfillments in allocation order; empty before allocation.
    pub fn fulfillments(&self) -> &[Fulfillment] {
        self.fulfillments.as_deref().unwrap_or_default()
    }

    pub fn fulfillment(&self, fulfillment_id: &AggregateId) -> Option<&Fulfillment> {
        self.fulfillments().iter().find(|f| f.id() == fulfillment_id)
    }

    /// Fulfillments whose shipment and charge have not been started and
    /// whose launch has not failed.
    pub fn unlaunched(&self) -> impl Iterator<Item = &Fulfillment> {
        self.fulfillments()
            .iter()
            .filter(|f| !f.is_launched() && !f.launch_failed())
    }

    pub fn action_requested(&self) -> bool {
        self.action_requested
    }

    pub fn decision(&self) -> Option<CustomerAction> {
        self.decision
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Returns true once every fulfillment has heard back from both its
    /// shipment and its billing run.
    pub fn all_resolved(&self) -> bool {
        self.fulfillments().iter().all(Fulfillment::is_resolved)
    }

    /// Derives the status of one fulfillment in the context of this order.
    pub fn fulfillment_status(&self, fulfillment: &Fulfillment) -> FulfillmentStatus {
        if fulfillment.failure().is_some() {
            FulfillmentStatus::Failed
        } else if fulfillment.is_delivered() {
            FulfillmentStatus::Completed
        } else if fulfillment.is_launched() {
            FulfillmentStatus::Processing
        } else if self.decision == Some(CustomerAction::Cancel) {
            FulfillmentStatus::Cancelled
        } else if self.action_requested || self.decision.is_some() {
            FulfillmentStatus::CustomerActionRequired
        } else {
            FulfillmentStatus::Pending
        }
    }

    /// Derives the order status from its fulfillments.
    pub fn status(&self) -> OrderStatus {
        if self.failure.is_some() {
            return OrderStatus::Failed;
        }
        let Some(fulfillments) = &self.fulfillments else {
            return OrderStatus::Pending;
        };
        if fulfillments.is_empty() {
            return OrderStatus::Completed;
        }
        if self.decision == Some(CustomerAction::Cancel) {
            return OrderStatus::Cancelled;
        }

        let statuses: Vec<FulfillmentStatus> = fulfillments
            .iter()
            .map(|f| self.fulfillment_status(f))
            .collect();

        if statuses.iter().all(|s| *s == FulfillmentStatus::Pending) {
            OrderStatus::AwaitingFulfillmentDecision
        } else if self.decision.is_none()
            && statuses.contains(&FulfillmentStatus::CustomerActionRequired)
        {
            OrderStatus::CustomerActionRequired
        } else if statuses.iter().all(FulfillmentStatus::is_terminal) {
            if statuses.contains(&FulfillmentStatus::Failed) {
                OrderStatus::Failed
            } else {
                OrderStatus::Completed
            }
        } else {
            OrderStatus::Fulfilling
        }
    }

    fn fulfillment_mut(&mut self, fulfillment_id: &AggregateId) -> Option<&mut Fulfillment> {
        self.fulfillments
            .as_mut()?
            .iter_mut()
            .find(|f| f.id() == fulfillment_id)
    }

    fn is_fulfilling(&self) -> bool {
        self.decision == Some(CustomerAction::Amend) && self.failure.is_none()
    }

    fn is_launchable(&self, fulfillment_id: &AggregateId) -> bool {
        self.is_fulfilling()
            && self
                .fulfillment(fulfillment_id)
                .is_some_and(|f| !f.is_launched() && !f.launch_failed())
    }

    fn is_closed(&self) -> bool {
        self.failure.is_some() || self.fulfillments().iter().any(Fulfillment::is_launched)
    }
}

// Command methods (return events)
impl Order {
    /// Starts an order. An empty item list is accepted.
    pub fn start(
        &self,
        order_id: &AggregateId,
        customer_id: CustomerId,
        items: Vec<Item>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::AlreadyStarted {
                aggregate_type: Self::aggregate_type(),
                id: order_id.to_string(),
            });
        }
        if order_id.is_blank() {
            return Err(ValidationError::Required("OrderID").into());
        }
        if customer_id.is_blank() {
            return Err(ValidationError::Required("CustomerID").into());
        }
        validate_items(&items)?;

        Ok(vec![OrderEvent::order_started(
            order_id.clone(),
            customer_id,
            items,
        )])
    }

    /// Records the allocation plan.
    ///
    /// The plan must partition the ordered items: every SKU quantity is
    /// covered exactly and no allocation is empty. Fulfillment ids are
    /// derived from the order id.
    pub fn allocate(&self, plan: Vec<Allocation>) -> Result<Vec<OrderEvent>, ValidationError> {
        let Some(order_id) = &self.id else {
            return Ok(vec![]);
        };
        if self.is_allocated() {
            return Ok(vec![]);
        }

        let mut remaining: BTreeMap<&Sku, i64> = BTreeMap::new();
        for item in &self.items {
            *remaining.entry(&item.sku).or_default() += i64::from(item.quantity);
        }
        for allocation in &plan {
            if allocation.items.is_empty() {
                return Err(ValidationError::InvalidAllocation(format!(
                    "{} has no items",
                    allocation.location
                )));
            }
            validate_items(&allocation.items)?;
            for item in &allocation.items {
                let Some(left) = remaining.get_mut(&item.sku) else {
                    return Err(ValidationError::InvalidAllocation(format!(
                        "sku {} was not ordered",
                        item.sku
                    )));
                };
                *left -= i64::from(item.quantity);
            }
        }
        if let Some((sku, left)) = remaining.iter().find(|(_, left)| **left != 0) {
            return Err(ValidationError::InvalidAllocation(format!(
                "sku {sku} is off by {left}"
            )));
        }

        let fulfillments = plan
            .into_iter()
            .enumerate()
            .map(|(index, allocation)| AllocatedFulfillment {
                id: order_id.child(index + 1),
                allocation,
            })
            .collect();

        Ok(vec![OrderEvent::fulfillments_allocated(fulfillments)])
    }

    /// Marks the customer decision point as reached.
    pub fn request_customer_action(&self) -> Vec<OrderEvent> {
        if !self.is_allocated()
            || self.action_requested
            || self.decision.is_some()
            || self.failure.is_some()
        {
            return vec![];
        }
        vec![OrderEvent::customer_action_requested()]
    }

    /// Records a customer decision.
    ///
    /// The first decision wins. A decision that arrives before the order
    /// reaches the decision point is kept for when it does. Anything after
    /// a decision, a launch or a failure is ignored.
    pub fn receive_action(&self, action: CustomerAction) -> Vec<OrderEvent> {
        if self.id.is_none() || self.decision.is_some() || self.is_closed() {
            return vec![];
        }
        vec![OrderEvent::customer_action_received(action)]
    }

    /// Records that a fulfillment's shipment and charge were started.
    pub fn launch(&self, fulfillment_id: &AggregateId, shipment_id: AggregateId) -> Vec<OrderEvent> {
        if !self.is_launchable(fulfillment_id) {
            return vec![];
        }
        vec![OrderEvent::fulfillment_launched(
            fulfillment_id.clone(),
            shipment_id,
        )]
    }

    /// Records that a fulfillment's children could not be started. The
    /// fulfillment fails on its own; its siblings carry on.
    pub fn launch_failed(&self, fulfillment_id: &AggregateId, failure: Failure) -> Vec<OrderEvent> {
        if !self.is_launchable(fulfillment_id) {
            return vec![];
        }
        vec![OrderEvent::launch_failed(fulfillment_id.clone(), failure)]
    }

    /// Records the outcome of a fulfillment's shipment.
    ///
    /// Accepted once the order is fulfilling, even if the launch itself has
    /// not been recorded yet: a child can report back before that.
    pub fn shipment_finished(
        &self,
        fulfillment_id: &AggregateId,
        outcome: Result<ShipmentResult, Failure>,
    ) -> Vec<OrderEvent> {
        let pending = self.is_fulfilling()
            && self
                .fulfillment(fulfillment_id)
                .is_some_and(|f| !f.shipment_resolved());
        if !pending {
            return vec![];
        }
        let event = match outcome {
            Ok(result) => {
                OrderEvent::shipment_delivered(fulfillment_id.clone(), result.courier_reference)
            }
            Err(failure) => OrderEvent::shipment_failed(fulfillment_id.clone(), failure),
        };
        vec![event]
    }

    /// Records the outcome of a fulfillment's billing run.
    pub fn billing_finished(
        &self,
        fulfillment_id: &AggregateId,
        outcome: Result<ChargeResult, Failure>,
    ) -> Vec<OrderEvent> {
        let pending = self.is_fulfilling()
            && self
                .fulfillment(fulfillment_id)
                .is_some_and(|f| !f.billing_resolved());
        if !pending {
            return vec![];
        }
        let event = match outcome {
            Ok(charge) => OrderEvent::fulfillment_charged(fulfillment_id.clone(), charge),
            Err(failure) => OrderEvent::charge_failed(fulfillment_id.clone(), failure),
        };
        vec![event]
    }

    /// Records an orchestrator-level failure.
    pub fn fail(&self, failure: Failure) -> Vec<OrderEvent> {
        if self.id.is_none() || self.failure.is_some() {
            return vec![];
        }
        vec![OrderEvent::order_failed(failure)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{ChargeOutcome, Invoice};
    use crate::value_objects::Money;

    fn execute(order: &mut Order, command: impl FnOnce(&Order) -> Vec<OrderEvent>) -> usize {
        let events = command(order);
        let count = events.len();
        order.apply_events(events);
        count
    }

    fn started(items: Vec<Item>) -> Order {
        let mut order = Order::default();
        let events = order
            .start(
                &AggregateId::new("order123"),
                CustomerId::new("customer123"),
                items,
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    fn two_warehouses() -> Order {
        let mut order = started(vec![Item::new("test1", 1), Item::new("test2", 2)]);
        let events = order
            .allocate(vec![
                Allocation::new("Warehouse A", vec![Item::new("test1", 1)]),
                Allocation::new("Warehouse B", vec![Item::new("test2", 2)]),
            ])
            .unwrap();
        order.apply_events(events);
        order
    }

    fn charge_result() -> ChargeResult {
        let invoice = Invoice {
            invoice_reference: "order123:1".to_string(),
            sub_total: Money::from_cents(100),
            tax: Money::from_cents(20),
            shipping: Money::from_cents(10),
            total: Money::from_cents(130),
        };
        ChargeResult::new(&invoice, &ChargeOutcome::approved())
    }

    fn delivered(reference: &str) -> Result<ShipmentResult, Failure> {
        Ok(ShipmentResult {
            courier_reference: reference.to_string(),
        })
    }

    #[test]
    fn start_validates_input() {
        let order = Order::default();

        let result = order.start(&AggregateId::new(""), CustomerId::new("c"), vec![]);
        assert!(matches!(
            result,
            Err(DomainError::Validation(ValidationError::Required("OrderID")))
        ));

        let result = order.start(&AggregateId::new("order123"), CustomerId::new(""), vec![]);
        assert!(matches!(
            result,
            Err(DomainError::Validation(ValidationError::Required("CustomerID")))
        ));

        let result = order.start(
            &AggregateId::new("order123"),
            CustomerId::new("customer123"),
            vec![Item::new("test1", 0)],
        );
        assert!(matches!(
            result,
            Err(DomainError::Validation(ValidationError::InvalidQuantity { .. }))
        ));
    }

    #[test]
    fn start_twice_is_rejected() {
        let order = started(vec![Item::new("test1", 1)]);
        let result = order.start(
            &AggregateId::new("order123"),
            CustomerId::new("customer123"),
            vec![],
        );
        assert!(matches!(result, Err(DomainError::AlreadyStarted { .. })));
    }

    #[test]
    fn allocation_derives_fulfillment_ids() {
        let order = two_warehouses();
        let ids: Vec<&str> = order.fulfillments().iter().map(|f| f.id().as_str()).collect();
        assert_eq!(ids, vec!["order123:1", "order123:2"]);
        assert_eq!(order.fulfillments()[1].location(), "Warehouse B");
        assert_eq!(order.status(), OrderStatus::AwaitingFulfillmentDecision);
    }

    #[test]
    fn allocation_must_partition_items() {
        let order = started(vec![Item::new("test1", 2)]);

        let short = order.allocate(vec![Allocation::new("Warehouse A", vec![Item::new("test1", 1)])]);
        assert!(matches!(short, Err(ValidationError::InvalidAllocation(_))));

        let unknown = order.allocate(vec![Allocation::new(
            "Warehouse A",
            vec![Item::new("test1", 2), Item::new("other", 1)],
        )]);
        assert!(matches!(unknown, Err(ValidationError::InvalidAllocation(_))));

        let empty = order.allocate(vec![
            Allocation::new("Warehouse A", vec![Item::new("test1", 2)]),
            Allocation::new("Warehouse B", vec![]),
        ]);
        assert!(matches!(empty, Err(ValidationError::InvalidAllocation(_))));

        let split = order
            .allocate(vec![
                Allocation::new("Warehouse A", vec![Item::new("test1", 1)]),
                Allocation::new("Warehouse B", vec![Item::new("test1", 1)]),
            ])
            .unwrap();
        assert_eq!(split.len(), 1);
    }

    #[test]
    fn zero_items_completes_without_fulfillments() {
        let mut order = started(vec![]);
        let events = order.allocate(vec![]).unwrap();
        order.apply_events(events);

        assert!(order.is_allocated());
        assert!(order.fulfillments().is_empty());
        assert!(order.all_resolved());
        assert_eq!(order.status(), OrderStatus::Completed);
    }

    #[test]
    fn status_before_allocation_is_pending() {
        let order = started(vec![Item::new("test1", 1)]);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.request_customer_action().is_empty());
    }

    #[test]
    fn first_decision_wins() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.request_customer_action());
        assert_eq!(order.status(), OrderStatus::CustomerActionRequired);

        assert_eq!(execute(&mut order, |o| o.receive_action(CustomerAction::Amend)), 1);
        assert_eq!(execute(&mut order, |o| o.receive_action(CustomerAction::Cancel)), 0);
        assert_eq!(order.decision(), Some(CustomerAction::Amend));
    }

    #[test]
    fn early_decision_is_kept() {
        let mut order = started(vec![Item::new("test1", 1)]);
        assert_eq!(execute(&mut order, |o| o.receive_action(CustomerAction::Cancel)), 1);

        let events = order
            .allocate(vec![Allocation::new("Warehouse A", vec![Item::new("test1", 1)])])
            .unwrap();
        order.apply_events(events);

        assert!(order.request_customer_action().is_empty());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(
            order.fulfillment_status(&order.fulfillments()[0]),
            FulfillmentStatus::Cancelled
        );
    }

    #[test]
    fn fulfillment_lifecycle_drives_order_status() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.request_customer_action());
        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));

        let first = AggregateId::new("order123:1");
        let second = AggregateId::new("order123:2");

        execute(&mut order, |o| o.launch(&first, first.clone()));
        execute(&mut order, |o| o.launch(&second, second.clone()));
        assert_eq!(order.status(), OrderStatus::Fulfilling);
        assert_eq!(order.unlaunched().count(), 0);

        execute(&mut order, |o| o.shipment_finished(&first, delivered("COURIER-1")));
        assert_eq!(
            order.fulfillment_status(order.fulfillment(&first).unwrap()),
            FulfillmentStatus::Completed
        );
        assert_eq!(order.status(), OrderStatus::Fulfilling);

        execute(&mut order, |o| o.shipment_finished(&second, delivered("COURIER-2")));
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(!order.all_resolved());

        execute(&mut order, |o| o.billing_finished(&first, Ok(charge_result())));
        execute(&mut order, |o| o.billing_finished(&second, Ok(charge_result())));
        assert!(order.all_resolved());
        assert_eq!(
            order.fulfillment(&second).and_then(Fulfillment::courier_reference),
            Some("COURIER-2")
        );
    }

    #[test]
    fn any_failed_fulfillment_fails_the_order() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));

        let first = AggregateId::new("order123:1");
        let second = AggregateId::new("order123:2");
        execute(&mut order, |o| o.launch(&first, first.clone()));
        execute(&mut order, |o| o.launch(&second, second.clone()));

        execute(&mut order, |o| o.shipment_finished(&first, delivered("COURIER-1")));
        execute(
            &mut order,
            |o| o.shipment_finished(&second, Err(Failure::side_effect("booking rejected"))),
        );

        assert_eq!(
            order.fulfillment_status(order.fulfillment(&second).unwrap()),
            FulfillmentStatus::Failed
        );
        assert_eq!(order.status(), OrderStatus::Failed);
    }

    #[test]
    fn amended_order_is_fulfilling_while_launches_are_pending() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.request_customer_action());
        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));

        let first = AggregateId::new("order123:1");
        let second = AggregateId::new("order123:2");
        assert_eq!(order.status(), OrderStatus::Fulfilling);

        execute(&mut order, |o| o.launch(&first, first.clone()));
        assert_eq!(order.status(), OrderStatus::Fulfilling);
        assert_eq!(
            order.fulfillment_status(order.fulfillment(&second).unwrap()),
            FulfillmentStatus::CustomerActionRequired
        );
    }

    #[test]
    fn failed_launch_stays_with_its_fulfillment() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));

        let first = AggregateId::new("order123:1");
        let second = AggregateId::new("order123:2");
        execute(&mut order, |o| o.launch(&first, first.clone()));
        assert_eq!(
            execute(
                &mut order,
                |o| o.launch_failed(&second, Failure::side_effect("no capacity"))
            ),
            1
        );

        assert!(order.failure().is_none());
        assert_eq!(order.unlaunched().count(), 0);
        assert!(order.launch(&second, second.clone()).is_empty());
        assert!(order.fulfillment(&second).unwrap().is_resolved());
        assert_eq!(
            order.fulfillment_status(order.fulfillment(&second).unwrap()),
            FulfillmentStatus::Failed
        );
        assert_eq!(order.status(), OrderStatus::Fulfilling);

        execute(&mut order, |o| o.shipment_finished(&first, delivered("COURIER-1")));
        execute(&mut order, |o| o.billing_finished(&first, Ok(charge_result())));
        assert!(order.all_resolved());
        assert_eq!(
            order.fulfillment_status(order.fulfillment(&first).unwrap()),
            FulfillmentStatus::Completed
        );
        assert_eq!(order.status(), OrderStatus::Failed);
    }

    #[test]
    fn actions_after_launch_are_ignored() {
        let mut order = two_warehouses();
        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));
        let first = AggregateId::new("order123:1");
        execute(&mut order, |o| o.launch(&first, first.clone()));

        assert!(order.receive_action(CustomerAction::Cancel).is_empty());
        assert!(order.launch(&first, first.clone()).is_empty());
    }

    #[test]
    fn launch_requires_amend() {
        let order = two_warehouses();
        let first = AggregateId::new("order123:1");
        assert!(order.launch(&first, first.clone()).is_empty());
    }

    #[test]
    fn outcomes_are_recorded_once() {
        let mut order = two_warehouses();
        let first = AggregateId::new("order123:1");

        assert!(order.shipment_finished(&first, delivered("COURIER-1")).is_empty());

        execute(&mut order, |o| o.receive_action(CustomerAction::Amend));
        assert_eq!(
            execute(&mut order, |o| o.shipment_finished(&first, delivered("COURIER-1"))),
            1
        );
        assert!(order.shipment_finished(&first, delivered("COURIER-1")).is_empty());

        // The launch can still be recorded after its shipment reported back.
        assert_eq!(execute(&mut order, |o| o.launch(&first, first.clone())), 1);
        assert_eq!(
            order.fulfillment_status(order.fulfillment(&first).unwrap()),
            FulfillmentStatus::Completed
        );
    }

    #[test]
    fn orchestrator_failure_wins() {
        let mut order = two_warehouses();
        execute(
            &mut order,
            |o| o.fail(Failure::infrastructure("store unavailable")),
        );
        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.fail(Failure::infrastructure("again")).is_empty());
        assert!(order.receive_action(CustomerAction::Amend).is_empty());
    }
}
