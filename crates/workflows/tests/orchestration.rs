//! Integration tests for order orchestration across orders, shipments and
//! billing runs.

use std::time::Duration;

use common::AggregateId;
use domain::{
    ChargeInput, CustomerAction, CustomerId, FulfillmentStatus, Item, OrderStatus, ShipmentStatus,
};
use event_store::InMemoryEventStore;
use workflows::{
    ActivityOptions, Engine, ErrorKind, InMemoryCarrier, InMemoryFraudCheck, OrderProcess,
    ProcessHandle, Services, ShipmentProcess, WorkflowError,
};

struct TestHarness {
    store: InMemoryEventStore,
    engine: Engine<InMemoryEventStore>,
    carrier: InMemoryCarrier,
    fraud: InMemoryFraudCheck,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let carrier = InMemoryCarrier::new();
        let fraud = InMemoryFraudCheck::new();
        let engine = Self::engine(&store, &carrier, &fraud);

        Self {
            store,
            engine,
            carrier,
            fraud,
        }
    }

    fn engine(
        store: &InMemoryEventStore,
        carrier: &InMemoryCarrier,
        fraud: &InMemoryFraudCheck,
    ) -> Engine<InMemoryEventStore> {
        let services = Services::in_memory()
            .with_carrier(carrier.clone())
            .with_fraud_check(fraud.clone())
            .with_shipment_activity(ActivityOptions::new(Duration::from_secs(1)))
            .with_billing_activity(ActivityOptions::new(Duration::from_secs(5)));
        Engine::new(store.clone(), services)
    }

    /// Simulates a restart: stops every task and starts a fresh engine over
    /// the same store.
    async fn restart(&mut self) {
        self.engine.shutdown().await;
        self.engine = Self::engine(&self.store, &self.carrier, &self.fraud);
    }

    async fn start_order(&self, items: Vec<Item>) -> ProcessHandle<OrderProcess> {
        self.engine
            .start_order(
                AggregateId::new("order123"),
                CustomerId::new("customer123"),
                items,
            )
            .await
            .unwrap()
    }

    /// Starts an order and amends it once it reaches the decision point.
    async fn amended_order(&self, items: Vec<Item>) -> ProcessHandle<OrderProcess> {
        let order = self.start_order(items).await;
        eventually(|| order.state().action_requested()).await;
        self.engine
            .signal_order(order.id(), CustomerAction::Amend)
            .await
            .unwrap();
        order
    }

    /// Waits until shipment `id` is booked and the customer was told.
    async fn booked_shipment(&self, id: &str) -> ProcessHandle<ShipmentProcess> {
        let id = AggregateId::new(id);
        for _ in 0..200 {
            if let Ok(shipment) = self.engine.shipment(&id).await
                && shipment.state().has_notified(ShipmentStatus::Booked)
            {
                return shipment;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("shipment {id} was not booked in time");
    }

    async fn deliver(&self, id: &str) {
        self.booked_shipment(id).await;
        self.engine
            .signal_shipment(&AggregateId::new(id), ShipmentStatus::Delivered)
            .await
            .unwrap();
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

fn two_items() -> Vec<Item> {
    vec![Item::new("test1", 1), Item::new("test2", 3)]
}

#[tokio::test]
async fn test_two_warehouses_end_to_end() {
    let h = TestHarness::new();
    let order = h.amended_order(two_items()).await;

    h.deliver("order123:1").await;
    h.deliver("order123:2").await;

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.order_id.as_str(), "order123");
    assert_eq!(result.status, OrderStatus::Completed);

    let state = order.state();
    let fulfillments = state.fulfillments();
    assert_eq!(fulfillments.len(), 2);
    assert_eq!(fulfillments[0].location(), "Warehouse A");
    assert_eq!(fulfillments[1].location(), "Warehouse B");
    for fulfillment in fulfillments {
        assert_eq!(state.fulfillment_status(fulfillment), FulfillmentStatus::Completed);
        let charge = fulfillment.charge().unwrap();
        assert!(charge.success);
        assert_eq!(charge.invoice_reference, fulfillment.id().as_str());
        assert_eq!(
            fulfillment.courier_reference(),
            h.carrier.booking(fulfillment.id()).as_deref()
        );
    }

    assert_eq!(h.carrier.booking_count(), 2);
    assert_eq!(h.fraud.check_count(), 2);
}

#[tokio::test]
async fn test_two_carrier_updates_per_shipment() {
    let h = TestHarness::new();
    let order = h.amended_order(two_items()).await;

    for id in ["order123:1", "order123:2"] {
        let shipment = h.booked_shipment(id).await;
        let mut seen = vec![shipment.state().status()];

        for status in [ShipmentStatus::Dispatched, ShipmentStatus::Delivered] {
            h.engine
                .signal_shipment(shipment.id(), status)
                .await
                .unwrap();
            eventually(|| shipment.state().has_notified(status)).await;

            let queried = h.engine.shipment(shipment.id()).await.unwrap();
            seen.push(queried.state().status());
        }

        assert_eq!(
            seen,
            vec![
                ShipmentStatus::Booked,
                ShipmentStatus::Dispatched,
                ShipmentStatus::Delivered
            ]
        );
        assert_eq!(
            h.carrier.notifications_for(shipment.id()),
            vec![
                ShipmentStatus::Booked,
                ShipmentStatus::Dispatched,
                ShipmentStatus::Delivered
            ]
        );
    }

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Completed);

    // Late updates to a delivered shipment change nothing.
    h.engine
        .signal_shipment(&AggregateId::new("order123:1"), ShipmentStatus::Dispatched)
        .await
        .unwrap();
    let shipment = h.engine.shipment(&AggregateId::new("order123:1")).await.unwrap();
    assert_eq!(shipment.state().status(), ShipmentStatus::Delivered);
    assert_eq!(h.carrier.notification_count(ShipmentStatus::Delivered), 2);
}

#[tokio::test]
async fn test_order_status_between_carrier_updates() {
    let h = TestHarness::new();
    let order = h.amended_order(two_items()).await;
    let first = h.booked_shipment("order123:1").await;
    h.booked_shipment("order123:2").await;
    eventually(|| order.state().unlaunched().count() == 0).await;

    h.engine
        .signal_shipment(first.id(), ShipmentStatus::Dispatched)
        .await
        .unwrap();
    eventually(|| first.state().has_notified(ShipmentStatus::Dispatched)).await;
    assert_eq!(order.state().status(), OrderStatus::Fulfilling);

    h.engine
        .signal_shipment(first.id(), ShipmentStatus::Delivered)
        .await
        .unwrap();
    eventually(|| order.state().fulfillments()[0].is_delivered()).await;

    let state = order.state();
    assert_eq!(
        state.fulfillment_status(&state.fulfillments()[0]),
        FulfillmentStatus::Completed
    );
    assert_eq!(
        state.fulfillment_status(&state.fulfillments()[1]),
        FulfillmentStatus::Processing
    );
    assert_eq!(state.status(), OrderStatus::Fulfilling);
    assert!(!order.is_finished());
}

#[tokio::test]
async fn test_cancel_launches_nothing() {
    let h = TestHarness::new();
    let order = h.start_order(two_items()).await;
    eventually(|| order.state().action_requested()).await;
    assert_eq!(order.state().status(), OrderStatus::CustomerActionRequired);

    h.engine
        .signal_order(order.id(), CustomerAction::Cancel)
        .await
        .unwrap();

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Cancelled);
    assert_eq!(h.carrier.booking_calls(), 0);

    let state = order.state();
    for fulfillment in state.fulfillments() {
        assert_eq!(state.fulfillment_status(fulfillment), FulfillmentStatus::Cancelled);
    }

    // The first decision wins.
    h.engine
        .signal_order(order.id(), CustomerAction::Amend)
        .await
        .unwrap();
    assert_eq!(order.state().decision(), Some(CustomerAction::Cancel));
}

#[tokio::test]
async fn test_order_without_items_completes_immediately() {
    let h = TestHarness::new();
    let order = h.start_order(vec![]).await;

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Completed);
    assert!(order.state().fulfillments().is_empty());
    assert!(!order.state().action_requested());
}

#[tokio::test]
async fn test_duplicate_order_is_rejected() {
    let h = TestHarness::new();
    h.start_order(two_items()).await;

    let err = h
        .engine
        .start_order(
            AggregateId::new("order123"),
            CustomerId::new("customer123"),
            two_items(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_invalid_order_is_rejected_synchronously() {
    let h = TestHarness::new();

    let err = h
        .engine
        .start_order(AggregateId::new("order123"), CustomerId::new(""), two_items())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // Nothing was recorded, so the id is still free.
    h.start_order(two_items()).await;
}

#[tokio::test]
async fn test_declined_charge_does_not_fail_the_order() {
    let h = TestHarness::new();
    h.fraud.decline("customer123");
    let order = h.amended_order(vec![Item::new("test1", 1)]).await;

    h.deliver("order123:1").await;

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Completed);

    let state = order.state();
    let charge = state.fulfillments()[0].charge().unwrap();
    assert!(!charge.success);
    assert!(charge.auth_code.is_empty());
}

#[tokio::test]
async fn test_booking_failure_fails_the_order() {
    let h = TestHarness::new();
    h.carrier.set_fail_on_book(true);
    let order = h.amended_order(two_items()).await;

    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Failed);

    let state = order.state();
    for fulfillment in state.fulfillments() {
        assert_eq!(state.fulfillment_status(fulfillment), FulfillmentStatus::Failed);
        assert!(fulfillment.failure().is_some());
    }

    let shipment = h.engine.shipment(&AggregateId::new("order123:1")).await.unwrap();
    assert!(shipment.wait().await.unwrap().is_err());
}

#[tokio::test]
async fn test_skipped_dispatch_sends_both_notifications() {
    let h = TestHarness::new();
    let order = h.amended_order(vec![Item::new("test1", 1)]).await;

    h.deliver("order123:1").await;
    order.wait().await.unwrap().unwrap();

    let id = AggregateId::new("order123:1");
    assert_eq!(
        h.carrier.notifications_for(&id),
        vec![
            ShipmentStatus::Booked,
            ShipmentStatus::Dispatched,
            ShipmentStatus::Delivered
        ]
    );
}

#[tokio::test]
async fn test_shipment_status_never_moves_backwards() {
    let h = TestHarness::new();
    h.amended_order(vec![Item::new("test1", 1)]).await;
    let shipment = h.booked_shipment("order123:1").await;

    h.engine
        .signal_shipment(shipment.id(), ShipmentStatus::Dispatched)
        .await
        .unwrap();
    h.engine
        .signal_shipment(shipment.id(), ShipmentStatus::Booked)
        .await
        .unwrap();

    eventually(|| shipment.state().has_notified(ShipmentStatus::Dispatched)).await;
    assert_eq!(shipment.state().status(), ShipmentStatus::Dispatched);
    assert_eq!(h.carrier.notification_count(ShipmentStatus::Dispatched), 1);
}

#[tokio::test]
async fn test_order_completes_while_billing_is_in_flight() {
    let h = TestHarness::new();
    h.fraud.hold();
    let order = h.amended_order(vec![Item::new("test1", 1)]).await;

    h.deliver("order123:1").await;
    eventually(|| order.state().fulfillments()[0].is_delivered()).await;

    // Delivered, so the order reads as completed, but the process still
    // waits for billing to report back.
    assert_eq!(order.state().status(), OrderStatus::Completed);
    assert!(!order.is_finished());

    h.fraud.release();
    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Completed);
    assert!(order.state().fulfillments()[0].charge().is_some());
}

#[tokio::test]
async fn test_recovery_resumes_without_repeating_side_effects() {
    let mut h = TestHarness::new();
    h.amended_order(two_items()).await;
    h.booked_shipment("order123:1").await;
    h.booked_shipment("order123:2").await;

    h.restart().await;
    let recovered = h.engine.recover().await.unwrap();
    // One order, two shipments and two charges.
    assert_eq!(recovered, 5);

    h.deliver("order123:1").await;
    h.deliver("order123:2").await;

    let order = h.engine.order(&AggregateId::new("order123")).await.unwrap();
    let result = order.wait().await.unwrap().unwrap();
    assert_eq!(result.status, OrderStatus::Completed);

    assert_eq!(h.carrier.booking_calls(), 2);
    assert_eq!(h.carrier.notification_count(ShipmentStatus::Booked), 2);
    assert_eq!(h.carrier.notification_count(ShipmentStatus::Delivered), 2);
}

#[tokio::test]
async fn test_decision_survives_restart_before_launch() {
    let mut h = TestHarness::new();
    let order = h.start_order(two_items()).await;
    eventually(|| order.state().action_requested()).await;

    h.restart().await;
    h.engine.recover().await.unwrap();

    h.engine
        .signal_order(&AggregateId::new("order123"), CustomerAction::Amend)
        .await
        .unwrap();
    h.deliver("order123:1").await;
    h.deliver("order123:2").await;

    let order = h.engine.order(&AggregateId::new("order123")).await.unwrap();
    assert_eq!(
        order.wait().await.unwrap().unwrap().status,
        OrderStatus::Completed
    );
}

#[tokio::test]
async fn test_finished_order_is_queryable_after_restart() {
    let mut h = TestHarness::new();
    let order = h.start_order(vec![]).await;
    order.wait().await.unwrap().unwrap();

    h.restart().await;
    let order = h.engine.order(&AggregateId::new("order123")).await.unwrap();
    assert_eq!(order.state().status(), OrderStatus::Completed);
    assert!(order.wait().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_unknown_instances_are_not_found() {
    let h = TestHarness::new();

    let err = h
        .engine
        .shipment(&AggregateId::new("missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .engine
        .signal_order(&AggregateId::new("missing"), CustomerAction::Amend)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_standalone_charge() {
    let h = TestHarness::new();
    let input = ChargeInput {
        customer_id: CustomerId::new("customer123"),
        reference: "invoice-42".to_string(),
        items: vec![Item::new("test1", 2)],
    };

    let first = h.engine.charge(input.clone()).await.unwrap();
    assert_eq!(first.invoice_reference, "invoice-42");
    assert!(first.success);
    assert!(first.total.cents() > 0);

    // Same reference, same charge.
    let again = h.engine.charge(input).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(h.fraud.check_count(), 1);
}

#[tokio::test]
async fn test_standalone_charge_validation() {
    let h = TestHarness::new();

    let err = h
        .engine
        .charge(ChargeInput {
            customer_id: CustomerId::new("customer123"),
            reference: "invoice-42".to_string(),
            items: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);

    let err = h
        .engine
        .charge(ChargeInput {
            customer_id: CustomerId::new(""),
            reference: "invoice-42".to_string(),
            items: vec![Item::new("test1", 1)],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
}
