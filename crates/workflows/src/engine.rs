//! Process engine: starts, signals, queries and recovers every order,
//! shipment and billing process over one event store.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    Charge, ChargeEvent, ChargeInput, ChargeResult, CustomerAction, CustomerId, Item,
    Journal, Order, OrderEvent, Shipment, ShipmentEvent, ShipmentStatus,
};
use event_store::{EventQuery, EventStore};
use tokio::sync::mpsc;

use crate::activity::ActivityOptions;
use crate::billing::{BillingContext, BillingProcess};
use crate::error::{Result, WorkflowError};
use crate::order::{FulfillmentLauncher, LaunchRequest, OrderContext, OrderMessage, OrderProcess};
use crate::process::{Outcome, Process, ProcessHandle};
use crate::registry::Registry;
use crate::services::{
    Allocator, Carrier, FraudCheck, InMemoryCarrier, NoFraudCheck, Pricing, SimulatedPricing,
    WarehouseAllocator,
};
use crate::shipment::{ShipmentContext, ShipmentMessage, ShipmentProcess};

/// The collaborators processes call out to.
#[derive(Clone)]
pub struct Services {
    pub allocator: Arc<dyn Allocator>,
    pub carrier: Arc<dyn Carrier>,
    pub fraud_check: Arc<dyn FraudCheck>,
    pub pricing: Arc<dyn Pricing>,
    pub shipment_activity: ActivityOptions,
    pub billing_activity: ActivityOptions,
}

impl Default for Services {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Services {
    /// Warehouse allocation, an in-memory carrier, simulated pricing and
    /// no fraud check.
    pub fn in_memory() -> Self {
        Self {
            allocator: Arc::new(WarehouseAllocator),
            carrier: Arc::new(InMemoryCarrier::new()),
            fraud_check: Arc::new(NoFraudCheck),
            pricing: Arc::new(SimulatedPricing),
            shipment_activity: ActivityOptions::shipment(),
            billing_activity: ActivityOptions::billing(),
        }
    }

    pub fn with_allocator(mut self, allocator: impl Allocator + 'static) -> Self {
        self.allocator = Arc::new(allocator);
        self
    }

    pub fn with_carrier(mut self, carrier: impl Carrier + 'static) -> Self {
        self.carrier = Arc::new(carrier);
        self
    }

    pub fn with_fraud_check(mut self, fraud_check: impl FraudCheck + 'static) -> Self {
        self.fraud_check = Arc::new(fraud_check);
        self
    }

    pub fn with_pricing(mut self, pricing: impl Pricing + 'static) -> Self {
        self.pricing = Arc::new(pricing);
        self
    }

    pub fn with_shipment_activity(mut self, options: ActivityOptions) -> Self {
        self.shipment_activity = options;
        self
    }

    pub fn with_billing_activity(mut self, options: ActivityOptions) -> Self {
        self.billing_activity = options;
        self
    }
}

/// Shipment and billing processes, started on behalf of orders.
struct Children<S: EventStore + Clone + 'static> {
    shipments: Registry<ShipmentProcess>,
    shipment_journal: Journal<S, Shipment>,
    shipment_context: Arc<ShipmentContext>,
    charges: Registry<BillingProcess>,
    charge_journal: Journal<S, Charge>,
    billing_context: Arc<BillingContext>,
}

impl<S: EventStore + Clone + 'static> Children<S> {
    async fn start_shipment(&self, request: &LaunchRequest) -> Result<ProcessHandle<ShipmentProcess>> {
        self.shipments
            .start(
                &self.shipment_journal,
                request.shipment_id(),
                &self.shipment_context,
                false,
                |shipment| shipment.start(request.shipment_id(), &request.order_id, request.items.clone()),
            )
            .await
    }

    async fn start_charge(&self, id: &AggregateId, input: ChargeInput) -> Result<ProcessHandle<BillingProcess>> {
        self.charges
            .start(&self.charge_journal, id, &self.billing_context, false, |charge| {
                charge.start(id, input)
            })
            .await
    }
}

#[async_trait]
impl<S: EventStore + Clone + 'static> FulfillmentLauncher for Children<S> {
    async fn launch(&self, request: LaunchRequest, parent: mpsc::UnboundedSender<OrderMessage>) -> Result<()> {
        let shipment = self.start_shipment(&request).await?;
        let input = ChargeInput {
            customer_id: request.customer_id.clone(),
            reference: request.fulfillment_id.to_string(),
            items: request.items.clone(),
        };
        let charge = self.start_charge(&request.fulfillment_id, input).await?;

        let fulfillment_id = request.fulfillment_id.clone();
        forward(shipment, parent.clone(), move |outcome| OrderMessage::ShipmentFinished {
            fulfillment_id,
            outcome,
        });
        let fulfillment_id = request.fulfillment_id;
        forward(charge, parent, move |outcome| OrderMessage::BillingFinished {
            fulfillment_id,
            outcome,
        });
        Ok(())
    }
}

/// Hands a child's outcome to its parent once the child finishes.
fn forward<P, F>(child: ProcessHandle<P>, parent: mpsc::UnboundedSender<OrderMessage>, wrap: F)
where
    P: Process,
    F: FnOnce(Outcome<P>) -> OrderMessage + Send + 'static,
{
    tokio::spawn(async move {
        match child.wait().await {
            // A stopped parent picks the outcome up again when it resumes.
            Ok(outcome) => {
                let _ = parent.send(wrap(outcome));
            }
            Err(err) => tracing::debug!(id = %child.id(), error = %err, "Child stopped before finishing"),
        }
    });
}

struct Inner<S: EventStore + Clone + 'static> {
    store: S,
    orders: Registry<OrderProcess>,
    order_journal: Journal<S, Order>,
    order_context: Arc<OrderContext>,
    children: Arc<Children<S>>,
}

/// Hosts every process over one event store.
///
/// Cloning is cheap; clones share the running processes.
pub struct Engine<S: EventStore + Clone + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: EventStore + Clone + 'static> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: EventStore + Clone + 'static> Engine<S> {
    pub fn new(store: S, services: Services) -> Self {
        let children = Arc::new(Children {
            shipments: Registry::new(),
            shipment_journal: Journal::new(store.clone()),
            shipment_context: Arc::new(ShipmentContext {
                carrier: services.carrier,
                activity: services.shipment_activity,
            }),
            charges: Registry::new(),
            charge_journal: Journal::new(store.clone()),
            billing_context: Arc::new(BillingContext {
                fraud_check: services.fraud_check,
                pricing: services.pricing,
                activity: services.billing_activity,
            }),
        });
        let order_context = Arc::new(OrderContext {
            allocator: services.allocator,
            launcher: children.clone(),
            activity: services.shipment_activity,
        });

        Self {
            inner: Arc::new(Inner {
                orders: Registry::new(),
                order_journal: Journal::new(store.clone()),
                order_context,
                children,
                store,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Starts the order process for `order_id`.
    ///
    /// Fails with `AlreadyStarted` if an order with this id exists, finished
    /// or not.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn start_order(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<Item>,
    ) -> Result<ProcessHandle<OrderProcess>> {
        let inner = &self.inner;
        inner
            .orders
            .start(&inner.order_journal, &order_id, &inner.order_context, true, |order| {
                order.start(&order_id, customer_id, items)
            })
            .await
    }

    /// Returns the order process for `order_id`.
    pub async fn order(&self, order_id: &AggregateId) -> Result<ProcessHandle<OrderProcess>> {
        let inner = &self.inner;
        inner
            .orders
            .attach(&inner.order_journal, order_id, &inner.order_context)
            .await?
            .ok_or_else(|| not_found::<OrderProcess>(order_id))
    }

    /// Delivers the customer's decision to an order.
    #[tracing::instrument(skip(self))]
    pub async fn signal_order(&self, order_id: &AggregateId, action: CustomerAction) -> Result<()> {
        self.order(order_id)
            .await?
            .signal(OrderMessage::CustomerAction(action))
    }

    /// Returns the shipment process for `shipment_id`.
    pub async fn shipment(&self, shipment_id: &AggregateId) -> Result<ProcessHandle<ShipmentProcess>> {
        let children = &self.inner.children;
        children
            .shipments
            .attach(&children.shipment_journal, shipment_id, &children.shipment_context)
            .await?
            .ok_or_else(|| not_found::<ShipmentProcess>(shipment_id))
    }

    /// Delivers a carrier update to a shipment.
    #[tracing::instrument(skip(self))]
    pub async fn signal_shipment(&self, shipment_id: &AggregateId, status: ShipmentStatus) -> Result<()> {
        self.shipment(shipment_id)
            .await?
            .signal(ShipmentMessage::CarrierUpdate(status))
    }

    /// Runs a standalone billing process and waits for its result.
    ///
    /// The charge is filed under `input.reference`; charging the same
    /// reference again returns the first run's result.
    #[tracing::instrument(skip(self, input), fields(reference = %input.reference))]
    pub async fn charge(&self, input: ChargeInput) -> Result<ChargeResult> {
        input.validate()?;

        let id = AggregateId::new(input.reference.clone());
        let handle = self.inner.children.start_charge(&id, input).await?;
        handle
            .wait()
            .await?
            .map_err(|failure| WorkflowError::side_effect("charge", failure))
    }

    /// Resumes every process recorded in the store.
    ///
    /// Children come first so that resumed orders attach to live shipments
    /// and charges. Finished processes replay, finish at once and are
    /// dropped again; queries replay them on demand. Returns the number of
    /// processes loaded.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let query = EventQuery::new().event_types(vec![
            "ShipmentStarted".to_string(),
            "ChargeStarted".to_string(),
            "OrderStarted".to_string(),
        ]);
        let mut starts = self.inner.store.query_events(query).await?;
        starts.sort_by_key(|envelope| match envelope.event_type.as_str() {
            "OrderStarted" => 1,
            _ => 0,
        });

        let children = &self.inner.children;
        let mut recovered = 0;
        for envelope in starts {
            match envelope.event_type.as_str() {
                "ShipmentStarted" => {
                    if let ShipmentEvent::ShipmentStarted(data) =
                        serde_json::from_value::<ShipmentEvent>(envelope.payload)? {
                        children
                            .shipments
                            .attach(&children.shipment_journal, &data.shipment_id, &children.shipment_context)
                            .await?;
                        recovered += 1;
                    }
                }
                "ChargeStarted" => {
                    if let ChargeEvent::ChargeStarted(data) =
                        serde_json::from_value::<ChargeEvent>(envelope.payload)? {
                        children
                            .charges
                            .attach(&children.charge_journal, &data.charge_id, &children.billing_context)
                            .await?;
                        recovered += 1;
                    }
                }
                _ => {
                    if let OrderEvent::OrderStarted(data) =
                        serde_json::from_value::<OrderEvent>(envelope.payload)? {
                        self.order(&data.order_id).await?;
                        recovered += 1;
                    }
                }
            }
        }

        tracing::info!(
            recovered,
            live_orders = self.inner.orders.live_count().await,
            live_shipments = children.shipments.live_count().await,
            live_charges = children.charges.live_count().await,
            "Recovered processes"
        );
        Ok(recovered)
    }

    /// Stops every process task. Recorded progress is kept in the store.
    pub async fn shutdown(&self) {
        self.inner.orders.abort_all().await;
        self.inner.children.shipments.abort_all().await;
        self.inner.children.charges.abort_all().await;
        tracing::info!("Engine stopped");
    }
}

fn not_found<P: Process>(id: &AggregateId) -> WorkflowError {
    WorkflowError::NotFound {
        kind: P::kind(),
        id: id.to_string(),
    }
}
