//! Order process.
//!
//! Allocates the ordered items to warehouses, waits for the customer to
//! amend or cancel, then launches one shipment and one billing run per
//! fulfillment and collects their outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    ChargeResult, CustomerAction, CustomerId, Failure, Item, Order, OrderResult, ShipmentResult,
};
use tokio::sync::mpsc;

use crate::activity::{self, ActivityOptions};
use crate::error::Result;
use crate::process::{EventOf, Process, Step, StepContext};
use crate::services::Allocator;

/// Everything needed to start the children of one fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub fulfillment_id: AggregateId,
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub items: Vec<Item>,
}

impl LaunchRequest {
    /// Shipments are addressed by their fulfillment's id.
    pub fn shipment_id(&self) -> &AggregateId {
        &self.fulfillment_id
    }
}

/// Starts the shipment and billing run of a fulfillment and reports their
/// outcomes back to the order's mailbox.
///
/// Launching the same fulfillment again must attach to the children already
/// running rather than start new ones.
#[async_trait]
pub trait FulfillmentLauncher: Send + Sync {
    async fn launch(
        &self,
        request: LaunchRequest,
        parent: mpsc::UnboundedSender<OrderMessage>,
    ) -> Result<()>;
}

/// Collaborators of an order process.
pub struct OrderContext {
    pub allocator: Arc<dyn Allocator>,
    pub launcher: Arc<dyn FulfillmentLauncher>,
    pub activity: ActivityOptions,
}

/// Messages an order accepts.
#[derive(Debug, Clone)]
pub enum OrderMessage {
    /// The customer's decision on how to proceed.
    CustomerAction(CustomerAction),
    ShipmentFinished {
        fulfillment_id: AggregateId,
        outcome: std::result::Result<ShipmentResult, Failure>,
    },
    BillingFinished {
        fulfillment_id: AggregateId,
        outcome: std::result::Result<ChargeResult, Failure>,
    },
}

pub struct OrderProcess;

impl OrderProcess {
    fn result(order: &Order, id: &AggregateId) -> OrderResult {
        OrderResult {
            order_id: id.clone(),
            status: order.status(),
        }
    }

    fn launch_request(order: &Order, id: &AggregateId, fulfillment_id: &AggregateId) -> Option<LaunchRequest> {
        let fulfillment = order.fulfillment(fulfillment_id)?;
        Some(LaunchRequest {
            fulfillment_id: fulfillment_id.clone(),
            order_id: id.clone(),
            customer_id: order.customer_id().cloned().unwrap_or_default(),
            items: fulfillment.items().to_vec(),
        })
    }
}

impl Process for OrderProcess {
    type State = Order;
    type Message = OrderMessage;
    type Output = OrderResult;
    type Context = OrderContext;

    fn next_step(order: &Order, ctx: &StepContext<Self>) -> Step<Self> {
        if let Some(failure) = order.failure() {
            return Step::Finish(Err(failure.clone()));
        }
        let options = ctx.services.activity;

        if !order.is_allocated() {
            let allocator = ctx.services.allocator.clone();
            let order = order.clone();
            return Step::run("allocate", async move {
                let items = order.items().to_vec();
                let plan = activity::execute("allocate", &options, || allocator.allocate(&items)).await?;
                Ok(order.allocate(plan)?)
            });
        }

        if order.fulfillments().is_empty() || order.decision() == Some(CustomerAction::Cancel) {
            return Step::Finish(Ok(Self::result(order, &ctx.id)));
        }

        if order.decision().is_none() {
            return Step::Record(order.request_customer_action());
        }

        // One fulfillment per step, so every launch is recorded before the
        // next one starts.
        let next = order
            .unlaunched()
            .find_map(|f| Self::launch_request(order, &ctx.id, f.id()));
        if let Some(request) = next {
            let launcher = ctx.services.launcher.clone();
            let mailbox = ctx.mailbox.clone();
            let order = order.clone();
            return Step::run("launch_fulfillment", async move {
                let fulfillment_id = request.fulfillment_id.clone();
                let shipment_id = request.shipment_id().clone();
                match launcher.launch(request, mailbox).await {
                    Ok(()) => {
                        tracing::info!(%fulfillment_id, "Fulfillment launched");
                        Ok(order.launch(&fulfillment_id, shipment_id))
                    }
                    Err(err) => {
                        tracing::warn!(%fulfillment_id, error = %err, "Fulfillment launch failed");
                        Ok(order.launch_failed(&fulfillment_id, err.to_failure()))
                    }
                }
            });
        }

        if order.all_resolved() {
            return Step::Finish(Ok(Self::result(order, &ctx.id)));
        }
        Step::Await
    }

    fn on_message(order: &Order, message: OrderMessage) -> Vec<EventOf<Self>> {
        match message {
            OrderMessage::CustomerAction(action) => {
                let events = order.receive_action(action);
                if events.is_empty() {
                    tracing::debug!(action = action.as_str(), "Customer action ignored");
                }
                events
            }
            OrderMessage::ShipmentFinished {
                fulfillment_id,
                outcome,
            } => order.shipment_finished(&fulfillment_id, outcome),
            OrderMessage::BillingFinished {
                fulfillment_id,
                outcome,
            } => order.billing_finished(&fulfillment_id, outcome),
        }
    }

    fn on_failure(order: &Order, failure: Failure) -> Vec<EventOf<Self>> {
        order.fail(failure)
    }

    /// Reattaches to the children of launched fulfillments that have not
    /// reported back yet.
    fn resume(order: &Order, ctx: &StepContext<Self>) {
        if order.failure().is_some() {
            return;
        }
        for fulfillment in order.fulfillments() {
            if !fulfillment.is_launched() || fulfillment.is_resolved() {
                continue;
            }
            let Some(request) = Self::launch_request(order, &ctx.id, fulfillment.id()) else {
                continue;
            };
            let launcher = ctx.services.launcher.clone();
            let mailbox = ctx.mailbox.clone();
            tokio::spawn(async move {
                let fulfillment_id = request.fulfillment_id.clone();
                if let Err(err) = launcher.launch(request, mailbox).await {
                    tracing::error!(%fulfillment_id, error = %err, "Failed to reattach fulfillment");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::process::{ProcessHandle, spawn};
    use crate::services::WarehouseAllocator;
    use domain::{ChargeOutcome, FulfillmentStatus, Invoice, Journal, OrderStatus};
    use event_store::InMemoryEventStore;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Records launches and reports scripted outcomes immediately.
    #[derive(Default)]
    struct ScriptedLauncher {
        launched: Mutex<Vec<LaunchRequest>>,
        /// Launches of fulfillment ids ending with this suffix fail.
        fail_suffix: Option<&'static str>,
    }

    impl ScriptedLauncher {
        fn launched(&self) -> Vec<LaunchRequest> {
            self.launched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl FulfillmentLauncher for ScriptedLauncher {
        async fn launch(
            &self,
            request: LaunchRequest,
            parent: mpsc::UnboundedSender<OrderMessage>,
        ) -> Result<()> {
            if let Some(suffix) = self.fail_suffix
                && request.fulfillment_id.as_str().ends_with(suffix)
            {
                return Err(WorkflowError::side_effect("launch", "no capacity"));
            }
            let fulfillment_id = request.fulfillment_id.clone();
            self.launched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            let invoice = Invoice {
                invoice_reference: fulfillment_id.to_string(),
                ..Default::default()
            };
            let _ = parent.send(OrderMessage::ShipmentFinished {
                fulfillment_id: fulfillment_id.clone(),
                outcome: Ok(ShipmentResult {
                    courier_reference: format!("COURIER-{fulfillment_id}"),
                }),
            });
            let _ = parent.send(OrderMessage::BillingFinished {
                fulfillment_id,
                outcome: Ok(ChargeResult::new(&invoice, &ChargeOutcome::approved())),
            });
            Ok(())
        }
    }

    async fn start(items: Vec<Item>, launcher: Arc<ScriptedLauncher>) -> ProcessHandle<OrderProcess> {
        let journal: Journal<_, Order> = Journal::new(InMemoryEventStore::new());
        let id = AggregateId::new("order123");
        let mut order = Order::default();
        let events = order
            .start(&id, CustomerId::new("customer123"), items)
            .unwrap();
        journal.record(&id, &mut order, events).await.unwrap();

        let context = OrderContext {
            allocator: Arc::new(WarehouseAllocator),
            launcher,
            activity: ActivityOptions::new(Duration::from_secs(1)),
        };
        spawn(journal, id, order, Arc::new(context))
    }

    fn two_items() -> Vec<Item> {
        vec![Item::new("test1", 1), Item::new("test2", 3)]
    }

    #[tokio::test]
    async fn waits_for_a_decision_after_allocating() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let handle = start(two_items(), launcher.clone()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let order = handle.state();
        assert_eq!(order.fulfillments().len(), 2);
        assert!(order.action_requested());
        assert_eq!(order.status(), OrderStatus::CustomerActionRequired);
        assert!(launcher.launched().is_empty());
    }

    #[tokio::test]
    async fn amend_launches_every_fulfillment() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let handle = start(two_items(), launcher.clone()).await;
        handle
            .signal(OrderMessage::CustomerAction(CustomerAction::Amend))
            .unwrap();

        let result = handle.wait().await.unwrap().unwrap();
        assert_eq!(result.status, OrderStatus::Completed);

        let launched = launcher.launched();
        assert_eq!(launched.len(), 2);
        assert_eq!(launched[0].fulfillment_id.as_str(), "order123:1");
        assert_eq!(launched[1].items, vec![Item::new("test2", 3)]);

        let order = handle.state();
        for fulfillment in order.fulfillments() {
            assert_eq!(order.fulfillment_status(fulfillment), FulfillmentStatus::Completed);
        }
    }

    #[tokio::test]
    async fn cancel_finishes_without_launching() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let handle = start(two_items(), launcher.clone()).await;
        handle
            .signal(OrderMessage::CustomerAction(CustomerAction::Cancel))
            .unwrap();

        let result = handle.wait().await.unwrap().unwrap();
        assert_eq!(result.status, OrderStatus::Cancelled);
        assert!(launcher.launched().is_empty());
    }

    #[tokio::test]
    async fn no_items_completes_immediately() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let handle = start(vec![], launcher).await;

        let result = handle.wait().await.unwrap().unwrap();
        assert_eq!(result.status, OrderStatus::Completed);
        assert!(!handle.state().action_requested());
    }

    #[tokio::test]
    async fn launch_failure_stays_with_its_fulfillment() {
        let launcher = Arc::new(ScriptedLauncher {
            fail_suffix: Some(":2"),
            ..Default::default()
        });
        let handle = start(two_items(), launcher.clone()).await;
        handle
            .signal(OrderMessage::CustomerAction(CustomerAction::Amend))
            .unwrap();

        let result = handle.wait().await.unwrap().unwrap();
        assert_eq!(result.status, OrderStatus::Failed);

        let launched: Vec<String> = launcher
            .launched()
            .iter()
            .map(|r| r.fulfillment_id.to_string())
            .collect();
        assert_eq!(launched, vec!["order123:1"]);

        let order = handle.state();
        assert!(order.failure().is_none());

        let first = order.fulfillment(&AggregateId::new("order123:1")).unwrap();
        assert!(first.is_launched());
        assert_eq!(order.fulfillment_status(first), FulfillmentStatus::Completed);
        assert!(first.charge().is_some());

        let second = order.fulfillment(&AggregateId::new("order123:2")).unwrap();
        assert!(second.launch_failed());
        assert_eq!(order.fulfillment_status(second), FulfillmentStatus::Failed);
        assert_eq!(
            second.failure().map(|f| f.kind),
            Some(domain::FailureKind::SideEffect)
        );
    }

    #[tokio::test]
    async fn every_launch_failing_still_finishes() {
        let launcher = Arc::new(ScriptedLauncher {
            fail_suffix: Some(""),
            ..Default::default()
        });
        let handle = start(two_items(), launcher.clone()).await;
        handle
            .signal(OrderMessage::CustomerAction(CustomerAction::Amend))
            .unwrap();

        let result = handle.wait().await.unwrap().unwrap();
        assert_eq!(result.status, OrderStatus::Failed);
        assert!(launcher.launched().is_empty());
    }
}
