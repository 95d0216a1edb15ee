//! Shipment process: book with the carrier, then notify the customer as
//! carrier updates move the shipment to dispatched and delivered.

use std::sync::Arc;

use domain::{Failure, Shipment, ShipmentEvent, ShipmentResult, ShipmentStatus};

use crate::activity::{self, ActivityOptions};
use crate::process::{EventOf, Process, Step, StepContext};
use crate::services::Carrier;

/// Collaborators of a shipment process.
pub struct ShipmentContext {
    pub carrier: Arc<dyn Carrier>,
    pub activity: ActivityOptions,
}

/// Messages a shipment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentMessage {
    /// The carrier reports a new status.
    CarrierUpdate(ShipmentStatus),
}

pub struct ShipmentProcess;

impl ShipmentProcess {
    /// Stages a customer is notified of, in order.
    const STAGES: [ShipmentStatus; 3] = [
        ShipmentStatus::Booked,
        ShipmentStatus::Dispatched,
        ShipmentStatus::Delivered,
    ];
}

impl Process for ShipmentProcess {
    type State = Shipment;
    type Message = ShipmentMessage;
    type Output = ShipmentResult;
    type Context = ShipmentContext;

    fn next_step(shipment: &Shipment, ctx: &StepContext<Self>) -> Step<Self> {
        if let Some(failure) = shipment.failure() {
            return Step::Finish(Err(failure.clone()));
        }

        let carrier = ctx.services.carrier.clone();
        let options = ctx.services.activity;
        let shipment_id = ctx.id.clone();
        let Some(order_id) = shipment.order_id().cloned() else {
            return Step::Finish(Err(Failure::validation("OrderID is required")));
        };

        if !shipment.is_booked() {
            let items = shipment.items().to_vec();
            return Step::run("book_shipment", async move {
                let reference = activity::execute("book_shipment", &options, || {
                    carrier.book_shipment(&shipment_id, &order_id, &items)
                })
                .await?;
                Ok(vec![ShipmentEvent::shipment_booked(reference)])
            });
        }

        for stage in Self::STAGES {
            if shipment.status() < stage {
                return Step::Await;
            }
            if !shipment.has_notified(stage) {
                return Step::run("notify", async move {
                    activity::execute("notify", &options, || {
                        carrier.notify(&shipment_id, &order_id, stage)
                    })
                    .await?;
                    Ok(vec![ShipmentEvent::notification_sent(stage)])
                });
            }
        }

        if !shipment.is_completed() {
            return Step::Record(vec![ShipmentEvent::shipment_completed()]);
        }

        match shipment.outcome() {
            Some(outcome) => Step::Finish(outcome),
            None => Step::Await,
        }
    }

    fn on_message(shipment: &Shipment, message: ShipmentMessage) -> Vec<EventOf<Self>> {
        match message {
            ShipmentMessage::CarrierUpdate(status) => shipment.update_status(status),
        }
    }

    fn on_failure(shipment: &Shipment, failure: Failure) -> Vec<EventOf<Self>> {
        if shipment.is_finished() {
            return vec![];
        }
        vec![ShipmentEvent::shipment_failed(failure)]
    }
}
