//! Billing process: price the items, generate the invoice, then charge the
//! customer unless the fraud check declines.

use std::sync::Arc;

use domain::{Charge, ChargeEvent, ChargeOutcome, ChargeResult, Failure, Invoice};

use crate::activity::{self, ActivityOptions};
use crate::process::{EventOf, Process, Step, StepContext};
use crate::services::{FraudCheck, Pricing};

/// Collaborators of a billing process.
pub struct BillingContext {
    pub fraud_check: Arc<dyn FraudCheck>,
    pub pricing: Arc<dyn Pricing>,
    pub activity: ActivityOptions,
}

/// Billing runs to completion without outside input.
#[derive(Debug, Clone, Copy)]
pub enum BillingMessage {}

pub struct BillingProcess;

impl Process for BillingProcess {
    type State = Charge;
    type Message = BillingMessage;
    type Output = ChargeResult;
    type Context = BillingContext;

    fn next_step(charge: &Charge, ctx: &StepContext<Self>) -> Step<Self> {
        if let Some(failure) = charge.failure() {
            return Step::Finish(Err(failure.clone()));
        }
        let Some(input) = charge.input().cloned() else {
            return Step::Finish(Err(Failure::validation("charge input is missing")));
        };
        let options = ctx.services.activity;

        let Some(invoice) = charge.invoice().cloned() else {
            let pricing = ctx.services.pricing.clone();
            return Step::run("generate_invoice", async move {
                input.validate()?;
                let mut prices = Vec::with_capacity(input.items.len());
                for item in &input.items {
                    let price =
                        activity::execute("price_item", &options, || pricing.price(item)).await?;
                    prices.push(price);
                }
                let invoice = Invoice::accumulate(input.reference.clone(), prices);
                tracing::debug!(reference = %invoice.invoice_reference, total = %invoice.total, "Invoice generated");
                Ok(vec![ChargeEvent::invoice_generated(invoice)])
            });
        };

        if charge.outcome().is_none() {
            let fraud_check = ctx.services.fraud_check.clone();
            return Step::run("charge_customer", async move {
                let declined = activity::execute("fraud_check", &options, || {
                    fraud_check.check(&input.customer_id, invoice.total)
                })
                .await?;

                count_charge(fraud_check.as_ref(), declined);
                let outcome = if declined {
                    tracing::info!(customer_id = %input.customer_id, "Charge declined by fraud check");
                    ChargeOutcome::declined()
                } else {
                    ChargeOutcome::approved()
                };
                Ok(vec![ChargeEvent::customer_charged(outcome)])
            });
        }

        match charge.result() {
            Some(result) => Step::Finish(Ok(result)),
            None => Step::Finish(Err(Failure::infrastructure(
                "charge outcome recorded without an invoice",
            ))),
        }
    }

    fn on_message(_charge: &Charge, message: BillingMessage) -> Vec<EventOf<Self>> {
        match message {}
    }

    fn on_failure(charge: &Charge, failure: Failure) -> Vec<EventOf<Self>> {
        if charge.failure().is_some() || charge.outcome().is_some() {
            return vec![];
        }
        vec![ChargeEvent::charge_failed(failure)]
    }
}

/// Counts a completed charge. Only checks that actually ran count as fraud
/// checks.
fn count_charge(fraud_check: &dyn FraudCheck, declined: bool) {
    metrics::counter!("charge_total").increment(1);
    if declined {
        metrics::counter!("charge_declined_total").increment(1);
    }
    if fraud_check.is_remote() {
        metrics::counter!("fraudcheck_total").increment(1);
        if declined {
            metrics::counter!("fraudcheck_declined_total").increment(1);
        }
    }
}
