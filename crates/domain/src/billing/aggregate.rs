//! Charge aggregate implementation.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::error::DomainError;
use crate::failure::Failure;

use super::{ChargeEvent, ChargeInput, ChargeOutcome, ChargeResult, Invoice};

/// One billing run: invoice, then charge.
///
/// The input is recorded as given; it is validated by the first step of
/// the process, so a bad input inside an order becomes a recorded failure
/// rather than a rejected start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Charge {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    input: Option<ChargeInput>,

    invoice: Option<Invoice>,

    outcome: Option<ChargeOutcome>,

    failure: Option<Failure>,
}

impl Aggregate for Charge {
    type Event = ChargeEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Charge"
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
            ChargeEvent::ChargeStarted(data) => {
                self.id = Some(data.charge_id);
                self.input = Some(data.input);
            }
            ChargeEvent::InvoiceGenerated(data) => self.invoice = Some(data.invoice),
            ChargeEvent::CustomerCharged(data) => self.outcome = Some(data.outcome),
            ChargeEvent::ChargeFailed(data) => self.failure = Some(data.failure),
        }
    }
}

impl SnapshotCapable for Charge {}

impl Charge {
    pub fn input(&self) -> Option<&ChargeInput> {
        self.input.as_ref()
    }

    pub fn invoice(&self) -> Option<&Invoice> {
        self.invoice.as_ref()
    }

    pub fn outcome(&self) -> Option<&ChargeOutcome> {
        self.outcome.as_ref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// The combined result once the customer has been charged.
    pub fn result(&self) -> Option<ChargeResult> {
        match (&self.invoice, &self.outcome) {
            (Some(invoice), Some(outcome)) => Some(ChargeResult::new(invoice, outcome)),
            _ => None,
        }
    }

    /// Starts a billing run. Input is recorded unvalidated.
    pub fn start(
        &self,
        charge_id: &AggregateId,
        input: ChargeInput,
    ) -> Result<Vec<ChargeEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::AlreadyStarted {
                aggregate_type: Self::aggregate_type(),
                id: charge_id.to_string(),
            });
        }
        Ok(vec![ChargeEvent::charge_started(charge_id.clone(), input)])
    }
}
