//! Billing domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::failure::Failure;

use super::{ChargeInput, ChargeOutcome, Invoice};

/// Events recorded in a charge's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChargeEvent {
    /// The billing process was started.
    ChargeStarted(ChargeStartedData),

    /// The invoice was priced.
    InvoiceGenerated(InvoiceGeneratedData),

    /// The fraud check ran and the charge was approved or declined.
    CustomerCharged(CustomerChargedData),

    /// Validation or a side effect failed.
    ChargeFailed(ChargeFailedData),
}

impl DomainEvent for ChargeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ChargeEvent::ChargeStarted(_) => "ChargeStarted",
            ChargeEvent::InvoiceGenerated(_) => "InvoiceGenerated",
            ChargeEvent::CustomerCharged(_) => "CustomerCharged",
            ChargeEvent::ChargeFailed(_) => "ChargeFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeStartedData {
    pub charge_id: AggregateId,
    pub input: ChargeInput,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceGeneratedData {
    pub invoice: Invoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerChargedData {
    pub outcome: ChargeOutcome,
    pub charged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeFailedData {
    pub failure: Failure,
    pub failed_at: DateTime<Utc>,
}

impl ChargeEvent {
    pub fn charge_started(charge_id: AggregateId, input: ChargeInput) -> Self {
        ChargeEvent::ChargeStarted(ChargeStartedData {
            charge_id,
            input,
            started_at: Utc::now(),
        })
    }

    pub fn invoice_generated(invoice: Invoice) -> Self {
        ChargeEvent::InvoiceGenerated(InvoiceGeneratedData { invoice })
    }

    pub fn customer_charged(outcome: ChargeOutcome) -> Self {
        ChargeEvent::CustomerCharged(CustomerChargedData {
            outcome,
            charged_at: Utc::now(),
        })
    }

    pub fn charge_failed(failure: Failure) -> Self {
        ChargeEvent::ChargeFailed(ChargeFailedData {
            failure,
            failed_at: Utc::now(),
        })
    }
}
