//! Order and fulfillment status, and customer actions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The externally visible status of an order.
///
/// Never stored: it is derived from the order's fulfillments every time it
/// is read.
/// ```text
/// Pending ──► AwaitingFulfillmentDecision ──► CustomerActionRequired ──► Fulfilling ──► Completed
///                                                     │                      │
///                                                     └──► Cancelled         └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    /// Items not yet allocated to fulfillments.
    #[default]
    Pending,

    /// Fulfillments exist but the customer has not been asked yet.
    AwaitingFulfillmentDecision,

    /// Waiting for the customer to amend or cancel.
    CustomerActionRequired,

    /// Shipments and charges are running.
    Fulfilling,

    /// Every shipment was delivered (terminal).
    Completed,

    /// A fulfillment or the order itself failed (terminal).
    Failed,

    /// The customer cancelled before fulfillment began (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AwaitingFulfillmentDecision => "awaitingFulfillmentDecision",
            OrderStatus::CustomerActionRequired => "customerActionRequired",
            OrderStatus::Fulfilling => "fulfilling",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one fulfillment within an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    CustomerActionRequired,
    /// Shipment and charge launched.
    Processing,
    /// Shipment delivered.
    Completed,
    Failed,
    Cancelled,
}

impl FulfillmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FulfillmentStatus::Completed | FulfillmentStatus::Failed | FulfillmentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::CustomerActionRequired => "customerActionRequired",
            FulfillmentStatus::Processing => "processing",
            FulfillmentStatus::Completed => "completed",
            FulfillmentStatus::Failed => "failed",
            FulfillmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The customer's answer at the fulfillment decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerAction {
    /// Proceed with fulfillment.
    Amend,
    /// Stop the order before anything is launched.
    Cancel,
}

impl CustomerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerAction::Amend => "amend",
            CustomerAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for CustomerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amend" => Ok(CustomerAction::Amend),
            "cancel" => Ok(CustomerAction::Cancel),
            other => Err(ValidationError::UnknownAction(other.to_string())),
        }
    }
}
