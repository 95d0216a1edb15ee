//! Invoice calculation and charge results.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value_objects::{CustomerId, Item, Money, validate_items};

/// What to bill: a customer, the reference the invoice is filed under, and
/// the items being charged for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeInput {
    pub customer_id: CustomerId,
    #[serde(rename = "orderReference")]
    pub reference: String,
    pub items: Vec<Item>,
}

impl ChargeInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_id.is_blank() {
            return Err(ValidationError::Required("CustomerID"));
        }
        if self.reference.trim().is_empty() {
            return Err(ValidationError::Required("OrderReference"));
        }
        if self.items.is_empty() {
            return Err(ValidationError::NoItems("invoice"));
        }
        validate_items(&self.items)
    }
}

/// Price of one item line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemPrice {
    pub cost: Money,
    pub tax: Money,
    pub shipping: Money,
}

/// Totals billed for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_reference: String,
    pub sub_total: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Invoice {
    /// Builds an invoice from priced lines, in order.
    ///
    /// The total is a running total: after each line is added to the
    /// sub-total, tax and shipping, the accumulated sum of all three is
    /// added to `total`. For two lines this is
    /// `total = (c1+t1+s1) + (c1+c2 + t1+t2 + s1+s2)`.
    pub fn accumulate(
        reference: impl Into<String>,
        prices: impl IntoIterator<Item = ItemPrice>,
    ) -> Self {
        let mut invoice = Invoice {
            invoice_reference: reference.into(),
            ..Default::default()
        };

        for price in prices {
            invoice.sub_total += price.cost;
            invoice.tax += price.tax;
            invoice.shipping += price.shipping;
            invoice.total += invoice.sub_total + invoice.tax + invoice.shipping;
        }

        invoice
    }
}

/// Result of the charge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeOutcome {
    pub success: bool,
    pub auth_code: String,
}

impl ChargeOutcome {
    pub const AUTH_CODE: &'static str = "1234";

    pub fn approved() -> Self {
        Self {
            success: true,
            auth_code: Self::AUTH_CODE.to_string(),
        }
    }

    pub fn declined() -> Self {
        Self {
            success: false,
            auth_code: String::new(),
        }
    }
}

/// Everything a finished billing process reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResult {
    pub invoice_reference: String,
    pub sub_total: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    pub success: bool,
    pub auth_code: String,
}

impl ChargeResult {
    pub fn new(invoice: &Invoice, outcome: &ChargeOutcome) -> Self {
        Self {
            invoice_reference: invoice.invoice_reference.clone(),
            sub_total: invoice.sub_total,
            tax: invoice.tax,
            shipping: invoice.shipping,
            total: invoice.total,
            success: outcome.success,
            auth_code: outcome.auth_code.clone(),
        }
    }
}
