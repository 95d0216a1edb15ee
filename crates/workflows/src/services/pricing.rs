//! Pricing lookup collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{Item, ItemPrice, Money, Sku};

use crate::error::{Result, WorkflowError};

/// Prices one item line: cost, tax and shipping for the whole quantity.
#[async_trait]
pub trait Pricing: Send + Sync {
    async fn price(&self, item: &Item) -> Result<ItemPrice>;
}

/// Simulated catalogue.
///
/// Unit prices are derived from the SKU, so the same SKU always costs the
/// same: cost between $35.00 and $119.99, tax at 20% of cost, shipping
/// between $5.00 and $9.99 per unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPricing;

impl SimulatedPricing {
    fn sku_hash(sku: &Sku) -> u64 {
        // FNV-1a
        sku.as_str()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
            })
    }
}

#[async_trait]
impl Pricing for SimulatedPricing {
    async fn price(&self, item: &Item) -> Result<ItemPrice> {
        let hash = Self::sku_hash(&item.sku);
        let unit_cost = Money::from_cents(3500 + (hash % 8500) as i64);
        let unit_shipping = Money::from_cents(500 + ((hash >> 32) % 500) as i64);

        let cost = unit_cost.times(item.quantity);
        Ok(ItemPrice {
            cost,
            tax: cost.percent(20),
            shipping: unit_shipping.times(item.quantity),
        })
    }
}

/// Price table keyed by SKU, holding unit prices.
#[derive(Debug, Clone, Default)]
pub struct FixedPricing {
    prices: HashMap<Sku, ItemPrice>,
}

impl FixedPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, sku: impl Into<Sku>, unit: ItemPrice) -> Self {
        self.prices.insert(sku.into(), unit);
        self
    }
}

#[async_trait]
impl Pricing for FixedPricing {
    async fn price(&self, item: &Item) -> Result<ItemPrice> {
        let unit = self.prices.get(&item.sku).ok_or_else(|| {
            WorkflowError::side_effect("price_items", format!("no price for sku {}", item.sku))
        })?;
        Ok(ItemPrice {
            cost: unit.cost.times(item.quantity),
            tax: unit.tax.times(item.quantity),
            shipping: unit.shipping.times(item.quantity),
        })
    }
}
