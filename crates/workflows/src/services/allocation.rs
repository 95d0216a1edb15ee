//! Allocation rule: splitting order items into fulfillments.

use async_trait::async_trait;
use domain::{Allocation, Item};

use crate::error::Result;

/// Decides which warehouse ships which items.
///
/// The returned allocations must partition the items exactly; the order
/// rejects a plan that does not.
#[async_trait]
pub trait Allocator: Send + Sync {
    async fn allocate(&self, items: &[Item]) -> Result<Vec<Allocation>>;
}

/// Ships every item line from its own warehouse: the first line from
/// `Warehouse A`, the second from `Warehouse B`, and so on.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarehouseAllocator;

impl WarehouseAllocator {
    fn location(index: usize) -> String {
        match u8::try_from(index) {
            Ok(offset) if offset < 26 => format!("Warehouse {}", char::from(b'A' + offset)),
            _ => format!("Warehouse {}", index + 1),
        }
    }
}

#[async_trait]
impl Allocator for WarehouseAllocator {
    async fn allocate(&self, items: &[Item]) -> Result<Vec<Allocation>> {
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| Allocation::new(Self::location(index), vec![item.clone()]))
            .collect())
    }
}
