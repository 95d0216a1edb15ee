//! Read model views.

pub mod order_status;
pub mod shipment_list;

pub use order_status::{FulfillmentReport, OrderStatusReport, OrderStatusView, ShipmentReport};
pub use shipment_list::{ShipmentListView, ShipmentPage, ShipmentSummary};
