//! Charge aggregate, invoice arithmetic and related types.

mod aggregate;
mod events;
mod invoice;

pub use aggregate::Charge;
pub use events::{
    ChargeEvent, ChargeFailedData, ChargeStartedData, CustomerChargedData, InvoiceGeneratedData,
};
pub use invoice::{ChargeInput, ChargeOutcome, ChargeResult, Invoice, ItemPrice};
