//! # Storage backend contracts.
//!
//! This module defines the interface contracts that a database backend must implement to drive the order
//! lifecycle engine.
//!
//! ## Traits
//! * [`PaymentGatewayDatabase`] is the highest level of behaviour: the atomic order-lifecycle flows (intake
//!   with deduplication, payment attempts, webhook outcome application, cancellation). Every method is a
//!   single storage transaction, which is what makes the flows safe to run from many server instances at
//!   once.
//! * [`InventoryManagement`] is the stock contract: row-scoped conditional decrement and compensating
//!   increment on product stock counts.
//! * [`OrderManagement`] provides the read paths: orders, their line items, transactions, and the admin
//!   search facility.
mod data_objects;
mod inventory_management;
mod order_management;
mod payment_gateway_database;

pub use data_objects::{CancellationResult, OrderCreationResult, PaymentOutcomeResult};
pub use inventory_management::{InventoryError, InventoryManagement};
pub use order_management::{OrderManagement, OrderQueryError};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
