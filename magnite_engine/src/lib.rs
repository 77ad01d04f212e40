//! Magnite Order Engine
//!
//! The order engine is the core of the Magnite store backend: it takes carts in, reserves stock for them
//! atomically, tracks payment attempts against an external payment processor, applies the processor's
//! asynchronous outcomes exactly once, and unwinds everything cleanly when an order is cancelled. This
//! library contains that core logic. It is processor-agnostic; the HTTP server and the processor bridge
//! live in their own crates.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). Sqlite is the supported backend. You should never
//!    need to access the database directly; use the public API instead. The exception is the data types used
//!    in the database, which are defined in the [`mod@db_types`] module and are public.
//! 2. The engine public API ([`mod@api`]). This provides the public-facing functionality: order intake,
//!    payment flows and queries. A backend acts as storage for the engine by implementing the traits in
//!    [`mod@traits`].
//!
//! The engine also emits events at the interesting points of an order's life. When an order is paid, an
//! [`events::OrderPaidEvent`] fires; when one is cancelled or superseded, an [`events::OrderAnnulledEvent`].
//! A simple actor framework lets you hook into these events and perform custom actions.
mod api;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    order_flow_api::OrderFlowApi,
    order_objects,
    order_query_api::OrderQueryApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    InventoryManagement,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
};
