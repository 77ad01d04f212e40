//! # Order engine public API
//!
//! The `api` module exposes the programmatic API of the order lifecycle engine. It is modular, so clients
//! can pick the functionality they need, and the read and write sides can be wired to different backends if
//! that ever becomes useful.
//!
//! * [`order_flow_api`] drives the mutating flows: order intake, payment attempts, webhook outcomes and
//!   cancellations.
//! * [`order_query_api`] answers read-only questions about orders and their payment attempts.
//! * [`order_objects`] holds the query filter and result objects shared by both.
//!
//! The pattern for using the APIs is the same everywhere: create an instance by supplying a database backend
//! that implements the traits the API needs.
//!
//! ```rust,ignore
//! use magnite_engine::{OrderQueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/store.db", 25).await?;
//! // SqliteDatabase implements OrderManagement
//! let api = OrderQueryApi::new(db);
//! let history = api.orders_for_customer(42).await?;
//! ```

pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
