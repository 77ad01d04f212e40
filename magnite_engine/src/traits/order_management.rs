use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, OrderItem, Transaction},
    order_objects::OrderQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum OrderQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderQueryError {
    fn from(e: sqlx::Error) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}

/// The read side of the order store. Nothing here mutates state; ownership checks against the results are the
/// caller's job (the server enforces them before handing data to a client).
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches a single order by its internal id. `None` if no such order exists.
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderQueryError>;

    /// Fetches the line items for an order. Empty if the order does not exist.
    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, OrderQueryError>;

    /// All orders ever placed by the customer, newest first. Orders are never deleted, so this is the
    /// customer's full history.
    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError>;

    /// Admin search across all orders. An empty filter returns everything, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError>;

    /// All payment attempts recorded for the customer, newest first.
    async fn fetch_transactions_for_customer(&self, customer_id: i64) -> Result<Vec<Transaction>, OrderQueryError>;

    /// The payment attempts for one order, oldest first (the order's payment history).
    async fn fetch_transactions_for_order(&self, order_id: OrderId) -> Result<Vec<Transaction>, OrderQueryError>;

    /// Looks an attempt up by the processor's intent id.
    async fn fetch_transaction_by_intent_id(&self, intent_id: &str) -> Result<Option<Transaction>, OrderQueryError>;
}
