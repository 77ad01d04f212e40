//! Unified read-side API over the order store.

use std::fmt::Debug;

use log::trace;

use crate::{
    db_types::{Order, OrderId, OrderItem, Transaction},
    order_objects::{CustomerOrders, OrderQueryFilter, OrderWithItems},
    traits::{OrderManagement, OrderQueryError},
};

/// The `OrderQueryApi` answers questions about orders and payment attempts without ever mutating them.
/// Ownership is not enforced here; callers decide which customer's data they are allowed to hand out.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi ({:?})", self.db)
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches a single order. `None` if no such order exists.
    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderQueryError> {
        self.db.fetch_order(order_id).await
    }

    /// Fetches an order together with its line items.
    pub async fn order_with_items(&self, order_id: OrderId) -> Result<Option<OrderWithItems>, OrderQueryError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// The line items for one order. Empty if the order does not exist.
    pub async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, OrderQueryError> {
        self.db.fetch_order_items(order_id).await
    }

    /// Fetches the customer's full order history, newest first, together with the lifetime sum of their
    /// order totals.
    pub async fn orders_for_customer(&self, customer_id: i64) -> Result<CustomerOrders, OrderQueryError> {
        let orders = self.db.fetch_orders_for_customer(customer_id).await?;
        let total_orders = orders.iter().map(|o| o.total_price).sum();
        trace!("📝️ Customer {customer_id} has {} order(s), lifetime total {total_orders}", orders.len());
        Ok(CustomerOrders { customer_id, total_orders, orders })
    }

    /// Admin search across all orders. An empty filter returns everything.
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError> {
        trace!("📝️ Searching orders: {query}");
        self.db.search_orders(query).await
    }

    /// All payment attempts for the customer, newest first.
    pub async fn transactions_for_customer(&self, customer_id: i64) -> Result<Vec<Transaction>, OrderQueryError> {
        self.db.fetch_transactions_for_customer(customer_id).await
    }

    /// The payment history for one order, oldest attempt first.
    pub async fn transactions_for_order(&self, order_id: OrderId) -> Result<Vec<Transaction>, OrderQueryError> {
        self.db.fetch_transactions_for_order(order_id).await
    }
}
