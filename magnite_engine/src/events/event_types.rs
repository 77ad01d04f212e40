use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Transaction};

/// Fired once per order, when a payment success webhook lands and the order transitions to `Paid`. Replays
/// of the same webhook do not fire it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    /// The completed payment attempt that settled the order.
    pub transaction: Transaction,
}

impl OrderPaidEvent {
    pub fn new(order: Order, transaction: Transaction) -> Self {
        Self { order, transaction }
    }
}

/// Fired when an order is taken out of circulation without being paid: an explicit customer cancellation,
/// or a stale checkout superseded by a new cart. Stock for the order has been released by the time the
/// event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.order_status;
        Self { order, status }
    }
}
