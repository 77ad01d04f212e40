use std::fmt::Display;

use chrono::{DateTime, Utc};
use magnite_engine::db_types::{
    CartLine,
    NewOrder,
    Order,
    OrderItem,
    OrderStatusType,
    PaymentStatusType,
    Transaction,
    TransactionStatus,
};
use mgn_common::Money;
use serde::{Deserialize, Serialize};

/// One line of an incoming cart. `product` is the catalog product id; `price` is the unit price the
/// storefront last displayed, which intake verifies against the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineRequest {
    pub product: i64,
    pub quantity: i64,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartLineRequest>,
    pub total_price: Money,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, customer_id: i64) -> NewOrder {
        let items = self.items.into_iter().map(|l| CartLine::new(l.product, l.quantity, l.price)).collect();
        NewOrder::new(customer_id, items, self.total_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: i64,
}

/// The order representation the storefront client renders. Field names (`order_date`, `items[].product`)
/// match the existing client, so they are views rather than the engine types themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub order_number: String,
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub total_price: Money,
    pub order_date: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn from_order(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id.inner(),
            order_number: order.order_number,
            order_status: order.order_status,
            payment_status: order.payment_status,
            total_price: order.total_price,
            order_date: order.created_at,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: i64,
    pub product: i64,
    pub quantity: i64,
    pub price: Money,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        Self { id: item.id, product: item.product_id.0, quantity: item.quantity, price: item.price }
    }
}

/// What the checkout page polls while the processor confirms a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusView {
    pub order_id: i64,
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
}

impl From<&Order> for PaymentStatusView {
    fn from(order: &Order) -> Self {
        Self { order_id: order.id.inner(), order_status: order.order_status, payment_status: order.payment_status }
    }
}

/// A payment attempt, minus the internal customer id the caller already knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: i64,
    pub order_id: i64,
    pub amount: Money,
    pub currency: String,
    pub payment_status: TransactionStatus,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            order_id: tx.order_id.inner(),
            amount: tx.amount,
            currency: tx.currency,
            payment_status: tx.payment_status,
            payment_intent_id: tx.payment_intent_id,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// What the client needs to hand to the processor's JS widget. `clientSecret` is camelCase because that is
/// what the widget reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResult {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}
