use std::{cmp::Ordering, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mgn_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Carts bigger than this per line are rejected as malformed before any price or stock check runs.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

//--------------------------------------      ProductId       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub i64);

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------       OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub i64);

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl OrderId {
    pub fn inner(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and is awaiting a payment outcome. Stock is reserved.
    Pending,
    /// The order is paid and being prepared by fulfilment. The engine never writes this state itself.
    Processing,
    /// Payment completed in full. Terminal for the engine.
    Paid,
    /// The order was cancelled by the customer or superseded by a new checkout. Terminal.
    Cancelled,
    /// Marked unservable by an operator. The engine never writes this state itself.
    Failed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(Self::Pending),
            "Processing" | "processing" => Ok(Self::Processing),
            "Paid" | "paid" => Ok(Self::Paid),
            "Cancelled" | "cancelled" => Ok(Self::Cancelled),
            "Failed" | "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//-------------------------------------- PaymentStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatusType {
    /// No payment outcome yet. The order can still be paid or cancelled.
    Pending,
    /// The processor confirmed payment in full. Terminal; cancellation is refused from here.
    Paid,
    /// The most recent payment attempt failed. The order remains payable.
    Failed,
    /// The order was cancelled before payment completed. Terminal.
    Cancelled,
}

impl PaymentStatusType {
    /// True for the states from which a customer may still cancel the order.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, PaymentStatusType::Pending | PaymentStatusType::Failed)
    }
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatusType::Pending => write!(f, "Pending"),
            PaymentStatusType::Paid => write!(f, "Paid"),
            PaymentStatusType::Failed => write!(f, "Failed"),
            PaymentStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(Self::Pending),
            "Paid" | "paid" => Ok(Self::Paid),
            "Failed" | "failed" => Ok(Self::Failed),
            "Cancelled" | "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatusType::Pending
        })
    }
}

//-------------------------------------- TransactionStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// The attempt was initiated and the engine is waiting for the processor's webhook.
    Pending,
    /// The processor reported success for this attempt. Terminal.
    Completed,
    /// The attempt failed, was abandoned, or was invalidated by cancellation. Terminal.
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(Self::Pending),
            "Completed" | "completed" => Ok(Self::Completed),
            "Failed" | "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to Pending");
            TransactionStatus::Pending
        })
    }
}

//--------------------------------------   PaymentOutcome     ---------------------------------------------------------
/// The two payment outcomes the processor can report for an intent. Webhook event types outside this set are
/// acknowledged at the boundary and never reach the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Succeeded => write!(f, "succeeded"),
            PaymentOutcome::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------        Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular storefront customer. May act on their own orders only.
    User,
    /// Back-office staff. May read and search every order.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
/// A catalog product. The engine owns nothing here except `stock_quantity`, which it decrements on reservation
/// and increments on release. Everything else belongs to the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub stock_quantity: i64,
    pub price_per_unit: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Globally unique, opaque, assigned at creation. What customers see on receipts.
    pub order_number: String,
    pub customer_id: i64,
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    /// Sum of the line items' `quantity * price`, fixed at creation and never recomputed.
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending_checkout(&self) -> bool {
        self.order_status == OrderStatusType::Pending && self.payment_status == PaymentStatusType::Pending
    }
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
/// One line of an order. `price` is the unit price frozen when the order was created; later catalog price
/// changes do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: i64,
    pub amount: Money,
    pub currency: String,
    pub payment_status: TransactionStatus,
    /// The processor's intent id. Null until the outbound intent call has succeeded; unique once set, so a
    /// webhook matches at most one attempt.
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      CartLine        ---------------------------------------------------------
/// One line of an incoming cart, priced at what the client last displayed to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Money,
}

impl CartLine {
    pub fn new<P: Into<ProductId>>(product_id: P, quantity: i64, price: Money) -> Self {
        Self { product_id: product_id.into(), quantity, price }
    }

    fn sort_key(&self) -> (ProductId, i64, Money) {
        (self.product_id, self.quantity, self.price)
    }
}

//-------------------------------------- OrderValidationError ---------------------------------------------------------
/// Cart problems that are rejected before any mutation happens. All of them are recoverable by the client
/// resubmitting corrected data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Quantity {quantity} for product {product_id} is out of range")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
    #[error("Price for product {product_id} has changed (cart says {given}, catalog says {expected})")]
    PriceMismatch { product_id: ProductId, expected: Money, given: Money },
    #[error("Cart total {given} does not match the sum of its lines ({expected})")]
    TotalMismatch { expected: Money, given: Money },
}

//--------------------------------------      NewOrder        ---------------------------------------------------------
/// An incoming checkout: the customer, the cart lines as the client displayed them, and the total the client
/// claims. Prices here are *claims* that intake verifies against the live catalog before freezing them.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i64,
    pub items: Vec<CartLine>,
    pub total_price: Money,
}

impl NewOrder {
    pub fn new(customer_id: i64, items: Vec<CartLine>, total_price: Money) -> Self {
        Self { customer_id, items, total_price }
    }

    /// Structural validation only. Catalog-dependent checks (price drift, stock) happen inside the intake
    /// transaction.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.items.is_empty() {
            return Err(OrderValidationError::EmptyCart);
        }
        for line in &self.items {
            if line.quantity < 1 || line.quantity > MAX_LINE_QUANTITY {
                return Err(OrderValidationError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
        }
        let expected = self
            .items
            .iter()
            .try_fold(Money::default(), |acc, l| l.price.checked_line_total(l.quantity).map(|t| acc + t))
            .ok_or(OrderValidationError::TotalMismatch { expected: Money::default(), given: self.total_price })?;
        if expected != self.total_price {
            return Err(OrderValidationError::TotalMismatch { expected, given: self.total_price });
        }
        Ok(())
    }

    /// The cart lines sorted by (product, quantity, price). Intake reserves stock in this order so that two
    /// overlapping carts always touch product rows in the same sequence, and the dedup comparison is
    /// order-independent.
    pub fn sorted_items(&self) -> Vec<CartLine> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        items
    }

    /// True if this cart is a resubmission of `order`: same total and the same (product, quantity, price)
    /// multiset, regardless of line ordering. Price comparisons are exact at cent resolution, which is what
    /// the storefront's sub-cent tolerance collapses to after parsing.
    pub fn is_equivalent(&self, order: &Order, existing_items: &[OrderItem]) -> bool {
        if self.customer_id != order.customer_id || self.total_price != order.total_price {
            return false;
        }
        if self.items.len() != existing_items.len() {
            return false;
        }
        let mine = self.sorted_items();
        let mut theirs: Vec<(ProductId, i64, Money)> =
            existing_items.iter().map(|i| (i.product_id, i.quantity, i.price)).collect();
        theirs.sort_by(|a, b| match a.0.cmp(&b.0) {
            Ordering::Equal => match a.1.cmp(&b.1) {
                Ordering::Equal => a.2.cmp(&b.2),
                other => other,
            },
            other => other,
        });
        mine.iter().zip(theirs.iter()).all(|(m, t)| m.sort_key() == *t)
    }
}
