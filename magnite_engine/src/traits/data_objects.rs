use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, Transaction};

/// What came out of an intake attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreationResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// False when the intake matched the customer's existing pending order and short-circuited.
    pub created: bool,
    /// The stale pending order that this intake cancelled and replaced, if any.
    pub superseded: Option<Order>,
}

/// What applying a webhook outcome did. The reconciler is idempotent, so "nothing, and that is fine" is a
/// first-class result rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentOutcomeResult {
    /// The outcome transitioned the transaction (and, for successes, the order).
    Applied { order: Order, transaction: Transaction },
    /// The transaction was already in the state this outcome produces. Replay of a delivered webhook.
    Replayed { transaction: Transaction },
    /// The outcome no longer applies, e.g. a success arriving for an attempt that cancellation already
    /// failed. Logged and acknowledged.
    Ignored { transaction: Transaction, reason: String },
}

impl PaymentOutcomeResult {
    pub fn transaction(&self) -> &Transaction {
        match self {
            PaymentOutcomeResult::Applied { transaction, .. } |
            PaymentOutcomeResult::Replayed { transaction } |
            PaymentOutcomeResult::Ignored { transaction, .. } => transaction,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            PaymentOutcomeResult::Applied { order, .. } => Some(order),
            _ => None,
        }
    }
}

/// What a cancellation did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationResult {
    pub order: Order,
    /// False when the order was already cancelled and this call was an idempotent no-op.
    pub newly_cancelled: bool,
    /// The line items whose stock was put back. Empty for the no-op case, so retries never double-credit.
    pub released: Vec<OrderItem>,
}
