use thiserror::Error;

use crate::{
    db_types::{NewOrder, OrderId, OrderValidationError, PaymentOutcome, Transaction},
    traits::{
        data_objects::{CancellationResult, OrderCreationResult, PaymentOutcomeResult},
        InventoryError,
        InventoryManagement,
        OrderManagement,
        OrderQueryError,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the order lifecycle engine: the
/// mutating flows that must each run as one atomic storage transaction.
///
/// This behaviour includes:
/// * Order intake: dedup against the customer's open checkout, stock reservation, order creation.
/// * Payment attempt bookkeeping for the bridge to the external processor.
/// * Applying asynchronous payment outcomes exactly once.
/// * Compensating cancellation.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement + InventoryManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a validated new order and, in a single atomic transaction:
    /// * looks up the customer's existing `Pending`/`Pending` order. If the incoming cart is equivalent
    ///   (order-independent compare), returns it unchanged with `created = false` — the idempotent dedup
    ///   short-circuit.
    /// * otherwise cancels the stale order (releasing its reserved stock and failing its open payment
    ///   attempts) and records it in `superseded`.
    /// * verifies each cart line's price against the live catalog and reserves its stock; any
    ///   [`InventoryError::InsufficientStock`] or price drift aborts the whole transaction with nothing
    ///   reserved.
    /// * inserts the order (`Pending`/`Pending`, fresh order number) and its frozen-price line items.
    ///
    /// A concurrent intake for the same customer surfaces as [`PaymentGatewayError::Conflict`]; callers are
    /// expected to re-run the whole call (the dedup check included), which is what
    /// [`OrderFlowApi`](crate::OrderFlowApi) does.
    async fn create_order_with_reservation(&self, order: NewOrder) -> Result<OrderCreationResult, PaymentGatewayError>;

    /// Opens a payment attempt for the order: inserts a `Pending` transaction for the order's total with no
    /// intent id yet. Any previous attempt still marked `Pending` is superseded (marked `Failed`) in the same
    /// transaction, keeping at most one active attempt per order.
    ///
    /// The order must belong to `customer_id` and still be awaiting payment
    /// ([`PaymentGatewayError::NotPayable`] otherwise).
    async fn begin_payment_attempt(
        &self,
        order_id: OrderId,
        customer_id: i64,
        currency: &str,
    ) -> Result<Transaction, PaymentGatewayError>;

    /// Records the processor's intent id against a `Pending` attempt. After this returns, a webhook for the
    /// intent has a transaction to land on; the bridge must not hand the payment handle to the client before
    /// this has committed.
    async fn attach_payment_intent(&self, transaction_id: i64, intent_id: &str)
        -> Result<Transaction, PaymentGatewayError>;

    /// Marks a `Pending` attempt `Failed`, typically because the outbound call to the processor failed and
    /// there will never be a webhook for it.
    async fn fail_payment_attempt(&self, transaction_id: i64) -> Result<Transaction, PaymentGatewayError>;

    /// Applies a payment outcome delivered by the processor's webhook, exactly once, in one transaction:
    ///
    /// * The transaction is looked up by intent id ([`PaymentGatewayError::UnknownTransaction`] if it is not
    ///   there yet — the processor will retry).
    /// * The transition is conditional on the transaction still being `Pending`. A replay that finds the
    ///   outcome already applied returns [`PaymentOutcomeResult::Replayed`]; an outcome that no longer
    ///   applies (e.g. success after cancellation already failed the attempt) returns
    ///   [`PaymentOutcomeResult::Ignored`].
    /// * Success completes the transaction and moves the order to `Paid`/`Paid`; its stock reservation
    ///   becomes final by virtue of no further change. Failure fails the transaction and marks the order's
    ///   payment `Failed`, leaving it payable again.
    async fn apply_payment_outcome(
        &self,
        intent_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<PaymentOutcomeResult, PaymentGatewayError>;

    /// Cancels an order on behalf of a customer. In one transaction: the order is moved to
    /// `Cancelled`/`Cancelled`, its non-terminal payment attempts are failed, and each line item's stock is
    /// released.
    ///
    /// * [`PaymentGatewayError::OrderNotFound`] if the order does not exist.
    /// * [`PaymentGatewayError::Forbidden`] if it belongs to another customer.
    /// * [`PaymentGatewayError::NotCancellable`] if payment has already completed.
    /// * Cancelling an already-cancelled order is a successful no-op (`newly_cancelled = false`, nothing
    ///   released), so retries never double-credit stock.
    async fn cancel_order_for_customer(
        &self,
        order_id: OrderId,
        customer_id: i64,
    ) -> Result<CancellationResult, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("There is an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Validation(#[from] OrderValidationError),
    #[error("{0}")]
    Inventory(#[from] InventoryError),
    #[error("{0}")]
    Query(#[from] OrderQueryError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} does not belong to the requesting customer")]
    Forbidden(OrderId),
    #[error("Order {0} has already been paid and can no longer be cancelled")]
    NotCancellable(OrderId),
    #[error("Order {0} is not awaiting payment")]
    NotPayable(OrderId),
    #[error("No transaction matches payment intent {0}")]
    UnknownTransaction(String),
    #[error("Transaction {0} is not awaiting a payment outcome")]
    TransactionNotPending(i64),
    #[error("Payment intent {0} is already recorded against another transaction")]
    DuplicatePaymentIntent(String),
    #[error("A concurrent write to the same order or stock row won the race. Retry the operation")]
    Conflict,
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        // SQLITE_BUSY and its snapshot variant both surface as "database is locked". They carry the same
        // remedy as losing the pending-order race, so they share the Conflict variant and the caller's
        // retry loop.
        if let sqlx::Error::Database(de) = &e {
            if de.message().contains("database is locked") || de.message().contains("database table is locked") {
                return PaymentGatewayError::Conflict;
            }
        }
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
