use log::trace;
use mgn_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, Transaction, TransactionStatus},
    traits::PaymentGatewayError,
};

/// Records a new `Pending` payment attempt for an order. The intent id stays null until the processor call
/// succeeds and [`attach_intent_id`] fills it in.
pub(crate) async fn insert_transaction(
    order_id: OrderId,
    customer_id: i64,
    amount: Money,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Transaction, sqlx::Error> {
    let transaction: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (order_id, customer_id, amount, currency) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(customer_id)
    .bind(amount)
    .bind(currency)
    .fetch_one(conn)
    .await?;
    trace!("💰️ Transaction {} opened for order {order_id} ({amount} {currency})", transaction.id);
    Ok(transaction)
}

pub async fn fetch_transaction(id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    let transaction = sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(transaction)
}

pub async fn fetch_transaction_by_intent_id(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let transaction = sqlx::query_as("SELECT * FROM transactions WHERE payment_intent_id = $1")
        .bind(intent_id)
        .fetch_optional(conn)
        .await?;
    Ok(transaction)
}

/// The attempts for one order, oldest first (its payment history).
pub async fn fetch_transactions_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let transactions = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(transactions)
}

pub async fn fetch_transactions_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let transactions =
        sqlx::query_as("SELECT * FROM transactions WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(customer_id)
            .fetch_all(conn)
            .await?;
    Ok(transactions)
}

/// Records the processor's intent id against a still-pending attempt that has no intent yet. `None` means
/// the attempt is no longer in that state (already attached, completed or failed). The intent id is unique
/// across all transactions; reusing one is [`PaymentGatewayError::DuplicatePaymentIntent`].
pub(crate) async fn attach_intent_id(
    transaction_id: i64,
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, PaymentGatewayError> {
    let transaction = sqlx::query_as(
        r#"
            UPDATE transactions SET payment_intent_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND payment_status = 'Pending' AND payment_intent_id IS NULL
            RETURNING *;
        "#,
    )
    .bind(intent_id)
    .bind(transaction_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            PaymentGatewayError::DuplicatePaymentIntent(intent_id.to_string())
        },
        _ => PaymentGatewayError::from(e),
    })?;
    Ok(transaction)
}

/// Conditionally transitions one attempt from `expected` to `new_status`. `None` means the attempt exists
/// but is not in `expected` any more — the caller decides whether that is a replay, a stale outcome, or an
/// error.
pub(crate) async fn update_transaction_status(
    transaction_id: i64,
    new_status: TransactionStatus,
    expected: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let transaction = sqlx::query_as(
        r#"
            UPDATE transactions SET payment_status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND payment_status = $3
            RETURNING *;
        "#,
    )
    .bind(new_status.to_string())
    .bind(transaction_id)
    .bind(expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(transaction)
}

/// Fails every still-pending attempt for an order. Called when the order is cancelled or superseded so that
/// no webhook can complete a payment for a dead order. Returns the attempts that were failed.
pub(crate) async fn fail_open_transactions_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let failed: Vec<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions SET payment_status = 'Failed', updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND payment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    if !failed.is_empty() {
        trace!("💰️ Failed {} open attempt(s) for order {order_id}", failed.len());
    }
    Ok(failed)
}
