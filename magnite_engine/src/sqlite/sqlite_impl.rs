use std::fmt::Debug;

use log::{debug, error, trace, warn};
use sqlx::SqlitePool;

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OrderValidationError,
        PaymentOutcome,
        PaymentStatusType,
        Product,
        ProductId,
        Transaction,
        TransactionStatus,
    },
    order_objects::OrderQueryFilter,
    sqlite::db::{self, new_pool, orders, products, transactions},
    traits::{
        CancellationResult,
        InventoryError,
        InventoryManagement,
        OrderCreationResult,
        OrderManagement,
        OrderQueryError,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PaymentOutcomeResult,
    },
};

/// The Sqlite-backed storage engine. It is cheap to clone; clones share the underlying connection pools.
///
/// Every mutating flow acquires its own transaction, does all its reads and writes inside it, and commits
/// once. The dedup check, the stock reservations and the order insert of a single intake therefore either
/// all land or none do.
///
/// Mutating transactions run on a dedicated single-connection pool, so concurrent writers queue on the
/// connection instead of racing each other into `SQLITE_BUSY` once their snapshots go stale. Reads run
/// concurrently on the main pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    write_pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").field("url", &self.url).finish()
    }
}

/// SQLITE_BUSY inside the intake transaction carries the same remedy as losing the pending-order race:
/// rerun the intake. Stock errors pass through untouched.
fn busy_to_conflict(e: InventoryError) -> PaymentGatewayError {
    match e {
        InventoryError::DatabaseError(msg) if msg.contains("database is locked") => PaymentGatewayError::Conflict,
        other => other.into(),
    }
}

impl SqliteDatabase {
    /// Creates a new database api object, using the database URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        let write_pool = new_pool(url, 1).await?;
        Ok(Self { url: url.to_string(), pool, write_pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Option<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn reserve_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError> {
        let mut tx = self.write_pool.begin().await?;
        let _ = products::reserve_stock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn release_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError> {
        let mut tx = self.write_pool.begin().await?;
        products::release_stock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        trace!("🗃️ {} order(s) fetched for customer {customer_id}", orders.len());
        Ok(orders)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        trace!("🗃️ Order query returned {} row(s)", orders.len());
        Ok(orders)
    }

    async fn fetch_transactions_for_customer(&self, customer_id: i64) -> Result<Vec<Transaction>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let transactions = transactions::fetch_transactions_for_customer(customer_id, &mut conn).await?;
        Ok(transactions)
    }

    async fn fetch_transactions_for_order(&self, order_id: OrderId) -> Result<Vec<Transaction>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let transactions = transactions::fetch_transactions_for_order(order_id, &mut conn).await?;
        Ok(transactions)
    }

    async fn fetch_transaction_by_intent_id(&self, intent_id: &str) -> Result<Option<Transaction>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let transaction = transactions::fetch_transaction_by_intent_id(intent_id, &mut conn).await?;
        Ok(transaction)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order_with_reservation(&self, order: NewOrder) -> Result<OrderCreationResult, PaymentGatewayError> {
        let customer_id = order.customer_id;
        let mut tx = self.write_pool.begin().await?;
        let mut superseded = None;
        if let Some(open_order) = orders::fetch_pending_order_for_customer(customer_id, &mut tx).await? {
            let existing_items = orders::fetch_order_items(open_order.id, &mut tx).await?;
            if order.is_equivalent(&open_order, &existing_items) {
                debug!(
                    "🗃️ Customer {customer_id} re-submitted their open checkout {}. Returning it unchanged.",
                    open_order.order_number
                );
                tx.commit().await?;
                return Ok(OrderCreationResult { order: open_order, items: existing_items, created: false, superseded });
            }
            trace!(
                "🗃️ Customer {customer_id} has open checkout {} with a different cart. Superseding it.",
                open_order.order_number
            );
            let cancelled = orders::transition_order(
                open_order.id,
                OrderStatusType::Cancelled,
                PaymentStatusType::Cancelled,
                &[PaymentStatusType::Pending],
                &mut tx,
            )
            .await?
            .ok_or(PaymentGatewayError::Conflict)?;
            transactions::fail_open_transactions_for_order(open_order.id, &mut tx).await?;
            for item in &existing_items {
                products::release_stock(item.product_id, item.quantity, &mut tx).await?;
            }
            superseded = Some(cancelled);
        }
        let lines = order.sorted_items();
        for line in &lines {
            let product = products::fetch_product(line.product_id, &mut tx)
                .await?
                .ok_or(InventoryError::ProductNotFound(line.product_id))?;
            if product.price_per_unit != line.price {
                return Err(OrderValidationError::PriceMismatch {
                    product_id: line.product_id,
                    expected: product.price_per_unit,
                    given: line.price,
                }
                .into());
            }
            products::reserve_stock(line.product_id, line.quantity, &mut tx).await.map_err(busy_to_conflict)?;
        }
        let new_order = orders::insert_order(customer_id, order.total_price, &mut tx).await?;
        let items = orders::insert_order_items(new_order.id, &lines, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {} created for customer {customer_id}. {} line(s), total {}.",
            new_order.order_number,
            items.len(),
            new_order.total_price
        );
        Ok(OrderCreationResult { order: new_order, items, created: true, superseded })
    }

    async fn begin_payment_attempt(
        &self,
        order_id: OrderId,
        customer_id: i64,
        currency: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        let mut tx = self.write_pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
        if order.customer_id != customer_id {
            warn!("🗃️ Customer {customer_id} tried to open a payment attempt for order {order_id}, which is not theirs");
            return Err(PaymentGatewayError::Forbidden(order_id));
        }
        let payable = order.order_status == OrderStatusType::Pending && order.payment_status.is_cancellable();
        if !payable {
            debug!(
                "🗃️ Order {order_id} is {}/{} and cannot take a new payment attempt",
                order.order_status, order.payment_status
            );
            return Err(PaymentGatewayError::NotPayable(order_id));
        }
        let stale = transactions::fail_open_transactions_for_order(order_id, &mut tx).await?;
        if !stale.is_empty() {
            debug!("🗃️ Superseded {} earlier open attempt(s) for order {order_id}", stale.len());
        }
        let transaction =
            transactions::insert_transaction(order_id, customer_id, order.total_price, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    async fn attach_payment_intent(
        &self,
        transaction_id: i64,
        intent_id: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        let mut tx = self.write_pool.begin().await?;
        let transaction = transactions::attach_intent_id(transaction_id, intent_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::TransactionNotPending(transaction_id))?;
        tx.commit().await?;
        debug!("🗃️ Intent {intent_id} attached to transaction {transaction_id}");
        Ok(transaction)
    }

    async fn fail_payment_attempt(&self, transaction_id: i64) -> Result<Transaction, PaymentGatewayError> {
        let mut tx = self.write_pool.begin().await?;
        let transaction = transactions::update_transaction_status(
            transaction_id,
            TransactionStatus::Failed,
            TransactionStatus::Pending,
            &mut tx,
        )
        .await?
        .ok_or(PaymentGatewayError::TransactionNotPending(transaction_id))?;
        tx.commit().await?;
        debug!("🗃️ Transaction {transaction_id} marked failed before any outcome arrived");
        Ok(transaction)
    }

    async fn apply_payment_outcome(
        &self,
        intent_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<PaymentOutcomeResult, PaymentGatewayError> {
        let mut tx = self.write_pool.begin().await?;
        let current = transactions::fetch_transaction_by_intent_id(intent_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::UnknownTransaction(intent_id.to_string()))?;
        let target = match outcome {
            PaymentOutcome::Succeeded => TransactionStatus::Completed,
            PaymentOutcome::Failed => TransactionStatus::Failed,
        };
        let updated =
            transactions::update_transaction_status(current.id, target, TransactionStatus::Pending, &mut tx).await?;
        let Some(transaction) = updated else {
            // The attempt already left `Pending`, so a previous delivery won. Same outcome means the
            // processor is replaying; a different one is stale news about a superseded or dead attempt.
            let result = if current.payment_status == target {
                debug!("🗃️ Intent {intent_id} already settled as {target}. Acknowledging the replay.");
                PaymentOutcomeResult::Replayed { transaction: current }
            } else {
                let reason = format!(
                    "intent {intent_id} reported {target}, but the attempt is already {}",
                    current.payment_status
                );
                warn!("🗃️ {reason}. Ignoring the outcome.");
                PaymentOutcomeResult::Ignored { transaction: current, reason }
            };
            tx.commit().await?;
            return Ok(result);
        };
        let order_id = transaction.order_id;
        let (order_status, payment_status) = match outcome {
            PaymentOutcome::Succeeded => (OrderStatusType::Paid, PaymentStatusType::Paid),
            PaymentOutcome::Failed => (OrderStatusType::Pending, PaymentStatusType::Failed),
        };
        let expected = [PaymentStatusType::Pending, PaymentStatusType::Failed];
        let order = orders::transition_order(order_id, order_status, payment_status, &expected, &mut tx).await?;
        let result = match order {
            Some(order) => {
                debug!(
                    "🗃️ Intent {intent_id} settled transaction {} as {target}. Order {} is now {}/{}.",
                    transaction.id, order.order_number, order.order_status, order.payment_status
                );
                PaymentOutcomeResult::Applied { order, transaction }
            },
            None => {
                // Cancellation fails open attempts in the same transaction, so a settled attempt whose
                // order cannot transition means the books are out of step. Keep the attempt settled and
                // flag the order for a manual adjustment.
                let reason = format!("order {order_id} is no longer awaiting an outcome for intent {intent_id}");
                error!("🗃️ {reason}. The attempt was settled as {target}; reconcile the order manually.");
                PaymentOutcomeResult::Ignored { transaction, reason }
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn cancel_order_for_customer(
        &self,
        order_id: OrderId,
        customer_id: i64,
    ) -> Result<CancellationResult, PaymentGatewayError> {
        let mut tx = self.write_pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
        if order.customer_id != customer_id {
            warn!("🗃️ Customer {customer_id} tried to cancel order {order_id}, which is not theirs");
            return Err(PaymentGatewayError::Forbidden(order_id));
        }
        if order.payment_status == PaymentStatusType::Paid {
            debug!("🗃️ Order {order_id} has already been paid. Refusing to cancel it.");
            return Err(PaymentGatewayError::NotCancellable(order_id));
        }
        if order.order_status == OrderStatusType::Cancelled {
            debug!("🗃️ Order {order_id} is already cancelled. Nothing to do.");
            tx.commit().await?;
            return Ok(CancellationResult { order, newly_cancelled: false, released: Vec::new() });
        }
        let cancelled = orders::transition_order(
            order_id,
            OrderStatusType::Cancelled,
            PaymentStatusType::Cancelled,
            &[PaymentStatusType::Pending, PaymentStatusType::Failed],
            &mut tx,
        )
        .await?
        .ok_or(PaymentGatewayError::Conflict)?;
        transactions::fail_open_transactions_for_order(order_id, &mut tx).await?;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in &items {
            products::release_stock(item.product_id, item.quantity, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order {} cancelled. Stock for {} line(s) went back on the shelf.",
            cancelled.order_number,
            items.len()
        );
        Ok(CancellationResult { order: cancelled, newly_cancelled: true, released: items })
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.write_pool.close().await;
        self.pool.close().await;
        Ok(())
    }
}
