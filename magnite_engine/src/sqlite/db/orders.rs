use log::trace;
use mgn_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{CartLine, Order, OrderId, OrderItem, OrderStatusType, PaymentStatusType},
    helpers::new_order_number,
    order_objects::OrderQueryFilter,
    traits::PaymentGatewayError,
};

/// Inserts a new order row with a freshly drawn order number and `Pending`/`Pending` status. This is not
/// atomic on its own; embed it in a transaction together with the item inserts and stock reservations, and
/// pass `&mut *tx` as the connection argument.
///
/// Two unique constraints can fire here: the one-pending-order-per-customer guard (a concurrent intake for
/// the same customer won the race) and the order-number index (a random collision). Both are mapped to
/// [`PaymentGatewayError::Conflict`] because the remedy is the same — rerun the intake, which re-runs the
/// dedup check and draws a fresh number.
pub(crate) async fn insert_order(
    customer_id: i64,
    total_price: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let order_number = new_order_number();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_number, customer_id, total_price) VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(&order_number)
    .bind(customer_id)
    .bind(total_price)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => PaymentGatewayError::Conflict,
        _ => PaymentGatewayError::from(e),
    })?;
    trace!("📝️ Order {order_number} inserted with id {}", order.id);
    Ok(order)
}

/// Inserts the line items for a freshly created order. `lines` must already carry the catalog-verified
/// frozen prices.
pub(crate) async fn insert_order_items(
    order_id: OrderId,
    lines: &[CartLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4)
                RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The customer's open checkout, if any. The partial unique index guarantees there is at most one.
pub async fn fetch_pending_order_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "SELECT * FROM orders WHERE customer_id = $1 AND order_status = 'Pending' AND payment_status = 'Pending'",
    )
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Every order the customer has placed, newest first. Orders are never deleted, so this is their full
/// purchase history.
pub async fn fetch_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are returned newest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(order_number);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if query.order_status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.order_status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("order_status IN ({status_clause})"));
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push(format!("payment_status = '{payment_status}'"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Conditionally transitions an order's status pair. The update applies only while the order's current
/// `payment_status` is one of `expected`; `None` means the order exists but a concurrent writer transitioned
/// it first (or the precondition never held), and nothing was changed.
pub(crate) async fn transition_order(
    order_id: OrderId,
    order_status: OrderStatusType,
    payment_status: PaymentStatusType,
    expected: &[PaymentStatusType],
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let expected_clause = expected.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
    let sql = format!(
        "UPDATE orders SET order_status = $1, payment_status = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND payment_status IN ({expected_clause}) RETURNING *"
    );
    let order = sqlx::query_as(&sql)
        .bind(order_status.to_string())
        .bind(payment_status.to_string())
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}
