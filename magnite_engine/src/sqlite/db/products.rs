use log::{trace, warn};
use mgn_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Product, ProductId},
    traits::InventoryError,
};

/// Inserts a product row, or refreshes its name, stock and price if it already exists. The catalog service
/// owns product data; this is its write path into the engine's store (and the seeding path for tests).
pub async fn upsert_product(
    product_id: ProductId,
    name: &str,
    stock_quantity: i64,
    price_per_unit: Money,
    conn: &mut SqliteConnection,
) -> Result<Product, sqlx::Error> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (id, name, stock_quantity, price_per_unit) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = excluded.name,
                stock_quantity = excluded.stock_quantity,
                price_per_unit = excluded.price_per_unit,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(name)
    .bind(stock_quantity)
    .bind(price_per_unit)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Catalog price change. Prices already frozen into order items are not touched.
pub async fn set_product_price(
    product_id: ProductId,
    price_per_unit: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        "UPDATE products SET price_per_unit = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(price_per_unit)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

/// Atomically reserves `quantity` units: the availability check and the decrement are a single conditional
/// UPDATE, so two reservations against the same product serialise on the row and the loser sees the true
/// remaining count. Returns the product row after the decrement.
///
/// No row matching the condition means either the stock cannot cover the request or the product is gone; a
/// follow-up read distinguishes the two so the caller can report which product is constrained.
pub async fn reserve_stock(
    product_id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, InventoryError> {
    let reserved: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stock_quantity >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match reserved {
        Some(product) => {
            trace!("📦️ Reserved {quantity} x product {product_id}. {} units remain.", product.stock_quantity);
            Ok(product)
        },
        None => match fetch_product(product_id, conn).await? {
            Some(product) => Err(InventoryError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            }),
            None => Err(InventoryError::ProductNotFound(product_id)),
        },
    }
}

/// Compensating increment for a reservation that will not be finalised. Releasing against a product that has
/// vanished from the catalog is a warned no-op rather than an error, since there is no stock row left to
/// correct.
pub async fn release_stock(
    product_id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        warn!("📦️ Tried to release {quantity} units of product {product_id}, but it no longer exists. Skipping.");
    } else {
        trace!("📦️ Released {quantity} x product {product_id} back to stock.");
    }
    Ok(())
}
