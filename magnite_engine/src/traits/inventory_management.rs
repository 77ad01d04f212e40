use thiserror::Error;

use crate::db_types::{Product, ProductId};

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("There is an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("Product {product_id} has insufficient stock. Requested {requested}, available {available}")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}

/// The stock contract. `stock_quantity` is the authoritative count of sellable units, and these two
/// operations are the only way the engine mutates it.
///
/// Both operations are row-scoped: reservations against different products never block each other, and two
/// reservations against the same product serialise on the row, so the loser of a race always sees the true
/// remaining count.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Fetches the product, or `None` if it does not exist.
    async fn fetch_product(&self, product_id: ProductId) -> Result<Option<Product>, InventoryError>;

    /// Atomically checks `stock_quantity >= quantity` and decrements it in the same statement. The check and
    /// the decrement are never split by a concurrent reservation.
    ///
    /// Fails with [`InventoryError::InsufficientStock`] when the remaining stock cannot cover the request,
    /// and [`InventoryError::ProductNotFound`] when the product has vanished from the catalog. On failure
    /// nothing is changed.
    async fn reserve_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError>;

    /// Compensating increment for a reservation that will never be finalised. Releasing against a product
    /// that has been removed from the catalog logs a warning and succeeds; the compensation itself never
    /// fails.
    async fn release_stock(&self, product_id: ProductId, quantity: i64) -> Result<(), InventoryError>;
}
