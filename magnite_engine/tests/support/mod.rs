#![allow(dead_code)]
//! Shared scaffolding for the engine integration tests: throwaway databases, catalog seeding and cart
//! builders. Each test file gets its own database, so tests can run in parallel.

pub mod prepare_env;

use std::str::FromStr;

use log::*;
use magnite_engine::{
    db_types::{CartLine, NewOrder, Product, ProductId},
    events::EventProducers,
    sqlite::db::products::{set_product_price, upsert_product},
    InventoryManagement,
    OrderFlowApi,
    PaymentGatewayDatabase,
    SqliteDatabase,
};
use mgn_common::Money;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub async fn new_test_api() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    OrderFlowApi::new(db, EventProducers::default())
}

pub async fn tear_down(mut api: OrderFlowApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

// Seeding writes run in an explicit transaction: sqlite commits a streamed autocommit statement
// asynchronously, so without the awaited COMMIT the engine's next write transaction (on its own
// connection) can race ahead of the seed and miss the row.
pub async fn seed_product(db: &SqliteDatabase, id: i64, name: &str, stock: i64, price: &str) -> Product {
    let mut tx = db.pool().begin().await.expect("Error acquiring connection");
    let price = Money::from_str(price).unwrap();
    let product = upsert_product(ProductId(id), name, stock, price, &mut tx).await.expect("Error seeding product");
    tx.commit().await.expect("Error seeding product");
    product
}

pub async fn reprice(db: &SqliteDatabase, id: i64, price: &str) -> Product {
    let mut tx = db.pool().begin().await.expect("Error acquiring connection");
    let price = Money::from_str(price).unwrap();
    let product = set_product_price(ProductId(id), price, &mut tx)
        .await
        .expect("Error repricing product")
        .expect("Product should exist");
    tx.commit().await.expect("Error repricing product");
    product
}

pub async fn stock_of(db: &SqliteDatabase, id: i64) -> i64 {
    db.fetch_product(ProductId(id)).await.expect("Error fetching product").expect("Product should exist").stock_quantity
}

pub fn line(product_id: i64, quantity: i64, price: &str) -> CartLine {
    CartLine::new(product_id, quantity, Money::from_str(price).unwrap())
}

/// Builds a checkout whose claimed total is the true sum of its lines.
pub fn order_for(customer_id: i64, items: Vec<CartLine>) -> NewOrder {
    let total = items.iter().map(|l| l.price * l.quantity).sum();
    NewOrder::new(customer_id, items, total)
}
