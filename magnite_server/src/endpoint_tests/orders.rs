use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use log::debug;
use magnite_engine::{
    db_types::{Order, OrderId, OrderItem, OrderStatusType, PaymentStatusType, ProductId, Role},
    events::EventProducers,
    traits::{CancellationResult, OrderCreationResult},
    OrderFlowApi,
    OrderQueryApi,
};
use mgn_common::Money;
use serde_json::json;

use super::helpers::{get_request, issue_token, post_request};
use crate::{
    endpoint_tests::mocks::MockOrderStore,
    routes::{CancelOrderRoute, CreateOrderRoute, MyOrdersRoute, OrderByIdRoute, PaymentStatusRoute, SearchOrdersRoute},
};

#[actix_web::test]
async fn fetch_my_orders_no_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "Access token invalid or not provided");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDERS_JSON);
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token(1, vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    debug!("Calling /orders with invalid token {token}");
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. Access token signature is invalid. Signature has failed verification");
}

#[actix_web::test]
async fn fetch_an_order_of_mine() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders/1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDER_1_JSON);
}

#[actix_web::test]
async fn another_customers_order_looks_like_a_missing_one() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(5, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders/1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order 1"}"#);
}

#[actix_web::test]
async fn admins_may_fetch_any_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(99, vec![Role::User, Role::Admin]);
    let (status, body) = get_request(&token, "/orders/1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDER_1_JSON);
}

#[actix_web::test]
async fn payment_status_poll() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders/1/payment-status", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"order_id":1,"order_status":"paid","payment_status":"paid"}"#);
}

#[actix_web::test]
async fn order_search_needs_the_admin_role() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let err = get_request(&token, "/orders/search?customer_id=1", configure).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn admins_may_search_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(99, vec![Role::User, Role::Admin]);
    let (status, body) =
        get_request(&token, "/orders/search?customer_id=1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDERS_JSON);
}

#[actix_web::test]
async fn submitting_a_cart_creates_an_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) =
        post_request(&token, "/orders", cart_json(), configure_intake).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, ORDER_2_JSON);
}

#[actix_web::test]
async fn resubmitting_the_open_cart_returns_the_existing_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) =
        post_request(&token, "/orders", cart_json(), configure_intake_dedup).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDER_2_JSON);
}

#[actix_web::test]
async fn an_empty_cart_never_reaches_the_store() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let body = json!({ "items": [], "total_price": "0.00" });
    let (status, body) =
        post_request(&token, "/orders", body, configure_intake_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The order could not be accepted. The cart is empty"}"#);
}

#[actix_web::test]
async fn cancelling_an_order_releases_it() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) =
        post_request(&token, "/orders/2/cancel", json!({}), configure_cancel).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, CANCELLED_ORDER_JSON);
}

#[actix_web::test]
async fn cancelling_twice_is_a_quiet_no_op() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) =
        post_request(&token, "/orders/2/cancel", json!({}), configure_cancel_replay).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, CANCELLED_ORDER_JSON);
}

//--------------------------------------- Fixtures and wiring ---------------------------------------------------

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_orders_for_customer().returning(|_| Ok(orders_response()));
    store.expect_fetch_order().returning(|id| Ok(orders_response().into_iter().find(|o| o.id == id)));
    store.expect_fetch_order_items().returning(|id| Ok(items_response(id)));
    store.expect_search_orders().returning(|_| Ok(orders_response()));
    let query_api = OrderQueryApi::new(store);
    // The search route must be registered before the {id} route, same as in the server.
    cfg.service(SearchOrdersRoute::<MockOrderStore>::new())
        .service(MyOrdersRoute::<MockOrderStore>::new())
        .service(OrderByIdRoute::<MockOrderStore>::new())
        .service(PaymentStatusRoute::<MockOrderStore>::new())
        .app_data(web::Data::new(query_api));
}

fn configure_intake(cfg: &mut ServiceConfig) {
    intake_app(cfg, true)
}

// The mock carries no expectations at all, so a rejected cart that still reaches the store panics the test.
fn configure_intake_untouched(cfg: &mut ServiceConfig) {
    let store = MockOrderStore::new();
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(CreateOrderRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

fn configure_intake_dedup(cfg: &mut ServiceConfig) {
    intake_app(cfg, false)
}

fn intake_app(cfg: &mut ServiceConfig, created: bool) {
    let mut store = MockOrderStore::new();
    store.expect_create_order_with_reservation().returning(move |_| {
        Ok(OrderCreationResult {
            order: pending_order(),
            items: items_response(OrderId(2)),
            created,
            superseded: None,
        })
    });
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(CreateOrderRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

fn configure_cancel(cfg: &mut ServiceConfig) {
    cancel_app(cfg, true)
}

fn configure_cancel_replay(cfg: &mut ServiceConfig) {
    cancel_app(cfg, false)
}

fn cancel_app(cfg: &mut ServiceConfig, newly_cancelled: bool) {
    let mut store = MockOrderStore::new();
    store.expect_cancel_order_for_customer().returning(move |id, _| {
        let released = if newly_cancelled { items_response(id) } else { Vec::new() };
        Ok(CancellationResult { order: cancelled_order(), newly_cancelled, released })
    });
    store.expect_fetch_order_items().returning(|id| Ok(items_response(id)));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(CancelOrderRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

fn cart_json() -> serde_json::Value {
    json!({
        "items": [{ "product": 13, "quantity": 1, "price": "49.99" }],
        "total_price": "49.99"
    })
}

// Mock response to `fetch_orders_for_customer` and `search_orders` calls
fn orders_response() -> Vec<Order> {
    vec![paid_order(), pending_order()]
}

fn paid_order() -> Order {
    Order {
        id: OrderId(1),
        order_number: "ORD-7F2K9QZX41".to_string(),
        customer_id: 1,
        order_status: OrderStatusType::Paid,
        payment_status: PaymentStatusType::Paid,
        total_price: Money::from_units(100),
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
    }
}

fn pending_order() -> Order {
    Order {
        id: OrderId(2),
        order_number: "ORD-P4TX20A9QQ".to_string(),
        customer_id: 1,
        order_status: OrderStatusType::Pending,
        payment_status: PaymentStatusType::Pending,
        total_price: Money::from_cents(4999),
        created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 16, 11, 20, 0).unwrap(),
    }
}

fn cancelled_order() -> Order {
    let mut order = pending_order();
    order.order_status = OrderStatusType::Cancelled;
    order.payment_status = PaymentStatusType::Cancelled;
    order
}

fn items_response(order_id: OrderId) -> Vec<OrderItem> {
    let item = |id, product, quantity, cents| OrderItem {
        id,
        order_id,
        product_id: ProductId(product),
        quantity,
        price: Money::from_cents(cents),
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
    };
    match order_id.inner() {
        1 => vec![item(1, 11, 2, 2500), item(2, 12, 1, 5000)],
        2 => vec![item(3, 13, 1, 4999)],
        _ => Vec::new(),
    }
}

const ORDER_1_JSON: &str = r#"{"id":1,"order_number":"ORD-7F2K9QZX41","order_status":"paid","payment_status":"paid","total_price":"100.00","order_date":"2024-02-29T13:30:00Z","items":[{"id":1,"product":11,"quantity":2,"price":"25.00"},{"id":2,"product":12,"quantity":1,"price":"50.00"}]}"#;

const ORDER_2_JSON: &str = r#"{"id":2,"order_number":"ORD-P4TX20A9QQ","order_status":"pending","payment_status":"pending","total_price":"49.99","order_date":"2024-03-15T18:30:00Z","items":[{"id":3,"product":13,"quantity":1,"price":"49.99"}]}"#;

const CANCELLED_ORDER_JSON: &str = r#"{"id":2,"order_number":"ORD-P4TX20A9QQ","order_status":"cancelled","payment_status":"cancelled","total_price":"49.99","order_date":"2024-03-15T18:30:00Z","items":[{"id":3,"product":13,"quantity":1,"price":"49.99"}]}"#;

const ORDERS_JSON: &str = r#"[{"id":1,"order_number":"ORD-7F2K9QZX41","order_status":"paid","payment_status":"paid","total_price":"100.00","order_date":"2024-02-29T13:30:00Z","items":[{"id":1,"product":11,"quantity":2,"price":"25.00"},{"id":2,"product":12,"quantity":1,"price":"50.00"}]},{"id":2,"order_number":"ORD-P4TX20A9QQ","order_status":"pending","payment_status":"pending","total_price":"49.99","order_date":"2024-03-15T18:30:00Z","items":[{"id":3,"product":13,"quantity":1,"price":"49.99"}]}]"#;
