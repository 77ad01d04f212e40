use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use magnite_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentStatusType, Role, Transaction, TransactionStatus},
    events::EventProducers,
    traits::PaymentGatewayError,
    OrderFlowApi,
    OrderQueryApi,
};
use mgn_common::{Money, Secret};
use serde_json::json;
use stripe_tools::{StripeApi, StripeConfig};

use super::helpers::{get_request, issue_token, post_request};
use crate::{
    endpoint_tests::mocks::MockOrderStore,
    routes::{CreatePaymentIntentRoute, MyTransactionsRoute},
};

#[actix_web::test]
async fn fetch_my_transactions() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let (status, body) = get_request(&token, "/transactions", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, TRANSACTIONS_JSON);
}

#[actix_web::test]
async fn intent_for_another_customers_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let body = json!({ "order_id": 2 });
    let (status, body) =
        post_request(&token, "/payments/intent", body, configure_foreign_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order 2"}"#);
}

/// The attempt is opened, the processor call dies on the wire, and the attempt must be failed on the spot.
/// `expect_fail_payment_attempt.times(1)` is the assertion that the compensation actually ran.
#[actix_web::test]
async fn unreachable_processor_fails_the_attempt() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, vec![Role::User]);
    let body = json!({ "order_id": 2 });
    let (status, body) =
        post_request(&token, "/payments/intent", body, configure_processor_down).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, r#"{"error":"The payment processor could not be reached. Please try again later."}"#);
}

//--------------------------------------- Fixtures and wiring ---------------------------------------------------

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_transactions_for_customer().returning(|_| Ok(vec![completed_attempt(), open_attempt()]));
    let query_api = OrderQueryApi::new(store);
    cfg.service(MyTransactionsRoute::<MockOrderStore>::new()).app_data(web::Data::new(query_api));
}

fn configure_foreign_order(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_begin_payment_attempt().returning(|id, _, _| Err(PaymentGatewayError::Forbidden(id)));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(CreatePaymentIntentRoute::<MockOrderStore>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(unreachable_stripe()));
}

fn configure_processor_down(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_begin_payment_attempt().returning(|_, _, _| Ok(open_attempt()));
    store.expect_fetch_order().returning(|_| Ok(Some(pending_order())));
    store
        .expect_fail_payment_attempt()
        .times(1)
        .withf(|&id| id == 7)
        .returning(|_| Ok(failed_attempt()));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(CreatePaymentIntentRoute::<MockOrderStore>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(unreachable_stripe()));
}

// Nothing listens on port 1, so the first outbound call is refused immediately.
fn unreachable_stripe() -> StripeApi {
    let config = StripeConfig {
        api_url: "http://127.0.0.1:1".to_string(),
        secret_key: Secret::new("sk_test_0123456789".to_string()),
        ..StripeConfig::default()
    };
    StripeApi::new(config).expect("The Stripe client should always build")
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
        updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
    }
}

fn completed_attempt() -> Transaction {
    Transaction {
        id: 1,
        order_id: OrderId(1),
        customer_id: 1,
        amount: Money::from_units(100),
        currency: "usd".to_string(),
        payment_status: TransactionStatus::Completed,
        payment_intent_id: Some("pi_123".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 25, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
    }
}

fn open_attempt() -> Transaction {
    Transaction {
        id: 7,
        order_id: OrderId(2),
        customer_id: 1,
        amount: Money::from_cents(4999),
        currency: "usd".to_string(),
        payment_status: TransactionStatus::Pending,
        payment_intent_id: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 35, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 35, 0).unwrap(),
    }
}

fn failed_attempt() -> Transaction {
    let mut tx = open_attempt();
    tx.payment_status = TransactionStatus::Failed;
    tx
}

const TRANSACTIONS_JSON: &str = r#"[{"id":1,"order_id":1,"amount":"100.00","currency":"usd","payment_status":"completed","payment_intent_id":"pi_123","created_at":"2024-02-29T13:25:00Z","updated_at":"2024-02-29T13:30:00Z"},{"id":7,"order_id":2,"amount":"49.99","currency":"usd","payment_status":"pending","payment_intent_id":null,"created_at":"2024-03-15T18:35:00Z","updated_at":"2024-03-15T18:35:00Z"}]"#;
