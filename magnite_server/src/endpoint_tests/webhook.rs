use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use magnite_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentOutcome, PaymentStatusType, Transaction, TransactionStatus},
    events::EventProducers,
    traits::{PaymentGatewayError, PaymentOutcomeResult},
    OrderFlowApi,
};
use mgn_common::{Money, Secret};
use stripe_tools::compute_signature;

use crate::{
    endpoint_tests::mocks::MockOrderStore,
    middleware::WebhookSignatureMiddlewareFactory,
    webhook_routes::StripeWebhookRoute,
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_test_secret";

#[actix_web::test]
async fn a_signed_success_outcome_is_applied() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_123");
    let header = signed_header(WEBHOOK_SECRET, &payload);
    let (status, body) =
        send_webhook(Some(header), payload, true, configure_success_applied).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event processed."}"#);
}

#[actix_web::test]
async fn an_unsigned_delivery_never_reaches_the_reconciler() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_123");
    let err = send_webhook(None, payload, true, configure_untouched).await.expect_err("Expected error");
    assert_eq!(err, "No webhook signature found.");
}

#[actix_web::test]
async fn a_forged_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_123");
    let header = signed_header("whsec_someone_elses_secret", &payload);
    let err = send_webhook(Some(header), payload, true, configure_untouched).await.expect_err("Expected error");
    assert_eq!(err, "Invalid webhook signature.");
}

#[actix_web::test]
async fn a_stale_delivery_is_rejected_as_a_replay() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_123");
    let header = signed_header_at(WEBHOOK_SECRET, &payload, Utc::now().timestamp() - 600);
    let err = send_webhook(Some(header), payload, true, configure_untouched).await.expect_err("Expected error");
    assert_eq!(err, "Invalid webhook signature.");
}

/// The webhook can overtake the response to our own intent-creation call. A 404 makes the processor
/// redeliver; by then the intent id is on record.
#[actix_web::test]
async fn an_unknown_intent_is_a_404_so_the_processor_retries() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_777");
    let header = signed_header(WEBHOOK_SECRET, &payload);
    let (status, body) =
        send_webhook(Some(header), payload, true, configure_unknown_intent).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Payment intent pi_777"}"#);
}

#[actix_web::test]
async fn unfamiliar_event_types_are_acknowledged_and_dropped() {
    let _ = env_logger::try_init().ok();
    let payload = refund_event();
    let header = signed_header(WEBHOOK_SECRET, &payload);
    let (status, body) =
        send_webhook(Some(header), payload, true, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event ignored."}"#);
}

#[actix_web::test]
async fn a_replayed_outcome_is_acknowledged_without_reapplying() {
    let _ = env_logger::try_init().ok();
    let payload = success_event("pi_123");
    // Checks disabled and no header: the dev-environment path.
    let (status, body) = send_webhook(None, payload, false, configure_replay).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event already processed."}"#);
}

#[actix_web::test]
async fn a_failed_outcome_marks_the_attempt_failed() {
    let _ = env_logger::try_init().ok();
    let payload = failure_event("pi_123");
    let header = signed_header(WEBHOOK_SECRET, &payload);
    let (status, body) =
        send_webhook(Some(header), payload, true, configure_failure_applied).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Event processed."}"#);
}

//--------------------------------------- Fixtures and wiring ---------------------------------------------------

/// Sends `payload` to the webhook route behind the signature middleware. Deliveries the middleware rejects
/// come back as `Err` carrying the error's display string, same as the token helpers.
async fn send_webhook(
    signature: Option<String>,
    payload: String,
    checks_enabled: bool,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri("/stripe").insert_header(ContentType::json()).set_payload(payload);
    if let Some(header) = signature {
        req = req.insert_header(("Stripe-Signature", header));
    }
    let secret = Secret::new(WEBHOOK_SECRET.to_string());
    let app = App::new()
        .wrap(WebhookSignatureMiddlewareFactory::new(secret, 300, checks_enabled))
        .configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

fn signed_header(secret: &str, payload: &str) -> String {
    signed_header_at(secret, payload, Utc::now().timestamp())
}

fn signed_header_at(secret: &str, payload: &str, timestamp: i64) -> String {
    let sig = compute_signature(secret, timestamp, payload.as_bytes()).expect("Failed to sign payload");
    format!("t={timestamp},v1={sig}")
}

fn configure_success_applied(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_apply_payment_outcome()
        .withf(|id, outcome| id == "pi_123" && *outcome == PaymentOutcome::Succeeded)
        .returning(|_, _| Ok(PaymentOutcomeResult::Applied { order: paid_order(), transaction: completed_attempt() }));
    webhook_app(cfg, store)
}

fn configure_failure_applied(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_apply_payment_outcome()
        .withf(|id, outcome| id == "pi_123" && *outcome == PaymentOutcome::Failed)
        .returning(|_, _| Ok(PaymentOutcomeResult::Applied { order: unpaid_order(), transaction: failed_attempt() }));
    webhook_app(cfg, store)
}

fn configure_replay(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_apply_payment_outcome()
        .returning(|_, _| Ok(PaymentOutcomeResult::Replayed { transaction: completed_attempt() }));
    webhook_app(cfg, store)
}

fn configure_unknown_intent(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store
        .expect_apply_payment_outcome()
        .returning(|id, _| Err(PaymentGatewayError::UnknownTransaction(id.to_string())));
    webhook_app(cfg, store)
}

// The mock carries no expectations, so any delivery that reaches the reconciler panics the test.
fn configure_untouched(cfg: &mut ServiceConfig) {
    webhook_app(cfg, MockOrderStore::new())
}

fn webhook_app(cfg: &mut ServiceConfig, store: MockOrderStore) {
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(StripeWebhookRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

fn success_event(intent_id: &str) -> String {
    format!(
        r#"{{"id":"evt_1","type":"payment_intent.succeeded","created":1718000000,"data":{{"object":{{"id":"{intent_id}","amount":10000,"currency":"usd","status":"succeeded"}}}}}}"#
    )
}

fn failure_event(intent_id: &str) -> String {
    format!(
        r#"{{"id":"evt_2","type":"payment_intent.payment_failed","created":1718000000,"data":{{"object":{{"id":"{intent_id}","amount":10000,"currency":"usd","status":"requires_payment_method","last_payment_error":{{"code":"card_declined","message":"Your card was declined."}}}}}}}}"#
    )
}

fn refund_event() -> String {
    r#"{"id":"evt_3","type":"charge.refunded","created":1718000000,"data":{"object":{"id":"ch_55","amount":10000}}}"#
        .to_string()
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

fn unpaid_order() -> Order {
    let mut order = paid_order();
    order.order_status = OrderStatusType::Pending;
    order.payment_status = PaymentStatusType::Failed;
    order
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

fn failed_attempt() -> Transaction {
    let mut tx = completed_attempt();
    tx.payment_status = TransactionStatus::Failed;
    tx
}
