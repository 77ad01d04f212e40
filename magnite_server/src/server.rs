use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use magnite_engine::{events::EventProducers, OrderFlowApi, OrderQueryApi, SqliteDatabase};
use stripe_tools::StripeApi;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    integrations::stripe::create_order_event_handlers,
    middleware::{JwtMiddlewareFactory, WebhookSignatureMiddlewareFactory},
    routes::{
        health,
        CancelOrderRoute,
        CreateOrderRoute,
        CreatePaymentIntentRoute,
        MyOrdersRoute,
        MyTransactionsRoute,
        OrderByIdRoute,
        PaymentStatusRoute,
        SearchOrdersRoute,
    },
    webhook_routes::StripeWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_order_event_handlers();
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    // Built once, outside the worker factory. The client is reference-counted internally, so workers share
    // one connection pool to the processor.
    let stripe_api = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let auth_config = config.auth.clone();
    let webhook_secret = config.stripe.webhook_secret.clone();
    let webhook_tolerance = config.stripe.webhook_tolerance;
    let signature_checks = config.webhook_signature_checks;
    let srv = HttpServer::new(move || {
        let order_flow_api = OrderFlowApi::new(db.clone(), producers.clone());
        let order_query_api = OrderQueryApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&auth_config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mgn::access_log"))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(order_query_api))
            .app_data(web::Data::new(stripe_api.clone()))
            .app_data(web::Data::new(jwt_signer));
        // Routes that require authentication.
        // SearchOrdersRoute must be registered before OrderByIdRoute, or "search" gets captured by the
        // `{id}` segment and rejected as a malformed order id.
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(&auth_config))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(PaymentStatusRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(CreatePaymentIntentRoute::<SqliteDatabase>::new())
            .service(MyTransactionsRoute::<SqliteDatabase>::new());
        // Webhook deliveries carry no JWT; they authenticate with the signature header instead.
        let webhook_scope = web::scope("/webhook")
            .wrap(WebhookSignatureMiddlewareFactory::new(webhook_secret.clone(), webhook_tolerance, signature_checks))
            .service(StripeWebhookRoute::<SqliteDatabase>::new());
        app.service(auth_scope).service(webhook_scope).service(health)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
