mod helpers;
mod mocks;
mod orders;
mod payments;
mod webhook;

use actix_web::{test, test::TestRequest, App};

use crate::routes::health;

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n");
}
