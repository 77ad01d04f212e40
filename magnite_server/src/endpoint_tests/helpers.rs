use actix_http::Request;
use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use magnite_engine::db_types::Role;
use mgn_common::Secret;
use serde_json::Value;

use crate::{auth::TokenIssuer, config::AuthConfig, middleware::JwtMiddlewareFactory};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("test-only-signing-secret-0123456789abcdef".to_string()) }
}

pub fn issue_token(customer_id: i64, roles: Vec<Role>) -> String {
    let config = get_auth_config();
    TokenIssuer::new(&config).issue_token(customer_id, roles, None).expect("Failed to sign token")
}

pub async fn get_request(
    auth_header: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::get().uri(path);
    if !auth_header.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {auth_header}")));
    }
    send(req.to_request(), configure).await
}

pub async fn post_request(
    auth_header: &str,
    path: &str,
    body: Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri(path).set_json(body);
    if !auth_header.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {auth_header}")));
    }
    send(req.to_request(), configure).await
}

// Requests rejected by the token middleware come back as `Err` carrying the error's display string.
// Everything that produced a response, handler errors included, comes back as `Ok`.
async fn send(req: Request, configure: fn(&mut ServiceConfig)) -> Result<(StatusCode, String), String> {
    let config = get_auth_config();
    let app = App::new().wrap(JwtMiddlewareFactory::new(&config)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
