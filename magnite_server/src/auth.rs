//! Access tokens for the storefront API.
//!
//! Tokens are standard HS256 JWTs signed with the shared secret from [`AuthConfig`]. The claims carry the
//! customer id (`sub`), the granted [`Role`]s and an expiry. Verification happens once per request in
//! [`crate::middleware::JwtMiddlewareService`], which stashes the validated claims in the request
//! extensions; handlers receive them through the [`FromRequest`] impl below and only ever see claims that
//! have already passed signature and expiry checks.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use magnite_engine::db_types::Role;
use mgn_common::Secret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated customer id.
    pub sub: i64,
    pub roles: Vec<Role>,
    /// Expiry, as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or(ServerError::CouldNotDeserializeAuthToken);
        ready(claims)
    }
}

/// Pulls the bearer token out of the `Authorization` header, or fails with the same error an absent token
/// produces so the two cases are indistinguishable to a client.
pub fn extract_bearer_token(req: &HttpRequest) -> Result<&str, ServerError> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ServerError::CouldNotDeserializeAuthToken)
}

/// Verifies the token's signature and expiry and returns its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::PoorlyFormattedToken(format!("Expected 3 token segments, got {}", parts.len())));
    }
    let (header_b64, payload_b64, sig_b64) = (parts[0], parts[1], parts[2]);
    let header = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD)
        .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let header: serde_json::Value =
        serde_json::from_slice(&header).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    // The algorithm is pinned. A token claiming anything else (including "none") never reaches the MAC.
    if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
        return Err(AuthError::ValidationError("Unsupported token algorithm".to_string()));
    }
    let signature =
        base64::decode_config(sig_b64, base64::URL_SAFE_NO_PAD).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let mut mac = new_mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::ValidationError("Signature has failed verification".to_string()))?;
    let payload = base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD)
        .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let claims: JwtClaims =
        serde_json::from_slice(&payload).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    if claims.exp <= Utc::now().timestamp() {
        return Err(AuthError::ExpiredToken);
    }
    Ok(claims)
}

/// Signs an access token for the given claims. Exposed for the issuer and for tests that need tokens with
/// doctored claims.
pub fn sign_claims(claims: &JwtClaims, secret: &str) -> Result<String, AuthError> {
    let header = base64::encode_config(br#"{"alg":"HS256","typ":"JWT"}"#, base64::URL_SAFE_NO_PAD);
    let payload = serde_json::to_vec(claims).map_err(|e| AuthError::ValidationError(e.to_string()))?;
    let payload = base64::encode_config(&payload, base64::URL_SAFE_NO_PAD);
    let mut mac = new_mac(secret)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let signature = base64::encode_config(&mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD);
    Ok(format!("{header}.{payload}.{signature}"))
}

fn new_mac(secret: &str) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AuthError::ValidationError(e.to_string()))
}

pub struct TokenIssuer {
    secret: Secret<String>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.jwt_secret.clone() }
    }

    /// Issue a new access token for the customer.
    ///
    /// This method DOES NOT verify that the customer exists or may hold the requested roles. That must be
    /// done before calling `issue_token`.
    pub fn issue_token(
        &self,
        customer_id: i64,
        roles: Vec<Role>,
        lifetime: Option<Duration>,
    ) -> Result<String, AuthError> {
        let lifetime = lifetime.unwrap_or_else(|| Duration::days(1));
        let exp = (Utc::now() + lifetime).timestamp();
        let claims = JwtClaims { sub: customer_id, roles, exp };
        sign_claims(&claims, self.secret.reveal())
    }
}
