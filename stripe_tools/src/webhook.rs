//! Verification of Stripe webhook signatures.
//!
//! Each delivery carries a `Stripe-Signature` header of the form `t=<unix ts>,v1=<hex>`, possibly with
//! several `v1` entries while an endpoint secret is being rolled. The signed payload is `"{t}.{raw body}"`
//! and the signature is its HMAC-SHA256 under the endpoint's signing secret.

use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::StripeApiError;

type HmacSha256 = Hmac<Sha256>;

fn new_mac(secret: &str, timestamp: i64) -> Result<HmacSha256, StripeApiError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
    mac.update(format!("{timestamp}.").as_bytes());
    Ok(mac)
}

/// Computes the hex signature for a payload at the given timestamp. This is the `v1` value Stripe would
/// put in the header, so test rigs can sign their own deliveries.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, StripeApiError> {
    let mut mac = new_mac(secret, timestamp)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header against the raw request body.
///
/// A header that cannot be parsed is an error. A well-formed header whose signature does not match, or
/// whose timestamp is more than `tolerance` seconds in the past, verifies as `false`.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance: i64,
) -> Result<bool, StripeApiError> {
    let (timestamp, candidates) = parse_signature_header(signature_header)?;
    let now = chrono::Utc::now().timestamp();
    if now - timestamp > tolerance {
        debug!("Webhook timestamp {timestamp} is older than the {tolerance}s replay tolerance");
        return Ok(false);
    }
    for candidate in candidates {
        let Ok(signature) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = new_mac(secret, timestamp)?;
        mac.update(payload);
        if mac.verify_slice(&signature).is_ok() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<&str>), StripeApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => {
                let t = v
                    .parse::<i64>()
                    .map_err(|_| StripeApiError::MalformedSignature(format!("invalid timestamp '{v}'")))?;
                timestamp = Some(t);
            },
            Some(("v1", v)) => signatures.push(v),
            // v0 entries and future schemes are ignored.
            Some(_) => {},
            None => return Err(StripeApiError::MalformedSignature(format!("'{part}' is not a key=value pair"))),
        }
    }
    let timestamp = timestamp.ok_or_else(|| StripeApiError::MalformedSignature("no timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeApiError::MalformedSignature("no v1 signature".to_string()));
    }
    Ok((timestamp, signatures))
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"type\":\"payment_intent.succeeded\"}";

    fn signed_header(secret: &str, timestamp: i64) -> String {
        let sig = compute_signature(secret, timestamp, PAYLOAD).unwrap();
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn a_valid_signature_verifies() {
        let header = signed_header(SECRET, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(PAYLOAD, &header, SECRET, 300).unwrap());
    }

    #[test]
    fn a_signature_under_the_wrong_secret_is_rejected() {
        let header = signed_header("whsec_somebody_else", chrono::Utc::now().timestamp());
        assert!(!verify_webhook_signature(PAYLOAD, &header, SECRET, 300).unwrap());
    }

    #[test]
    fn a_modified_payload_is_rejected() {
        let header = signed_header(SECRET, chrono::Utc::now().timestamp());
        let tampered = b"{\"type\":\"payment_intent.succeeded\",\"amount\":0}";
        assert!(!verify_webhook_signature(tampered, &header, SECRET, 300).unwrap());
    }

    #[test]
    fn a_stale_timestamp_is_rejected() {
        let header = signed_header(SECRET, chrono::Utc::now().timestamp() - 600);
        assert!(!verify_webhook_signature(PAYLOAD, &header, SECRET, 300).unwrap());
    }

    #[test]
    fn any_matching_v1_entry_is_enough() {
        // Secret rolls put the old and the new signature in the same header.
        let timestamp = chrono::Utc::now().timestamp();
        let stale = compute_signature("whsec_retired", timestamp, PAYLOAD).unwrap();
        let live = compute_signature(SECRET, timestamp, PAYLOAD).unwrap();
        let header = format!("t={timestamp},v1={stale},v1={live}");
        assert!(verify_webhook_signature(PAYLOAD, &header, SECRET, 300).unwrap());
    }

    #[test]
    fn headers_without_a_timestamp_are_malformed() {
        let err = verify_webhook_signature(PAYLOAD, "v1=deadbeef", SECRET, 300).unwrap_err();
        assert!(matches!(err, StripeApiError::MalformedSignature(_)));
    }

    #[test]
    fn headers_without_a_signature_are_malformed() {
        let header = format!("t={}", chrono::Utc::now().timestamp());
        let err = verify_webhook_signature(PAYLOAD, &header, SECRET, 300).unwrap_err();
        assert!(matches!(err, StripeApiError::MalformedSignature(_)));
    }
}
