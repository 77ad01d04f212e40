use log::*;
use mgn_common::Secret;

pub const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
pub const DEFAULT_CURRENCY: &str = "usd";
/// Webhook deliveries older than this many seconds are treated as replays.
pub const DEFAULT_WEBHOOK_TOLERANCE: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub currency: String,
    pub webhook_tolerance: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_url: STRIPE_API_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MGN_STRIPE_API_URL").unwrap_or_else(|_| STRIPE_API_URL.to_string());
        let secret_key = Secret::new(std::env::var("MGN_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MGN_STRIPE_SECRET_KEY not set, using a useless default");
            "sk_test_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("MGN_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("MGN_STRIPE_WEBHOOK_SECRET not set, using a useless default");
            "whsec_00000000000000".to_string()
        }));
        let currency = std::env::var("MGN_STRIPE_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.to_string());
        let webhook_tolerance = std::env::var("MGN_STRIPE_WEBHOOK_TOLERANCE")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE);
        Self { api_url, secret_key, webhook_secret, currency, webhook_tolerance }
    }
}
