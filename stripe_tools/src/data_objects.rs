use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StripeApiError;

pub const EVENT_PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// The slice of Stripe's PaymentIntent object that the engine cares about. The `client_secret` goes to the
/// storefront; the `id` is what webhook deliveries carry back.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// A webhook event envelope. `data.object` is left as raw JSON because its shape depends entirely on
/// `event_type`; use [`WebhookEvent::payment_intent`] once the type says it is one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn payment_intent(&self) -> Result<EventPaymentIntent, StripeApiError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| StripeApiError::JsonError(e.to_string()))
    }
}

/// The payment intent fields delivered inside `payment_intent.*` events. Webhook payloads omit the client
/// secret, so this is narrower than [`PaymentIntent`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventPaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl EventPaymentIntent {
    /// A one-line description of why the payment failed, for logs.
    pub fn failure_reason(&self) -> String {
        match &self.last_payment_error {
            Some(err) => {
                let code = err.code.as_deref().unwrap_or("unknown");
                let message = err.message.as_deref().unwrap_or("no message");
                format!("{code}: {message}")
            },
            None => "no error details provided".to_string(),
        }
    }
}
