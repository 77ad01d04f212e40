mod api;
mod config;
mod error;
mod webhook;

mod data_objects;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    EventData,
    EventPaymentIntent,
    PaymentIntent,
    WebhookEvent,
    EVENT_PAYMENT_INTENT_FAILED,
    EVENT_PAYMENT_INTENT_SUCCEEDED,
};
pub use error::StripeApiError;
pub use webhook::{compute_signature, verify_webhook_signature};
