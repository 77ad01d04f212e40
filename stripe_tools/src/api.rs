use std::sync::Arc;

use log::*;
use mgn_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{config::StripeConfig, data_objects::PaymentIntent, StripeApiError};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Stripe's API takes form-encoded bodies and returns JSON.
    pub async fn form_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("Sending Stripe request: {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Stripe request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Creates a payment intent for the given amount. The returned client secret is what the storefront
    /// hands to Stripe.js to collect payment; the intent id is what the webhook later carries back.
    pub async fn create_payment_intent(
        &self,
        amount: Money,
        order_number: &str,
    ) -> Result<PaymentIntent, StripeApiError> {
        let form = [
            ("amount", amount.value().to_string()),
            ("currency", self.config.currency.clone()),
            ("metadata[order_number]", order_number.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        debug!("Creating payment intent for order {order_number}");
        let intent = self.form_query::<PaymentIntent>(Method::POST, "/payment_intents", &form).await?;
        info!("Created payment intent {} for order {order_number}", intent.id);
        Ok(intent)
    }
}
