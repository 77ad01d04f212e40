//! Webhook signature middleware.
//!
//! The payment processor signs every webhook delivery with the shared webhook secret: the
//! `Stripe-Signature` header carries a timestamp and one or more HMAC-SHA256 signatures over
//! `"{timestamp}.{raw body}"`. This middleware verifies that signature (and rejects stale deliveries)
//! before the reconciler ever parses the body, so a forged or replayed webhook can never move an order.
//!
//! The body has to be read in full to verify it, so after a successful check the middleware puts the bytes
//! back into the request payload for the route handler to consume.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mgn_common::Secret;
use stripe_tools::verify_webhook_signature;

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

pub struct WebhookSignatureMiddlewareFactory {
    secret: Secret<String>,
    /// Maximum age, in seconds, of a delivery before it is treated as a replay.
    tolerance: i64,
    // If false, the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl WebhookSignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance: i64, enabled: bool) -> Self {
        WebhookSignatureMiddlewareFactory { secret, tolerance, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance: i64,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance = self.tolerance;
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for request");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let verified = match req.headers().get(STRIPE_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
                Some(header) => verify_webhook_signature(data.as_ref(), header, &secret, tolerance),
                None => {
                    warn!("🔐️ No webhook signature found in request. Denying access.");
                    return Err(ErrorUnauthorized("No webhook signature found."));
                },
            };
            match verified {
                Ok(true) => {
                    trace!("🔐️ Webhook signature check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Ok(false) => {
                    warn!("🔐️ Invalid or stale webhook signature in request. Denying access.");
                    Err(ErrorUnauthorized("Invalid webhook signature."))
                },
                Err(e) => {
                    warn!("🔐️ Could not parse webhook signature header. {e} Denying access.");
                    Err(ErrorUnauthorized("Invalid webhook signature."))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
