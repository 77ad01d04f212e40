//! Access token middleware.
//!
//! Wraps the authenticated part of the API. Every request must carry `Authorization: Bearer <token>`; the
//! token's signature and expiry are checked here, once, and the validated [`JwtClaims`] are stashed in the
//! request extensions for the [`JwtClaims`] extractor and the ACL middleware to pick up. Handlers behind
//! this middleware never see an unverified identity.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};
use mgn_common::Secret;

use crate::{
    auth::{extract_bearer_token, validate_token},
    config::AuthConfig,
    errors::ServerError,
};

pub struct JwtMiddlewareFactory {
    secret: Secret<String>,
}

impl JwtMiddlewareFactory {
    pub fn new(config: &AuthConfig) -> Self {
        JwtMiddlewareFactory { secret: config.jwt_secret.clone() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { secret: self.secret.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        Box::pin(async move {
            trace!("🔐️ Checking access token for {}", req.path());
            let token = extract_bearer_token(req.request())?.to_owned();
            let claims = validate_token(&token, &secret).map_err(|e| {
                debug!("🔐️ Access token rejected. {e}");
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ Access token is valid for customer {}", claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
