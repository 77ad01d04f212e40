//! Role-based access control middleware.
//!
//! Placed on routes that need more than a valid login, e.g. the admin order search. It reads the
//! [`JwtClaims`] that the token middleware stored in the request extensions and checks them against the
//! roles the route requires. Requests holding all required roles pass through; everything else gets a
//! 403 Forbidden.

use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorInternalServerError},
    Error,
    HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use magnite_engine::db_types::Role;

use crate::auth::JwtClaims;

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
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
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let claims = req
                .extensions()
                .get::<JwtClaims>()
                .ok_or_else(|| {
                    // Reaching here means the route was registered outside the token middleware.
                    log::warn!("🔐️ No claims found in request extensions");
                    ErrorInternalServerError("No claims found in request extensions")
                })?
                .clone();
            if required_roles.iter().all(|role| claims.roles.contains(role)) {
                service.call(req).await
            } else {
                Err(ErrorForbidden("Insufficient permissions"))
            }
        })
    }
}
