mod acl;
mod jwt;
mod signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use jwt::{JwtMiddlewareFactory, JwtMiddlewareService};
pub use signature::{WebhookSignatureMiddlewareFactory, WebhookSignatureMiddlewareService};
