//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are all async: the storage calls and the payment processor round-trip are I/O bound, and a
//! blocking handler would stall its whole worker thread.

use actix_web::{get, http::StatusCode, web, HttpResponse, Responder};
use log::*;
use magnite_engine::{
    db_types::{Order, OrderId, Role},
    order_objects::OrderQueryFilter,
    traits::{OrderManagement, PaymentGatewayDatabase},
    OrderFlowApi,
    OrderQueryApi,
};
use stripe_tools::StripeApi;

use crate::{
    auth::JwtClaims,
    data_objects::{CreateIntentRequest, CreateOrderRequest, OrderView, PaymentStatusView, TransactionView},
    errors::ServerError,
    integrations::stripe::initiate_order_payment,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Route handler for order intake.
///
/// The authenticated customer submits their cart; the engine validates it, reserves stock and creates the
/// order atomically. Resubmitting the cart the customer already has open returns the existing order with a
/// `200` instead of a `201`, so clients can retry this call safely.
pub async fn create_order<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST order for customer {}", claims.sub);
    let new_order = body.into_inner().into_new_order(claims.sub);
    let result = api.process_new_order(new_order).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        ServerError::from(e)
    })?;
    let status = if result.created { StatusCode::CREATED } else { StatusCode::OK };
    let view = OrderView::from_order(result.order, result.items);
    Ok(HttpResponse::build(status).json(view))
}

route!(my_orders => Get "/orders" impl OrderManagement);
/// Route handler for the orders endpoint
///
/// Authenticated customers fetch their own order history here, newest first. There is no path for reading
/// someone else's history; admins search with `/orders/search` instead.
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for customer {}", claims.sub);
    let history = api.orders_for_customer(claims.sub).await.map_err(|e| {
        debug!("💻️ Could not fetch orders. {e}");
        ServerError::from(e)
    })?;
    let views = order_views(api.as_ref(), history.orders).await?;
    Ok(HttpResponse::Ok().json(views))
}

route!(search_orders => Get "/orders/search" impl OrderManagement where requires [Role::Admin]);
/// Admin search across all orders. An empty query returns everything, newest first.
pub async fn search_orders<B: OrderManagement>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders search for [{query}]");
    let query = query.into_inner();
    let orders = api.search_orders(query).await.map_err(|e| {
        debug!("💻️ Could not search orders. {e}");
        ServerError::from(e)
    })?;
    let views = order_views(api.as_ref(), orders).await?;
    Ok(HttpResponse::Ok().json(views))
}

route!(order_by_id => Get "/orders/{id}" impl OrderManagement);
/// Fetches a single order with its line items.
///
/// Customers can only fetch their own orders. An order that belongs to someone else renders exactly like
/// one that does not exist, so the endpoint cannot be used to probe which ids are taken. Admins can fetch
/// any order.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id} for customer {}", claims.sub);
    let result = api.order_with_items(order_id).await.map_err(|e| {
        debug!("💻️ Could not fetch order {order_id}. {e}");
        ServerError::from(e)
    })?;
    match result {
        Some(o) if o.order.customer_id == claims.sub || claims.is_admin() => {
            Ok(HttpResponse::Ok().json(OrderView::from_order(o.order, o.items)))
        },
        _ => Err(ServerError::NoRecordFound(format!("Order {order_id}"))),
    }
}

route!(payment_status => Get "/orders/{id}/payment-status" impl OrderManagement);
/// The checkout page polls this while the processor confirms the payment.
pub async fn payment_status<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    trace!("💻️ GET payment status of order {order_id} for customer {}", claims.sub);
    let order = api.fetch_order(order_id).await.map_err(|e| {
        debug!("💻️ Could not fetch order {order_id}. {e}");
        ServerError::from(e)
    })?;
    match order {
        Some(o) if o.customer_id == claims.sub || claims.is_admin() => {
            Ok(HttpResponse::Ok().json(PaymentStatusView::from(&o)))
        },
        _ => Err(ServerError::NoRecordFound(format!("Order {order_id}"))),
    }
}

route!(cancel_order => Post "/orders/{id}/cancel" impl PaymentGatewayDatabase);
/// Cancels an order on the customer's behalf, releasing its reserved stock. Retrying a cancellation is a
/// successful no-op; an order whose payment already completed can no longer be cancelled.
pub async fn cancel_order<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ POST cancel order {order_id} for customer {}", claims.sub);
    let result = api.cancel_order(order_id, claims.sub).await.map_err(|e| {
        debug!("💻️ Could not cancel order {order_id}. {e}");
        ServerError::from(e)
    })?;
    if result.newly_cancelled {
        info!(
            "💻️ Order {} cancelled by customer {}. {} reservation(s) released.",
            result.order.order_number,
            claims.sub,
            result.released.len()
        );
    }
    let items = api.db().fetch_order_items(order_id).await.map_err(|e| {
        debug!("💻️ Could not fetch items for cancelled order {order_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(OrderView::from_order(result.order, items)))
}

async fn order_views<B: OrderManagement>(
    api: &OrderQueryApi<B>,
    orders: Vec<Order>,
) -> Result<Vec<OrderView>, ServerError> {
    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        let items = api.order_items(order.id).await.map_err(|e| {
            debug!("💻️ Could not fetch items for order {}. {e}", order.id);
            ServerError::from(e)
        })?;
        views.push(OrderView::from_order(order, items));
    }
    Ok(views)
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(create_payment_intent => Post "/payments/intent" impl PaymentGatewayDatabase);
/// Opens a payment attempt for an order and returns the processor handle the client's payment widget
/// needs. The attempt, with its intent id, is durably recorded before this returns, so the processor's
/// webhook always finds it. If the processor cannot be reached the attempt is marked failed and the caller
/// gets a 502; the order stays payable.
pub async fn create_payment_intent<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateIntentRequest>,
    api: web::Data<OrderFlowApi<B>>,
    stripe: web::Data<StripeApi>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(body.into_inner().order_id);
    debug!("💻️ POST payment intent for order {order_id} by customer {}", claims.sub);
    let result = initiate_order_payment(order_id, claims.sub, api.as_ref(), stripe.as_ref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(my_transactions => Get "/transactions" impl OrderManagement);
/// The customer's payment attempts, newest first.
pub async fn my_transactions<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET transactions for customer {}", claims.sub);
    let transactions = api.transactions_for_customer(claims.sub).await.map_err(|e| {
        debug!("💻️ Could not fetch transactions. {e}");
        ServerError::from(e)
    })?;
    let views = transactions.into_iter().map(TransactionView::from).collect::<Vec<TransactionView>>();
    Ok(HttpResponse::Ok().json(views))
}
