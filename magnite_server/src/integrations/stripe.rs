//! The bridge between the order engine and the Stripe payment processor.
//!
//! The engine itself is processor-agnostic. Everything Stripe-specific that is not wire plumbing (that
//! lives in `stripe_tools`) sits here: opening an intent for an order, and the handlers that react to the
//! lifecycle events the engine fires.

use log::*;
use magnite_engine::{
    db_types::OrderId,
    events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderPaidEvent},
    traits::{OrderManagement, PaymentGatewayDatabase},
    OrderFlowApi,
};
use stripe_tools::StripeApi;

use crate::{data_objects::PaymentIntentResult, errors::ServerError};

/// Opens a payment attempt in the engine and a matching payment intent at Stripe, tying the two together
/// before the caller sees either.
///
/// The ordering matters. The intent id is written onto the attempt record *before* the client secret goes
/// back to the storefront, so by the time the customer can possibly pay, the webhook reporting the outcome
/// will find a transaction to land on. If the processor call itself fails, the attempt is marked failed on
/// the spot; no webhook will ever arrive for it.
pub async fn initiate_order_payment<B: PaymentGatewayDatabase>(
    order_id: OrderId,
    customer_id: i64,
    api: &OrderFlowApi<B>,
    stripe: &StripeApi,
) -> Result<PaymentIntentResult, ServerError> {
    let transaction = api.initiate_payment(order_id, customer_id, stripe.currency()).await.map_err(|e| {
        debug!("💳️ Could not open a payment attempt for order {order_id}. {e}");
        ServerError::from(e)
    })?;
    // The attempt opened, so the order exists and belongs to this customer.
    let order = api
        .db()
        .fetch_order(order_id)
        .await
        .map_err(ServerError::from)?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    let intent = match stripe.create_payment_intent(transaction.amount, &order.order_number).await {
        Ok(intent) => intent,
        Err(e) => {
            warn!(
                "💳️ The processor call for order {} did not go through. Marking payment attempt {} as failed. {e}",
                order.order_number, transaction.id
            );
            if let Err(e) = api.fail_payment_attempt(transaction.id).await {
                error!("💳️ Could not mark payment attempt {} as failed. {e}", transaction.id);
            }
            return Err(ServerError::PaymentProcessorError(e.to_string()));
        },
    };
    api.attach_payment_intent(transaction.id, &intent.id).await.map_err(|e| {
        error!("💳️ Could not record intent {} against payment attempt {}. {e}", intent.id, transaction.id);
        ServerError::from(e)
    })?;
    info!("💳️ Payment intent {} open for order {}. Amount: {}.", intent.id, order.order_number, transaction.amount);
    Ok(PaymentIntentResult { client_secret: intent.client_secret, payment_intent_id: intent.id })
}

pub const ORDER_EVENT_BUFFER_SIZE: usize = 25;

/// Assigns handlers to the events the engine fires as orders move through their lifecycle.
///
/// 1. OrderPaidEvent - fires when a success webhook freshly settles an order. Fulfilment works off this
///    signal; until a warehouse integration lands, the handler records it in the log.
/// 2. OrderAnnulledEvent - fires when an order is cancelled or superseded. Stock is already back on the
///    shelf by the time the handler runs.
pub fn create_order_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On OrderPaid Handler ---
    hooks.on_order_paid(|ev| {
        let OrderPaidEvent { order, transaction } = ev;
        Box::pin(async move {
            info!(
                "💳️ Order {} settled in full by payment attempt {}. {} is ready for fulfilment.",
                order.order_number, transaction.id, order.total_price
            );
        })
    });
    // --- On OrderAnnulled Handler ---
    hooks.on_order_annulled(|ev| {
        let OrderAnnulledEvent { order, status } = ev;
        Box::pin(async move {
            info!("💳️ Order {} has been annulled. Reason: {status}. Its stock is back on the shelf.", order.order_number);
        })
    });
    EventHandlers::new(ORDER_EVENT_BUFFER_SIZE, hooks)
}
