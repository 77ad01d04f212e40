//----------------------------------------------   Webhooks  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use magnite_engine::{
    db_types::PaymentOutcome,
    traits::{PaymentGatewayDatabase, PaymentGatewayError, PaymentOutcomeResult},
    OrderFlowApi,
};
use stripe_tools::{WebhookEvent, EVENT_PAYMENT_INTENT_FAILED, EVENT_PAYMENT_INTENT_SUCCEEDED};

use crate::{data_objects::JsonResponse, errors::ServerError, route};

route!(stripe_webhook => Post "/stripe" impl PaymentGatewayDatabase);
/// Route handler for payment processor webhooks.
///
/// The signature middleware has already authenticated the delivery by the time this runs. Event types the
/// engine does not care about are acknowledged with a 200 and dropped. For payment outcomes, the reconciler
/// is idempotent: replays and out-of-date outcomes are acknowledged, not errors.
///
/// The one deliberate non-200: an intent id with no matching transaction gets a 404, so the processor keeps
/// redelivering until the intent has been recorded. That closes the race where the webhook overtakes the
/// response to our own intent-creation call.
pub async fn stripe_webhook<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("📬️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    let outcome = match event.event_type.as_str() {
        EVENT_PAYMENT_INTENT_SUCCEEDED => PaymentOutcome::Succeeded,
        EVENT_PAYMENT_INTENT_FAILED => PaymentOutcome::Failed,
        other => {
            info!("📬️ Ignoring webhook event {} of type {other}", event.id);
            return Ok(HttpResponse::Ok().json(JsonResponse::success("Event ignored.")));
        },
    };
    let intent = event.payment_intent().map_err(|e| {
        warn!("📬️ Webhook event {} did not carry a payment intent. {e}", event.id);
        ServerError::CouldNotDeserializePayload
    })?;
    if outcome == PaymentOutcome::Failed {
        info!("📬️ Payment intent {} failed: {}", intent.id, intent.failure_reason());
    }
    let result = match api.handle_payment_outcome(&intent.id, outcome).await {
        Ok(PaymentOutcomeResult::Applied { order, transaction }) => {
            info!(
                "📬️ Payment {outcome} applied to order {}. Transaction {} is {}.",
                order.order_number, transaction.id, transaction.payment_status
            );
            JsonResponse::success("Event processed.")
        },
        Ok(PaymentOutcomeResult::Replayed { transaction }) => {
            info!("📬️ Replay of payment {outcome} for transaction {}. Nothing to do.", transaction.id);
            JsonResponse::success("Event already processed.")
        },
        Ok(PaymentOutcomeResult::Ignored { transaction, reason }) => {
            info!("📬️ Payment {outcome} for transaction {} no longer applies: {reason}", transaction.id);
            JsonResponse::success("Event acknowledged.")
        },
        Err(PaymentGatewayError::UnknownTransaction(intent_id)) => {
            // The processor retries 404s. By the next delivery the intent will have been recorded.
            info!("📬️ No transaction recorded yet for payment intent {intent_id}. Asking the processor to retry.");
            return Err(ServerError::NoRecordFound(format!("Payment intent {intent_id}")));
        },
        Err(e) => {
            warn!("📬️ Could not apply webhook event {}. {e}", event.id);
            return Err(e.into());
        },
    };
    Ok(HttpResponse::Ok().json(result))
}
