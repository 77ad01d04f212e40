use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentOutcome, PaymentStatusType, Transaction},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    traits::{CancellationResult, OrderCreationResult, PaymentGatewayDatabase, PaymentGatewayError, PaymentOutcomeResult},
};

/// `OrderFlowApi` is the primary API for driving the order lifecycle: intake, payment attempts, webhook
/// outcomes and cancellations. It owns the event hook producers, so every state change that downstream
/// systems care about is published from exactly one place.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Losing an intake race is expected under concurrent submissions and resolved by re-running the whole
    /// intake. More attempts than this means the customer is hammering the endpoint and can retry themselves.
    const MAX_INTAKE_ATTEMPTS: usize = 4;

    /// Submit an incoming cart to the engine.
    ///
    /// The order is validated, then created atomically together with its stock reservations. Re-submitting
    /// the cart the customer already has open returns the existing order (`created == false`) instead of
    /// creating a new one, so clients can retry intake safely. Submitting a *different* cart supersedes the
    /// open checkout; the annulled-order hook fires for the stale order.
    ///
    /// Concurrent intakes for the same customer (or write contention on a popular product row) surface as
    /// [`PaymentGatewayError::Conflict`] internally and are retried here, dedup check included, up to
    /// [`Self::MAX_INTAKE_ATTEMPTS`] times.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<OrderCreationResult, PaymentGatewayError> {
        order.validate()?;
        let customer_id = order.customer_id;
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            match self.db.create_order_with_reservation(order.clone()).await {
                Ok(result) => break result,
                Err(PaymentGatewayError::Conflict) if attempts < Self::MAX_INTAKE_ATTEMPTS => {
                    debug!("🔄️📝️ Intake for customer {customer_id} lost a write race (attempt {attempts}). Retrying.");
                },
                Err(e) => return Err(e),
            }
        };
        if let Some(stale) = &result.superseded {
            self.call_order_annulled_hook(stale).await;
        }
        if result.created {
            debug!(
                "🔄️📝️ Intake complete. Order {} created for customer {customer_id}.",
                result.order.order_number
            );
        } else {
            debug!(
                "🔄️📝️ Intake matched the open checkout {} for customer {customer_id}. Nothing new created.",
                result.order.order_number
            );
        }
        Ok(result)
    }

    /// Opens a payment attempt for an order ahead of a call to the payment processor. Any earlier attempt
    /// still waiting for an outcome is superseded.
    pub async fn initiate_payment(
        &self,
        order_id: OrderId,
        customer_id: i64,
        currency: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        let transaction = self.db.begin_payment_attempt(order_id, customer_id, currency).await?;
        trace!("🔄️💰️ Payment attempt {} opened for order {order_id}", transaction.id);
        Ok(transaction)
    }

    /// Records the processor's intent id against the attempt. Call this before handing the payment handle
    /// to the client, so that the webhook always finds the attempt.
    pub async fn attach_payment_intent(
        &self,
        transaction_id: i64,
        intent_id: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        self.db.attach_payment_intent(transaction_id, intent_id).await
    }

    /// Marks an attempt failed because the processor call never got off the ground. No webhook will ever
    /// arrive for it.
    pub async fn fail_payment_attempt(&self, transaction_id: i64) -> Result<Transaction, PaymentGatewayError> {
        self.db.fail_payment_attempt(transaction_id).await
    }

    /// Applies a payment outcome delivered by the processor's webhook. Exactly-once semantics live in the
    /// backend; this method's job is to fire the order-paid hook when, and only when, the outcome freshly
    /// settles an order.
    pub async fn handle_payment_outcome(
        &self,
        intent_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<PaymentOutcomeResult, PaymentGatewayError> {
        let result = self.db.apply_payment_outcome(intent_id, outcome).await?;
        if let PaymentOutcomeResult::Applied { order, transaction } = &result {
            if order.payment_status == PaymentStatusType::Paid {
                debug!("🔄️💰️ Order {} is paid. Notifying subscribers.", order.order_number);
                self.call_order_paid_hook(order, transaction).await;
            }
        }
        Ok(result)
    }

    /// Cancels an order on the customer's behalf, releasing its stock. The annulled-order hook fires only
    /// when this call did the cancelling; retries of an already-cancelled order stay silent.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        customer_id: i64,
    ) -> Result<CancellationResult, PaymentGatewayError> {
        let result = self.db.cancel_order_for_customer(order_id, customer_id).await?;
        if result.newly_cancelled {
            self.call_order_annulled_hook(&result.order).await;
        }
        Ok(result)
    }

    async fn call_order_paid_hook(&self, order: &Order, transaction: &Transaction) {
        for emitter in &self.producers.order_paid_producer {
            let event = OrderPaidEvent::new(order.clone(), transaction.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🔄️❌️ Notifying order annulled hook subscribers about {}", order.order_number);
            let event = OrderAnnulledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
