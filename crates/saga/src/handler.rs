//! The payment saga's reactions to inbound events.

use std::time::Instant;

use domain::{
    DeduplicationId, Event, EventType, GatewayAuthorizationFailed, GatewayAuthorized,
    InboundEvent, Notification, PaymentCreated, PaymentId, PaymentStatus, PaymentStatusUpdate,
    WalletCommand,
};
use event_bus::EventBus;
use tokio::sync::OwnedMutexGuard;

use crate::command_log::CommandLog;
use crate::commands::{
    AuthorizeGatewayCommand, CommandPublisher, DebitFundsCommand, HoldFundsCommand,
    NotifyUserCommand, ReleaseFundsCommand, UpdatePaymentStatusCommand,
};
use crate::error::Result;
use crate::state::SagaStep;
use crate::store::{Disposition, PaymentContext, SagaRecord, SagaStore};

/// Drives each payment through the saga, one inbound event at a time.
///
/// Every reaction runs while holding the payment's record in the
/// [`SagaStore`], so events for one payment are handled strictly one after
/// the other. A redelivered event (same deduplication id) and an event that
/// does not fit the saga's current step are both acknowledged without
/// issuing any command.
///
/// The first command of a reaction is critical: if it fails, the error is
/// returned and the saga stays on the arrival step so a redelivery can retry.
/// A notification that follows a successful status update is not: its
/// failure is logged and the reaction still succeeds.
#[derive(Debug, Clone)]
pub struct PaymentSagaHandler<B, L> {
    hold: HoldFundsCommand<B, L>,
    release: ReleaseFundsCommand<B, L>,
    debit: DebitFundsCommand<B, L>,
    authorize: AuthorizeGatewayCommand<B, L>,
    update_status: UpdatePaymentStatusCommand<B, L>,
    notify: NotifyUserCommand<B, L>,
    store: SagaStore,
}

impl<B, L> PaymentSagaHandler<B, L>
where
    B: EventBus + Clone,
    L: CommandLog + Clone,
{
    /// Creates a handler whose six commands share one publisher.
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self::with_store(publisher, SagaStore::new())
    }

    /// Creates a handler backed by an existing saga store.
    pub fn with_store(publisher: CommandPublisher<B, L>, store: SagaStore) -> Self {
        Self {
            hold: HoldFundsCommand::new(publisher.clone()),
            release: ReleaseFundsCommand::new(publisher.clone()),
            debit: DebitFundsCommand::new(publisher.clone()),
            authorize: AuthorizeGatewayCommand::new(publisher.clone()),
            update_status: UpdatePaymentStatusCommand::new(publisher.clone()),
            notify: NotifyUserCommand::new(publisher),
            store,
        }
    }
}

impl<B, L> PaymentSagaHandler<B, L>
where
    B: EventBus,
    L: CommandLog,
{
    /// Returns the saga store.
    pub fn store(&self) -> &SagaStore {
        &self.store
    }

    /// Routes a decoded inbound event to its reaction.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Disposition> {
        metrics::counter!("saga_events_received_total", "event_type" => event.event_type().as_str())
            .increment(1);

        match event {
            InboundEvent::PaymentCreated(e) => self.handle_payment_created(e).await,
            InboundEvent::FundsHeld(e) => self.handle_funds_held(e).await,
            InboundEvent::FundsHoldFailed(e) => self.handle_funds_hold_failed(e).await,
            InboundEvent::GatewayAuthorized(e) => self.handle_gateway_authorized(e).await,
            InboundEvent::GatewayAuthorizationFailed(e) => {
                self.handle_gateway_authorization_failed(e).await
            }
            InboundEvent::FundsDebited(e) => self.handle_funds_debited(e).await,
            InboundEvent::PaymentCompleted(e) => self.handle_payment_completed(e).await,
            InboundEvent::FundsReleased(e) => self.handle_funds_released(e).await,
        }
    }

    /// `payment.created`: hold the payment's amount in the user's wallet.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_payment_created(&self, event: &Event<PaymentCreated>) -> Result<Disposition> {
        let payment = &event.payload;
        let context = PaymentContext {
            wallet_id: payment.wallet_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            token: payment.token.clone(),
        };
        let admission = self
            .admit(EventType::PaymentCreated, &payment.payment_id, event.deduplication_id(), Some(context))
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!(wallet_id = %payment.wallet_id, "holding funds");
        self.hold
            .hold(&payment.payment_id, &payment.wallet_id, payment.amount, &payment.currency)
            .await?;

        Ok(admitted.advance())
    }

    /// `wallet.hold_funds`: ask the gateway to authorize the held amount.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_funds_held(&self, event: &Event<WalletCommand>) -> Result<Disposition> {
        let held = &event.payload;
        let admission = self
            .admit(EventType::FundsHeld, &held.payment_id, event.deduplication_id(), Some(wallet_context(held)))
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        // The wallet's answer may not echo the token; the record keeps the one seen at creation.
        let token = admitted.token();
        if token.is_none() {
            tracing::warn!("no payment token known, authorizing without one");
        }
        tracing::info!("authorizing with gateway");
        self.authorize
            .authorize(
                &held.payment_id,
                &held.wallet_id,
                held.amount,
                &held.currency,
                token.as_deref(),
            )
            .await?;

        Ok(admitted.advance())
    }

    /// `wallet.hold_funds_failed`: fail the payment and tell the user.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_funds_hold_failed(&self, event: &Event<WalletCommand>) -> Result<Disposition> {
        let failed = &event.payload;
        let admission = self
            .admit(
                EventType::FundsHoldFailed,
                &failed.payment_id,
                event.deduplication_id(),
                Some(wallet_context(failed)),
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!("funds could not be held, terminating saga");
        let step = self.fail_payment(&failed.payment_id).await?;

        Ok(admitted.settle(step))
    }

    /// `gateway.authorized`: debit the held funds.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_gateway_authorized(
        &self,
        event: &Event<GatewayAuthorized>,
    ) -> Result<Disposition> {
        let authorized = &event.payload;
        let context = PaymentContext {
            wallet_id: authorized.wallet_id.clone(),
            amount: authorized.amount,
            currency: authorized.currency.clone(),
            token: None,
        };
        let admission = self
            .admit(
                EventType::GatewayAuthorized,
                &authorized.payment_id,
                event.deduplication_id(),
                Some(context),
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!("debiting funds");
        self.debit
            .debit(
                &authorized.payment_id,
                &authorized.wallet_id,
                authorized.amount,
                &authorized.currency,
            )
            .await?;

        Ok(admitted.advance())
    }

    /// `gateway.authorization_failed`: compensate by releasing the held funds.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_gateway_authorization_failed(
        &self,
        event: &Event<GatewayAuthorizationFailed>,
    ) -> Result<Disposition> {
        let declined = &event.payload;
        let context = PaymentContext {
            wallet_id: declined.wallet_id.clone(),
            amount: declined.amount,
            currency: declined.currency.clone(),
            token: None,
        };
        let admission = self
            .admit(
                EventType::GatewayAuthorizationFailed,
                &declined.payment_id,
                event.deduplication_id(),
                Some(context),
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!(reason = %declined.reason, "authorization declined, releasing funds");
        self.release
            .release(
                &declined.payment_id,
                &declined.wallet_id,
                declined.amount,
                &declined.currency,
            )
            .await?;

        Ok(admitted.advance())
    }

    /// `wallet.debit_funds`: mark the payment COMPLETED.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_funds_debited(&self, event: &Event<WalletCommand>) -> Result<Disposition> {
        let debited = &event.payload;
        let admission = self
            .admit(
                EventType::FundsDebited,
                &debited.payment_id,
                event.deduplication_id(),
                Some(wallet_context(debited)),
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!("finalizing payment");
        if let Err(e) = self
            .update_status
            .update_status(&debited.payment_id, PaymentStatus::Completed)
            .await
        {
            tracing::error!(error = %e, "CRITICAL: funds debited but payment status not updated");
            return Err(e);
        }
        metrics::counter!("saga_payments_completed_total").increment(1);

        Ok(admitted.advance())
    }

    /// `payment.completed`: tell the user the payment succeeded.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_payment_completed(
        &self,
        event: &Event<PaymentStatusUpdate>,
    ) -> Result<Disposition> {
        let completed = &event.payload;
        let admission = self
            .admit(
                EventType::PaymentCompleted,
                &completed.payment_id,
                event.deduplication_id(),
                None,
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        let step = self
            .notify_user(&completed.payment_id, Notification::PaymentSuccess, SagaStep::Completed)
            .await;
        tracing::info!("payment saga completed successfully");

        Ok(admitted.settle(step))
    }

    /// `wallet.funds_released`: fail the payment and tell the user.
    #[tracing::instrument(
        skip(self, event),
        fields(payment_id = %event.payload.payment_id, trace_id = %event.envelope.trace_id())
    )]
    pub async fn handle_funds_released(&self, event: &Event<WalletCommand>) -> Result<Disposition> {
        let released = &event.payload;
        let admission = self
            .admit(
                EventType::FundsReleased,
                &released.payment_id,
                event.deduplication_id(),
                Some(wallet_context(released)),
            )
            .await;
        let mut admitted = match admission {
            Ok(admitted) => admitted,
            Err(disposition) => return Ok(disposition),
        };

        tracing::info!("funds released, terminating saga");
        let step = self.fail_payment(&released.payment_id).await?;

        Ok(admitted.settle(step))
    }

    /// Marks a payment FAILED, then notifies the user.
    async fn fail_payment(&self, payment_id: &PaymentId) -> Result<SagaStep> {
        if let Err(e) = self
            .update_status
            .update_status(payment_id, PaymentStatus::Failed)
            .await
        {
            tracing::error!(error = %e, "CRITICAL: payment failed but status not updated");
            return Err(e);
        }
        metrics::counter!("saga_payments_failed_total").increment(1);

        let step = self
            .notify_user(payment_id, Notification::PaymentFailure, SagaStep::Failed)
            .await;
        tracing::info!("payment saga failed and was terminated");
        Ok(step)
    }

    /// Sends a notification; a failure is logged and leaves the saga on `settled`.
    async fn notify_user(
        &self,
        payment_id: &PaymentId,
        notification: Notification,
        settled: SagaStep,
    ) -> SagaStep {
        match self.notify.notify(payment_id, notification).await {
            Ok(()) => SagaStep::Notified,
            Err(e) => {
                tracing::warn!(%notification, error = %e, "failed to notify user");
                metrics::counter!("saga_notification_failures_total").increment(1);
                settled
            }
        }
    }

    /// Locks the payment's record and decides whether the event may run.
    ///
    /// On admission the record has moved to the event's arrival step and
    /// stays locked until the returned guard is settled or dropped.
    async fn admit(
        &self,
        event_type: EventType,
        payment_id: &PaymentId,
        deduplication_id: DeduplicationId,
        context: Option<PaymentContext>,
    ) -> std::result::Result<Admitted, Disposition> {
        let mut record = self.store.record(payment_id).await.lock_owned().await;

        if record.has_processed(&deduplication_id) {
            tracing::info!(%deduplication_id, "duplicate event, skipping");
            metrics::counter!("saga_events_duplicate_total").increment(1);
            return Err(Disposition::Duplicate);
        }

        let current = record.step();
        let steps = SagaStep::arrival(event_type).zip(SagaStep::outcome(event_type));
        let (arrival, outcome) = match steps {
            Some(steps) if current.permits(event_type, record.is_fresh()) => steps,
            _ => {
                tracing::warn!(%event_type, step = %current, "event does not fit saga step, ignoring");
                metrics::counter!("saga_events_ignored_total").increment(1);
                return Err(Disposition::Ignored { step: current });
            }
        };

        if let Some(context) = context {
            record.remember(context);
        }
        record.enter(arrival);

        Ok(Admitted {
            record,
            event_type,
            outcome,
            deduplication_id,
            started: Instant::now(),
        })
    }
}

/// A locked saga record whose event is being reacted to.
struct Admitted {
    record: OwnedMutexGuard<SagaRecord>,
    event_type: EventType,
    /// Step reached once the event's command has been issued.
    outcome: SagaStep,
    deduplication_id: DeduplicationId,
    started: Instant,
}

impl Admitted {
    fn token(&self) -> Option<String> {
        self.record.context().and_then(|context| context.token.clone())
    }

    /// Settles on the event's outcome step.
    fn advance(&mut self) -> Disposition {
        let step = self.outcome;
        self.settle(step)
    }

    /// Records the step the reaction reached and marks the event processed.
    fn settle(&mut self, step: SagaStep) -> Disposition {
        metrics::histogram!("saga_step_duration_seconds", "event_type" => self.event_type.as_str())
            .record(self.started.elapsed().as_secs_f64());

        self.record.enter(step);
        self.record.mark_processed(self.deduplication_id.clone());
        tracing::debug!(%step, "saga advanced");
        Disposition::Applied(step)
    }
}

fn wallet_context(command: &WalletCommand) -> PaymentContext {
    PaymentContext {
        wallet_id: command.wallet_id.clone(),
        amount: command.amount,
        currency: command.currency.clone(),
        token: command.token.clone(),
    }
}
