//! Routes raw bus messages to the payment saga handler.

use std::sync::Arc;

use domain::{EventType, InboundEvent, SchemaError};
use event_bus::{EventBus, handler_fn};

use crate::command_log::CommandLog;
use crate::error::{Result, SagaError};
use crate::handler::PaymentSagaHandler;
use crate::store::Disposition;

/// Entry point from the event bus into the saga.
///
/// Messages that cannot be decoded are logged and dropped with an error.
/// Messages whose event type the saga does not consume are dropped with a
/// warning and reported as [`Disposition::Unknown`]. A handler error is
/// logged as critical; the message is not retried by the in-memory bus.
pub struct SagaDispatcher<B, L> {
    handler: Arc<PaymentSagaHandler<B, L>>,
}

impl<B, L> Clone for SagaDispatcher<B, L> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<B, L> SagaDispatcher<B, L>
where
    B: EventBus + 'static,
    L: CommandLog + 'static,
{
    pub fn new(handler: Arc<PaymentSagaHandler<B, L>>) -> Self {
        Self { handler }
    }

    /// Subscribes a dispatcher to every topic the saga consumes.
    pub async fn attach<E>(bus: &E, handler: Arc<PaymentSagaHandler<B, L>>) -> Self
    where
        E: EventBus + ?Sized,
    {
        let dispatcher = Self::new(handler);
        for event_type in EventType::SAGA_INBOUND {
            let listener = dispatcher.clone();
            bus.subscribe(
                event_type.topic(),
                handler_fn(move |message| {
                    let listener = listener.clone();
                    async move {
                        // Outcomes are logged by dispatch; there is no caller to return them to.
                        let _ = listener.dispatch(&message).await;
                    }
                }),
            )
            .await;
        }
        tracing::info!(
            topics = EventType::SAGA_INBOUND.len(),
            "saga dispatcher attached"
        );
        dispatcher
    }

    /// Returns the handler messages are routed to.
    pub fn handler(&self) -> &Arc<PaymentSagaHandler<B, L>> {
        &self.handler
    }

    /// Decodes one message and hands it to the saga handler.
    pub async fn dispatch(&self, message: &[u8]) -> Result<Disposition> {
        let event = match InboundEvent::decode(message) {
            Ok(event) => event,
            Err(SchemaError::UnknownEventType(event_type)) => {
                tracing::warn!(%event_type, "unknown event type received, dropping");
                metrics::counter!("saga_events_unknown_total").increment(1);
                return Ok(Disposition::Unknown);
            }
            Err(e) => {
                tracing::error!(error = %e, "could not decode event, dropping");
                metrics::counter!("saga_decode_errors_total").increment(1);
                return Err(SagaError::Schema(e));
            }
        };

        let event_type = event.event_type();
        let payment_id = event.payment_id().clone();
        let deduplication_id = event.deduplication_id();
        tracing::debug!(%event_type, %payment_id, %deduplication_id, "dispatching event");
        match self.handler.handle(&event).await {
            Ok(disposition) => Ok(disposition),
            Err(e) => {
                tracing::error!(
                    %event_type,
                    %payment_id,
                    %deduplication_id,
                    error = %e,
                    "CRITICAL: saga handler failed"
                );
                metrics::counter!("saga_handler_failures_total", "event_type" => event_type.as_str())
                    .increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::{Event, PaymentId, WalletCommand, WalletId};
    use event_bus::InMemoryEventBus;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::command_log::InMemoryCommandLog;
    use crate::commands::CommandPublisher;
    use crate::state::SagaStep;

    type TestDispatcher = SagaDispatcher<InMemoryEventBus, InMemoryCommandLog>;

    fn dispatcher() -> TestDispatcher {
        let publisher = CommandPublisher::new(InMemoryEventBus::new(), InMemoryCommandLog::new());
        SagaDispatcher::new(Arc::new(PaymentSagaHandler::new(publisher)))
    }

    #[tokio::test]
    async fn test_dispatch_decodes_and_handles() {
        let dispatcher = dispatcher();
        let payment_id = PaymentId::new("P");
        let bytes = Event::new(
            EventType::GatewayAuthorizationFailed,
            &payment_id,
            domain::GatewayAuthorizationFailed {
                payment_id: payment_id.clone(),
                wallet_id: WalletId::new("W"),
                amount: dec!(1),
                currency: "EUR".to_string(),
                reason: "declined".to_string(),
            },
        )
        .encode()
        .unwrap();

        let disposition = dispatcher.dispatch(&bytes).await.unwrap();
        assert_eq!(disposition, Disposition::Applied(SagaStep::ReleaseRequested));
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let dispatcher = dispatcher();
        let err = dispatcher.dispatch(b"{not json").await.unwrap_err();
        assert!(matches!(err, SagaError::Schema(SchemaError::Decode(_))));
        assert!(dispatcher.handler().store().is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_dropped() {
        let dispatcher = dispatcher();
        let disposition = dispatcher
            .dispatch(br#"{"event_type":"wallet.teleported","payload":{}}"#)
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Unknown);
        assert!(dispatcher.handler().store().is_empty().await);
    }

    #[tokio::test]
    async fn test_known_event_the_saga_does_not_consume_is_dropped() {
        let dispatcher = dispatcher();
        let payment_id = PaymentId::new("P");
        let bytes = Event::new(
            EventType::PaymentFailed,
            &payment_id,
            domain::PaymentStatusUpdate {
                payment_id: payment_id.clone(),
                status: domain::PaymentStatus::Failed,
            },
        )
        .encode()
        .unwrap();

        let disposition = dispatcher.dispatch(&bytes).await.unwrap();
        assert_eq!(disposition, Disposition::Unknown);
        assert!(dispatcher.handler().store().is_empty().await);
    }

    #[tokio::test]
    async fn test_opaque_trace_id_is_accepted() {
        let dispatcher = dispatcher();
        let bytes = br#"{
            "event_type": "wallet.hold_funds",
            "event_version": "1",
            "timestamp": "2026-01-01T12:00:00Z",
            "metadata": {
                "trace_id": "trace-abc-123",
                "message_group_id": "P-7",
                "message_deduplication_id": "wallet.hold_funds.P-7"
            },
            "payload": {
                "wallet_id": "W",
                "payment_id": "P-7",
                "amount": 10,
                "currency": "EUR"
            }
        }"#;

        let disposition = dispatcher.dispatch(bytes).await.unwrap();
        assert_eq!(disposition, Disposition::Applied(SagaStep::AuthorizeRequested));
    }

    #[tokio::test]
    async fn test_attach_subscribes_every_inbound_topic() {
        let bus = InMemoryEventBus::new();
        let publisher = CommandPublisher::new(bus.clone(), InMemoryCommandLog::new());
        let handler = Arc::new(PaymentSagaHandler::new(publisher));

        SagaDispatcher::attach(&bus, handler).await;

        for event_type in EventType::SAGA_INBOUND {
            assert_eq!(bus.subscriber_count(event_type.topic()).await, 1);
        }
    }

    #[tokio::test]
    async fn test_attached_dispatcher_reacts_to_published_event() {
        let bus = InMemoryEventBus::new();
        let publisher = CommandPublisher::new(bus.clone(), InMemoryCommandLog::new());
        let handler = Arc::new(PaymentSagaHandler::new(publisher));
        SagaDispatcher::attach(&bus, Arc::clone(&handler)).await;

        let payment_id = PaymentId::new("P");
        let bytes = Event::new(
            EventType::FundsDebited,
            &payment_id,
            WalletCommand {
                wallet_id: WalletId::new("W"),
                payment_id: payment_id.clone(),
                amount: dec!(5),
                currency: "USD".to_string(),
                token: None,
            },
        )
        .encode()
        .unwrap();
        bus.publish("wallet.debit_funds", bytes).await.unwrap();

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
        loop {
            if handler.store().step(&payment_id).await == Some(SagaStep::Completed) {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "saga did not advance");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}
