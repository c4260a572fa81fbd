//! Decoding of the events the payment saga consumes.

use common::PaymentId;

use crate::{
    CommandEvent, DeduplicationId, Event, EventType, GatewayAuthorizationFailed,
    GatewayAuthorized, PaymentCreated, PaymentScoped, PaymentStatusUpdate, Result, SchemaError,
    WalletCommand, peek_event_type,
};

/// A decoded event on one of the saga's inbound topics.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    PaymentCreated(Event<PaymentCreated>),
    FundsHeld(Event<WalletCommand>),
    FundsHoldFailed(Event<WalletCommand>),
    GatewayAuthorized(Event<GatewayAuthorized>),
    GatewayAuthorizationFailed(Event<GatewayAuthorizationFailed>),
    FundsDebited(Event<WalletCommand>),
    PaymentCompleted(Event<PaymentStatusUpdate>),
    FundsReleased(Event<WalletCommand>),
}

impl InboundEvent {
    /// Decodes a message by reading its discriminator first and then its typed payload.
    ///
    /// Known event types the saga does not consume are reported as
    /// [`SchemaError::UnknownEventType`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let event_type = peek_event_type(bytes)?;
        let event = match event_type {
            EventType::PaymentCreated => InboundEvent::PaymentCreated(Event::decode(bytes)?),
            EventType::FundsHeld => InboundEvent::FundsHeld(Event::decode(bytes)?),
            EventType::FundsHoldFailed => InboundEvent::FundsHoldFailed(Event::decode(bytes)?),
            EventType::GatewayAuthorized => InboundEvent::GatewayAuthorized(Event::decode(bytes)?),
            EventType::GatewayAuthorizationFailed => {
                InboundEvent::GatewayAuthorizationFailed(Event::decode(bytes)?)
            }
            EventType::FundsDebited => InboundEvent::FundsDebited(Event::decode(bytes)?),
            EventType::PaymentCompleted => InboundEvent::PaymentCompleted(Event::decode(bytes)?),
            EventType::FundsReleased => InboundEvent::FundsReleased(Event::decode(bytes)?),
            other => return Err(SchemaError::UnknownEventType(other.as_str().to_string())),
        };
        Ok(event)
    }

    /// Returns the event's discriminator.
    pub fn event_type(&self) -> EventType {
        match self {
            InboundEvent::PaymentCreated(_) => EventType::PaymentCreated,
            InboundEvent::FundsHeld(_) => EventType::FundsHeld,
            InboundEvent::FundsHoldFailed(_) => EventType::FundsHoldFailed,
            InboundEvent::GatewayAuthorized(_) => EventType::GatewayAuthorized,
            InboundEvent::GatewayAuthorizationFailed(_) => EventType::GatewayAuthorizationFailed,
            InboundEvent::FundsDebited(_) => EventType::FundsDebited,
            InboundEvent::PaymentCompleted(_) => EventType::PaymentCompleted,
            InboundEvent::FundsReleased(_) => EventType::FundsReleased,
        }
    }

    /// Returns the envelope.
    pub fn envelope(&self) -> &CommandEvent {
        match self {
            InboundEvent::PaymentCreated(e) => &e.envelope,
            InboundEvent::FundsHeld(e)
            | InboundEvent::FundsHoldFailed(e)
            | InboundEvent::FundsDebited(e)
            | InboundEvent::FundsReleased(e) => &e.envelope,
            InboundEvent::GatewayAuthorized(e) => &e.envelope,
            InboundEvent::GatewayAuthorizationFailed(e) => &e.envelope,
            InboundEvent::PaymentCompleted(e) => &e.envelope,
        }
    }

    /// Returns the payment the event is about.
    pub fn payment_id(&self) -> &PaymentId {
        match self {
            InboundEvent::PaymentCreated(e) => e.payload.payment_id(),
            InboundEvent::FundsHeld(e)
            | InboundEvent::FundsHoldFailed(e)
            | InboundEvent::FundsDebited(e)
            | InboundEvent::FundsReleased(e) => e.payload.payment_id(),
            InboundEvent::GatewayAuthorized(e) => e.payload.payment_id(),
            InboundEvent::GatewayAuthorizationFailed(e) => e.payload.payment_id(),
            InboundEvent::PaymentCompleted(e) => e.payload.payment_id(),
        }
    }

    /// Returns the deduplication id, deriving it when the producer left it blank.
    pub fn deduplication_id(&self) -> DeduplicationId {
        self.envelope().deduplication_id_for(self.payment_id())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{PaymentStatus, WalletId};

    fn wallet_event(event_type: EventType) -> Event<WalletCommand> {
        let payment_id = PaymentId::new("P-1");
        Event::new(
            event_type,
            &payment_id,
            WalletCommand {
                wallet_id: WalletId::new("W-1"),
                payment_id: payment_id.clone(),
                amount: dec!(150.75),
                currency: "EUR".to_string(),
                token: None,
            },
        )
    }

    #[test]
    fn test_decode_routes_by_discriminator() {
        let bytes = wallet_event(EventType::FundsHoldFailed).encode().unwrap();
        let event = InboundEvent::decode(&bytes).unwrap();

        assert!(matches!(event, InboundEvent::FundsHoldFailed(_)));
        assert_eq!(event.event_type(), EventType::FundsHoldFailed);
        assert_eq!(event.payment_id(), &PaymentId::new("P-1"));
    }

    #[test]
    fn test_decode_status_update() {
        let payment_id = PaymentId::new("P-2");
        let event = Event::new(
            EventType::PaymentCompleted,
            &payment_id,
            PaymentStatusUpdate {
                payment_id: payment_id.clone(),
                status: PaymentStatus::Completed,
            },
        );

        let decoded = InboundEvent::decode(&event.encode().unwrap()).unwrap();
        match decoded {
            InboundEvent::PaymentCompleted(e) => assert_eq!(e.payload.status, PaymentStatus::Completed),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_commands_are_not_inbound() {
        let bytes = wallet_event(EventType::HoldFunds).encode().unwrap();
        assert!(matches!(
            InboundEvent::decode(&bytes),
            Err(SchemaError::UnknownEventType(t)) if t == "hold_funds"
        ));
    }

    #[test]
    fn test_payload_mismatch_is_a_decode_error() {
        let bytes = br#"{"event_type":"gateway.authorized","payload":{"payment_id":"P"}}"#;
        assert!(matches!(
            InboundEvent::decode(bytes),
            Err(SchemaError::Decode(_))
        ));
    }

    #[test]
    fn test_deduplication_id_is_derived_when_missing() {
        let bytes = br#"{
            "event_type": "wallet.debit_funds",
            "payload": {"wallet_id":"W","payment_id":"P-7","amount":5,"currency":"USD"}
        }"#;
        let event = InboundEvent::decode(bytes).unwrap();
        assert_eq!(event.deduplication_id().as_str(), "wallet.debit_funds.P-7");
    }

    #[test]
    fn test_stamped_deduplication_id_is_kept() {
        let bytes = wallet_event(EventType::FundsHeld).encode().unwrap();
        let event = InboundEvent::decode(&bytes).unwrap();
        assert_eq!(event.deduplication_id().as_str(), "wallet.hold_funds.P-1");
    }
}
