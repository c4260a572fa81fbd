use domain::{EventType, PaymentId, WalletCommand, WalletId};
use event_bus::EventBus;
use rust_decimal::Decimal;

use super::CommandPublisher;
use crate::command_log::CommandLog;
use crate::error::Result;

/// Asks the payment gateway to authorize a payment.
#[derive(Debug, Clone)]
pub struct AuthorizeGatewayCommand<B, L> {
    publisher: CommandPublisher<B, L>,
}

impl<B: EventBus, L: CommandLog> AuthorizeGatewayCommand<B, L> {
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self { publisher }
    }

    /// Publishes `authorize_gateway` on `orchestrator.gateway`.
    pub async fn authorize(
        &self,
        payment_id: &PaymentId,
        wallet_id: &WalletId,
        amount: Decimal,
        currency: &str,
        token: Option<&str>,
    ) -> Result<()> {
        let payload = WalletCommand {
            wallet_id: wallet_id.clone(),
            payment_id: payment_id.clone(),
            amount,
            currency: currency.to_string(),
            token: token.map(str::to_string),
        };
        self.publisher.emit(EventType::AuthorizeGateway, payload).await
    }
}
