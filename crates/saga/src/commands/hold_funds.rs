use domain::{EventType, PaymentId, WalletCommand, WalletId};
use event_bus::EventBus;
use rust_decimal::Decimal;

use super::CommandPublisher;
use crate::command_log::CommandLog;
use crate::error::Result;

/// Asks the wallet service to reserve funds for a payment.
#[derive(Debug, Clone)]
pub struct HoldFundsCommand<B, L> {
    publisher: CommandPublisher<B, L>,
}

impl<B: EventBus, L: CommandLog> HoldFundsCommand<B, L> {
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self { publisher }
    }

    /// Publishes `hold_funds` on `orchestrator.wallet`.
    pub async fn hold(
        &self,
        payment_id: &PaymentId,
        wallet_id: &WalletId,
        amount: Decimal,
        currency: &str,
    ) -> Result<()> {
        let payload = WalletCommand {
            wallet_id: wallet_id.clone(),
            payment_id: payment_id.clone(),
            amount,
            currency: currency.to_string(),
            token: None,
        };
        self.publisher.emit(EventType::HoldFunds, payload).await
    }
}
