use domain::{EventType, PaymentId, WalletCommand, WalletId};
use event_bus::EventBus;
use rust_decimal::Decimal;

use super::CommandPublisher;
use crate::command_log::CommandLog;
use crate::error::Result;

/// Asks the wallet service to take held funds for good.
#[derive(Debug, Clone)]
pub struct DebitFundsCommand<B, L> {
    publisher: CommandPublisher<B, L>,
}

impl<B: EventBus, L: CommandLog> DebitFundsCommand<B, L> {
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self { publisher }
    }

    /// Publishes `debit_funds` on `orchestrator.wallet`.
    pub async fn debit(
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
        self.publisher.emit(EventType::DebitFunds, payload).await
    }
}
