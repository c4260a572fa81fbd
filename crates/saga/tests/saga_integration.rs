//! Integration tests for the payment saga running against the simulated services.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FlakyBus;
use domain::{
    Event, EventType, Notification, Payment, PaymentId, PaymentStatus, WalletCommand, WalletId,
    topics,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saga::{
    CommandPublisher, CommandStatus, Disposition, InMemoryCommandLog, PaymentSagaHandler,
    RetryPolicy, SagaDispatcher, SagaError, SagaStep, SagaStore, SimulatedGateway,
    SimulatedNotifier, SimulatedPaymentService, SimulatedWallet,
};

type TestDispatcher = SagaDispatcher<FlakyBus, InMemoryCommandLog>;

struct TestHarness {
    bus: FlakyBus,
    log: InMemoryCommandLog,
    dispatcher: TestDispatcher,
    wallet: SimulatedWallet<FlakyBus>,
    gateway: SimulatedGateway<FlakyBus>,
    payments: SimulatedPaymentService<FlakyBus>,
    notifier: SimulatedNotifier<FlakyBus>,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::exponential(3, Duration::from_millis(10))).await
    }

    async fn with_retry_policy(retry: RetryPolicy) -> Self {
        let bus = FlakyBus::new();
        let log = InMemoryCommandLog::new();
        let publisher = CommandPublisher::with_retry_policy(bus.clone(), log.clone(), retry);
        let handler = Arc::new(PaymentSagaHandler::new(publisher));
        let dispatcher = SagaDispatcher::attach(&bus, handler).await;

        let wallet = SimulatedWallet::new(bus.clone());
        let gateway = SimulatedGateway::new(bus.clone());
        let payments = SimulatedPaymentService::new(bus.clone());
        let notifier = SimulatedNotifier::new(bus.clone());
        wallet.start().await;
        gateway.start().await;
        payments.start().await;
        notifier.start().await;

        Self {
            bus,
            log,
            dispatcher,
            wallet,
            gateway,
            payments,
            notifier,
        }
    }

    fn store(&self) -> &SagaStore {
        self.dispatcher.handler().store()
    }

    async fn start_payment(&self, amount: Decimal) -> PaymentId {
        let payment = Payment::new(WalletId::new("W-1"), "svc-streaming", amount, "EUR", "card");
        let payment_id = payment.id.clone();
        self.payments
            .create(payment, Some("tok_visa".to_string()))
            .await
            .unwrap();
        payment_id
    }

    /// Polls until the payment's saga reaches `step`.
    async fn wait_for_step(&self, payment_id: &PaymentId, step: SagaStep) {
        for _ in 0..400 {
            if self.store().step(payment_id).await == Some(step) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "payment {payment_id} never reached {step}, stuck at {:?}",
            self.store().step(payment_id).await
        );
    }

    /// Polls until the command log holds `count` records.
    async fn wait_for_log(&self, count: usize) {
        for _ in 0..400 {
            if self.log.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("command log never reached {count} records");
    }
}

fn wallet_event(event_type: EventType, payment_id: &PaymentId) -> Vec<u8> {
    Event::new(
        event_type,
        payment_id,
        WalletCommand {
            wallet_id: WalletId::new("W-1"),
            payment_id: payment_id.clone(),
            amount: dec!(20),
            currency: "EUR".to_string(),
            token: None,
        },
    )
    .encode()
    .unwrap()
}

mod outcomes {
    use super::*;

    #[tokio::test]
    async fn test_happy_path_completes_and_notifies() {
        let h = TestHarness::new().await;
        let payment_id = h.start_payment(dec!(150.75)).await;

        h.wait_for_step(&payment_id, SagaStep::Notified).await;

        // Verify the services saw the whole flow
        assert_eq!(
            h.payments.status_updates(&payment_id),
            vec![PaymentStatus::Completed]
        );
        assert_eq!(
            h.notifier.notifications(&payment_id),
            vec![Notification::PaymentSuccess]
        );
        assert_eq!(h.wallet.debited(&payment_id), Some(dec!(150.75)));
        assert_eq!(h.wallet.held(&payment_id), None);
        assert_eq!(h.gateway.authorized(&payment_id), Some(true));

        // Verify commands carried the real payment context
        let holds = h.bus.delivered("hold_funds");
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0]["payload"]["wallet_id"], "W-1");
        assert_eq!(holds[0]["payload"]["amount"], serde_json::json!(150.75));
        assert_eq!(holds[0]["payload"]["currency"], "EUR");
        let authorizations = h.bus.delivered("authorize_gateway");
        assert_eq!(authorizations[0]["payload"]["token"], "tok_visa");

        // Verify nothing was retried or logged
        assert_eq!(h.bus.attempts_on(topics::ORCHESTRATOR_GATEWAY).len(), 1);
        assert!(h.log.is_empty());
        assert!(h.store().unsettled().await.is_empty());

        let record = h.store().snapshot(&payment_id).await.unwrap();
        assert_eq!(
            record.history(),
            &[
                SagaStep::Created,
                SagaStep::HoldRequested,
                SagaStep::FundsHeld,
                SagaStep::AuthorizeRequested,
                SagaStep::GatewayAuthorized,
                SagaStep::DebitRequested,
                SagaStep::FundsDebited,
                SagaStep::Completed,
                SagaStep::Notified,
            ]
        );
    }

    #[tokio::test]
    async fn test_hold_failure_fails_payment_without_authorizing() {
        let h = TestHarness::new().await;
        h.wallet.set_fail_on_hold(true);
        let payment_id = h.start_payment(dec!(99)).await;

        h.wait_for_step(&payment_id, SagaStep::Notified).await;

        assert_eq!(
            h.payments.status_updates(&payment_id),
            vec![PaymentStatus::Failed]
        );
        assert_eq!(
            h.notifier.notifications(&payment_id),
            vec![Notification::PaymentFailure]
        );
        assert_eq!(h.bus.delivered_count("authorize_gateway"), 0);
        assert_eq!(h.bus.delivered_count("debit_funds"), 0);
        assert_eq!(h.gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_decline_releases_funds_then_fails() {
        let h = TestHarness::new().await;
        h.gateway.set_decline(Some("insufficient funds"));
        let payment_id = h.start_payment(dec!(42.10)).await;

        h.wait_for_step(&payment_id, SagaStep::Notified).await;

        // Verify compensation ran before the payment was failed
        assert_eq!(h.bus.delivered_count("release_funds"), 1);
        assert_eq!(h.wallet.released(&payment_id), Some(dec!(42.10)));
        assert_eq!(h.wallet.held(&payment_id), None);
        assert_eq!(h.bus.delivered_count("debit_funds"), 0);

        assert_eq!(
            h.payments.status_updates(&payment_id),
            vec![PaymentStatus::Failed]
        );
        assert_eq!(
            h.notifier.notifications(&payment_id),
            vec![Notification::PaymentFailure]
        );

        let record = h.store().snapshot(&payment_id).await.unwrap();
        assert!(record.history().contains(&SagaStep::ReleaseRequested));
        assert!(record.history().contains(&SagaStep::FundsReleased));
    }

    #[tokio::test]
    async fn test_slow_collaborators_keep_each_payment_in_order() {
        let h = TestHarness::new().await;
        h.wallet.set_latency(Duration::from_millis(30));
        h.gateway.set_latency(Duration::from_millis(20));
        h.payments.set_latency(Duration::from_millis(10));

        let mut payment_ids = Vec::new();
        for amount in [dec!(1), dec!(2), dec!(3)] {
            payment_ids.push(h.start_payment(amount).await);
        }

        for payment_id in &payment_ids {
            h.wait_for_step(payment_id, SagaStep::Notified).await;
            let record = h.store().snapshot(payment_id).await.unwrap();
            let history = record.history();
            let position = |step| history.iter().position(|s| *s == step).unwrap();
            assert!(position(SagaStep::HoldRequested) < position(SagaStep::AuthorizeRequested));
            assert!(position(SagaStep::AuthorizeRequested) < position(SagaStep::DebitRequested));
            assert!(position(SagaStep::DebitRequested) < position(SagaStep::Completed));
            assert_eq!(
                h.payments.status_updates(payment_id),
                vec![PaymentStatus::Completed]
            );
        }
        assert_eq!(h.notifier.total(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_payments_settle_independently() {
        let h = Arc::new(TestHarness::new().await);

        let mut tasks = Vec::new();
        for i in 1..=20 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                h.start_payment(Decimal::from(i)).await
            }));
        }
        let mut payment_ids = Vec::new();
        for task in tasks {
            payment_ids.push(task.await.unwrap());
        }

        for payment_id in &payment_ids {
            h.wait_for_step(payment_id, SagaStep::Notified).await;
        }

        assert_eq!(h.notifier.total(), 20);
        for payment_id in &payment_ids {
            assert_eq!(
                h.payments.status_updates(payment_id),
                vec![PaymentStatus::Completed]
            );
        }
        assert_eq!(h.store().len().await, 20);
        assert!(h.store().unsettled().await.is_empty());
    }
}

mod delivery {
    use super::*;

    #[tokio::test]
    async fn test_redelivered_event_is_a_duplicate() {
        let h = TestHarness::new().await;
        let payment_id = h.start_payment(dec!(10)).await;
        h.wait_for_step(&payment_id, SagaStep::Notified).await;

        let debited = h.bus.delivered("wallet.debit_funds");
        assert_eq!(debited.len(), 1);
        let bytes = serde_json::to_vec(&debited[0]).unwrap();

        let disposition = h.dispatcher.dispatch(&bytes).await.unwrap();
        assert_eq!(disposition, Disposition::Duplicate);

        // Give any stray reaction a chance to land
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.bus.delivered_count("payment_update_status"), 1);
        assert_eq!(h.notifier.notifications(&payment_id).len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_event_is_ignored() {
        let h = TestHarness::new().await;
        let payment_id = h.start_payment(dec!(10)).await;
        h.wait_for_step(&payment_id, SagaStep::Notified).await;

        let bytes = wallet_event(EventType::FundsReleased, &payment_id);
        let disposition = h.dispatcher.dispatch(&bytes).await.unwrap();

        assert_eq!(
            disposition,
            Disposition::Ignored {
                step: SagaStep::Notified
            }
        );
        assert_eq!(h.bus.delivered_count("payment_update_status"), 1);
        assert_eq!(
            h.payments.status_updates(&payment_id),
            vec![PaymentStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_dropped_without_error() {
        let h = TestHarness::new().await;
        let bytes = serde_json::to_vec(&serde_json::json!({
            "event_type": "wallet.frozen",
            "event_version": "1",
            "timestamp": "2024-01-01T00:00:00Z",
            "metadata": {"trace_id": "t", "message_group_id": "P", "message_deduplication_id": "d"},
            "payload": {"payment_id": "P"}
        }))
        .unwrap();

        let disposition = h.dispatcher.dispatch(&bytes).await.unwrap();

        assert_eq!(disposition, Disposition::Unknown);
        assert!(h.store().is_empty().await);
        assert!(h.bus.attempts_on(topics::ORCHESTRATOR_WALLET).is_empty());
    }
}

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_publish_retries_are_bounded_and_backed_off() {
        let h = TestHarness::with_retry_policy(RetryPolicy::default()).await;
        h.bus.fail_topic(topics::ORCHESTRATOR_WALLET);

        let payment_id = h.start_payment(dec!(5)).await;
        h.wait_for_log(1).await;

        let attempts = h.bus.attempts_on(topics::ORCHESTRATOR_WALLET);
        assert_eq!(attempts.len(), 3);
        assert!(attempts[1].at - attempts[0].at >= Duration::from_millis(100));
        assert!(attempts[2].at - attempts[1].at >= Duration::from_millis(200));

        let entries = h.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, CommandStatus::Failed);
        assert_eq!(entries[0].envelope.event_type, "hold_funds");
        assert_eq!(entries[0].payload["payment_id"], payment_id.as_str());

        // The saga stays on its arrival step so a redelivery can retry
        assert_eq!(h.store().step(&payment_id).await, Some(SagaStep::Created));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_the_reaction() {
        let h = TestHarness::new().await;
        h.bus.fail_topic(topics::ORCHESTRATOR_NOTIFICATION);
        let payment_id = PaymentId::new("P-notify");

        let disposition = h
            .dispatcher
            .dispatch(&wallet_event(EventType::FundsHoldFailed, &payment_id))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Applied(SagaStep::Failed));
        assert_eq!(h.bus.delivered_count("payment_update_status"), 1);
        assert_eq!(h.bus.delivered_count("notify_user"), 0);

        let entries = h.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].envelope.event_type, "notify_user");
    }

    #[tokio::test]
    async fn test_status_update_failure_blocks_notification_until_redelivery() {
        let h = TestHarness::new().await;
        h.bus.fail_topic(topics::ORCHESTRATOR_PAYMENT);
        let payment_id = PaymentId::new("P-status");
        let bytes = wallet_event(EventType::FundsHoldFailed, &payment_id);

        let err = h.dispatcher.dispatch(&bytes).await.unwrap_err();

        match err {
            SagaError::Publish {
                event_type,
                attempts,
                ..
            } => {
                assert_eq!(event_type, "payment_update_status");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected publish error, got {other:?}"),
        }
        assert_eq!(h.bus.delivered_count("notify_user"), 0);
        assert_eq!(
            h.store().step(&payment_id).await,
            Some(SagaStep::HoldFailed)
        );
        let unsettled = h.store().unsettled().await;
        assert_eq!(unsettled.len(), 1);
        assert_eq!(unsettled[0].payment_id(), &payment_id);

        // Once the transport recovers, the same event completes the reaction
        h.bus.heal_topic(topics::ORCHESTRATOR_PAYMENT);
        let disposition = h.dispatcher.dispatch(&bytes).await.unwrap();

        assert_eq!(disposition, Disposition::Applied(SagaStep::Notified));
        assert_eq!(h.bus.delivered_count("payment_update_status"), 1);
        assert_eq!(h.bus.delivered_count("notify_user"), 1);
        assert!(h.store().unsettled().await.is_empty());
    }
}
