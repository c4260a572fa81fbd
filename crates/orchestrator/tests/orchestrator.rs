//! End-to-end tests for the wired orchestrator.

use std::time::Duration;

use domain::{Notification, Payment, PaymentStatus, WalletId};
use orchestrator::{Config, Orchestrator, OrchestratorError};
use rust_decimal::Decimal;
use saga::SagaStep;

fn test_config() -> Config {
    Config {
        retry_base_delay: Duration::from_millis(5),
        demo_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

fn demo_payment() -> Payment {
    Payment::new(
        WalletId::new("wallet-1"),
        "svc-1",
        Decimal::new(2500, 2),
        "USD",
        "card",
    )
}

#[tokio::test]
async fn test_demo_payment_completes() {
    let config = test_config();
    let orchestrator = Orchestrator::start(&config).await;

    let payment_id = orchestrator
        .submit(demo_payment(), Some("tok".to_string()))
        .await
        .unwrap();
    let record = orchestrator
        .wait_for_outcome(&payment_id, config.demo_timeout)
        .await
        .unwrap();

    assert_eq!(record.step(), SagaStep::Notified);
    assert!(record.history().contains(&SagaStep::Completed));
    assert_eq!(record.processed_count(), 5);
    assert_eq!(
        orchestrator.payments().payment(&payment_id).unwrap().status,
        PaymentStatus::Completed
    );
    assert_eq!(
        orchestrator.notifier().notifications(&payment_id),
        vec![Notification::PaymentSuccess]
    );
    assert!(orchestrator.command_log().is_empty());
}

#[tokio::test]
async fn test_fail_hold_flag_fails_the_payment() {
    let config = Config {
        fail_hold: true,
        ..test_config()
    };
    let orchestrator = Orchestrator::start(&config).await;

    let payment_id = orchestrator.submit(demo_payment(), None).await.unwrap();
    let record = orchestrator
        .wait_for_outcome(&payment_id, config.demo_timeout)
        .await
        .unwrap();

    assert!(record.history().contains(&SagaStep::HoldFailed));
    assert_eq!(
        orchestrator.payments().payment(&payment_id).unwrap().status,
        PaymentStatus::Failed
    );
    assert_eq!(orchestrator.gateway().request_count(), 0);
}

#[tokio::test]
async fn test_fail_authorize_flag_releases_funds() {
    let config = Config {
        fail_authorize: true,
        ..test_config()
    };
    let orchestrator = Orchestrator::start(&config).await;

    let payment_id = orchestrator.submit(demo_payment(), None).await.unwrap();
    orchestrator
        .wait_for_outcome(&payment_id, config.demo_timeout)
        .await
        .unwrap();

    assert_eq!(
        orchestrator.wallet().released(&payment_id),
        Some(Decimal::new(2500, 2))
    );
    assert_eq!(orchestrator.wallet().debited(&payment_id), None);
    assert_eq!(
        orchestrator.notifier().notifications(&payment_id),
        vec![Notification::PaymentFailure]
    );
}

#[tokio::test]
async fn test_unknown_payment_times_out() {
    let orchestrator = Orchestrator::start(&test_config()).await;
    let payment_id = domain::PaymentId::new("never-submitted");

    let err = orchestrator
        .wait_for_outcome(&payment_id, Duration::from_millis(50))
        .await
        .unwrap_err();

    match err {
        OrchestratorError::Timeout { step, .. } => assert_eq!(step, None),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_every_saga_topic_has_a_listener() {
    let orchestrator = Orchestrator::start(&test_config()).await;

    for event_type in domain::EventType::SAGA_INBOUND {
        assert_eq!(
            orchestrator.bus().subscriber_count(event_type.topic()).await,
            1,
            "{event_type}"
        );
    }
    for topic in [
        domain::topics::ORCHESTRATOR_WALLET,
        domain::topics::ORCHESTRATOR_GATEWAY,
        domain::topics::ORCHESTRATOR_PAYMENT,
        domain::topics::ORCHESTRATOR_NOTIFICATION,
    ] {
        assert_eq!(orchestrator.bus().subscriber_count(topic).await, 1, "{topic}");
    }
}
