//! Orchestrator demo entry point.
//!
//! Starts the saga with its simulated services, submits one payment and
//! waits for the user to be notified of its outcome.

use std::process::ExitCode;

use domain::{Payment, PaymentStatus, WalletId};
use metrics_exporter_prometheus::PrometheusBuilder;
use orchestrator::{Config, Orchestrator, OrchestratorError};
use rust_decimal::Decimal;
use tokio::signal;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "orchestrator stopped");
            eprintln!("orchestrator: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> orchestrator::Result<()> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    orchestrator::init_tracing(&config)?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| OrchestratorError::Metrics(e.to_string()))?;

    // 3. Wire the saga and the simulated services
    let orchestrator = Orchestrator::start(&config).await;

    // 4. Submit one payment
    let payment = Payment::new(
        WalletId::new("wallet-demo"),
        "svc-demo",
        Decimal::new(15075, 2),
        "EUR",
        "card",
    );
    let payment_id = orchestrator
        .submit(payment, Some("tok_demo".to_string()))
        .await?;
    tracing::info!(%payment_id, "demo payment submitted");

    // 5. Wait for the outcome or an interrupt
    let outcome = tokio::select! {
        outcome = orchestrator.wait_for_outcome(&payment_id, config.demo_timeout) => Some(outcome),
        _ = signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
            None
        }
    };

    for record in orchestrator.store().unsettled().await {
        tracing::warn!(
            payment_id = %record.payment_id(),
            step = %record.step(),
            processed = record.processed_count(),
            "saga left unsettled"
        );
    }
    tracing::info!(metrics = %metrics_handle.render(), "final metrics");

    if let Some(outcome) = outcome {
        let record = outcome?;
        let status = orchestrator
            .payments()
            .payment(&payment_id)
            .map_or(PaymentStatus::Pending, |payment| payment.status);
        tracing::info!(
            %payment_id,
            %status,
            steps = record.history().len(),
            events = record.processed_count(),
            "demo payment finished"
        );
    }
    Ok(())
}
