use clap::Parser;
use miette::{IntoDiagnostic, Result};
use sponsorship_lifecycle::application::events::{RestingEvent, spawn_resting_listener};
use sponsorship_lifecycle::application::reconciler::BillingReconciler;
use sponsorship_lifecycle::application::scheduler::RestStateScheduler;
use sponsorship_lifecycle::config::{Cli, Command};
use sponsorship_lifecycle::domain::ports::SponsorshipStoreRef;
use sponsorship_lifecycle::infrastructure::in_memory::InMemorySponsorshipStore;
use sponsorship_lifecycle::infrastructure::notifier::{ChannelNotifier, spawn_notification_logger};
use sponsorship_lifecycle::infrastructure::simulated_gateway::SimulatedGateway;
use sponsorship_lifecycle::interfaces::csv::fixture_reader::{SponsorshipReader, UserReader};
use sponsorship_lifecycle::interfaces::csv::sponsorship_writer::SponsorshipWriter;
use std::fs::File;
use std::io;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the CSV report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sponsorship_lifecycle={},warn", cli.log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false),
        )
        .init();

    cli.validate().into_diagnostic()?;

    let store = open_store(&cli)?;
    let gateway = SimulatedGateway::new();
    seed(&cli, &store, &gateway).await?;

    let (notifier, notifications) = ChannelNotifier::new();
    let notification_logger = spawn_notification_logger(notifications);

    let reconciler = Arc::new(BillingReconciler::new(
        Arc::clone(&store),
        Arc::new(gateway),
        Arc::new(notifier),
        cli.reconciler_config(),
    ));
    let scheduler = Arc::new(
        RestStateScheduler::new(
            Arc::clone(&reconciler),
            Arc::clone(&store),
            cli.scheduler_config(),
        )
        .into_diagnostic()?,
    );
    let now = cli.now.unwrap_or_else(chrono::Utc::now);

    match cli.command {
        Command::PauseScan => {
            if let Err(e) = scheduler.run_pause_scan(now).await {
                error!(error = %e, "Pause scan abandoned");
            }
        }
        Command::CancelScan => {
            if let Err(e) = scheduler.run_cancel_scan(now).await {
                error!(error = %e, "Cancel scan abandoned");
            }
        }
        Command::Resume { explorer } => {
            store.clear_resting_since(explorer).await.into_diagnostic()?;
            let (events, receiver) = mpsc::channel(16);
            let listener = spawn_resting_listener(Arc::clone(&reconciler), receiver);
            events
                .send(RestingEvent::Exited {
                    explorer_id: explorer,
                })
                .await
                .into_diagnostic()?;
            drop(events);
            listener.await.into_diagnostic()?;
        }
        Command::Serve => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let jobs = Arc::clone(&scheduler).spawn(shutdown_rx);
            info!("Resting scans scheduled, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.into_diagnostic()?;
            let _ = shutdown_tx.send(true);
            for job in jobs {
                job.await.into_diagnostic()?;
            }
        }
    }

    // Release every notifier handle so the logger can drain and exit.
    drop(scheduler);
    drop(reconciler);
    let delivered = notification_logger.await.into_diagnostic()?;
    info!(delivered, "Notifications dispatched");

    let sponsorships = store.all_sponsorships().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = SponsorshipWriter::new(stdout.lock());
    writer.write_sponsorships(&sponsorships).into_diagnostic()?;

    Ok(())
}

fn open_store(cli: &Cli) -> Result<SponsorshipStoreRef> {
    if let Some(db_path) = &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            use sponsorship_lifecycle::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        tracing::warn!(
            db_path = %db_path.display(),
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemorySponsorshipStore::new()))
}

/// Loads fixture rows into the store and aligns the simulated gateway with
/// the stored sponsorships. Malformed rows are logged and skipped.
async fn seed(cli: &Cli, store: &SponsorshipStoreRef, gateway: &SimulatedGateway) -> Result<()> {
    if let Some(path) = &cli.users {
        let file = File::open(path).into_diagnostic()?;
        for record in UserReader::new(file).records() {
            match record {
                Ok(user) => store.store_user(user).await.into_diagnostic()?,
                Err(e) => error!(error = %e, "Error reading user"),
            }
        }
    }

    let mut overrides = Vec::new();
    if let Some(path) = &cli.sponsorships {
        let file = File::open(path).into_diagnostic()?;
        for record in SponsorshipReader::new(file).records() {
            match record {
                Ok(row) => {
                    let (sponsorship, gateway_state) = row.into_parts();
                    if let (Some(id), Some(state)) =
                        (&sponsorship.external_subscription_id, gateway_state)
                    {
                        overrides.push((id.clone(), state));
                    }
                    store.store_sponsorship(sponsorship).await.into_diagnostic()?;
                }
                Err(e) => error!(error = %e, "Error reading sponsorship"),
            }
        }
    }

    let sponsorships = store.all_sponsorships().await.into_diagnostic()?;
    gateway.mirror(&sponsorships).await;
    for (subscription_id, state) in overrides {
        gateway.set_state(&subscription_id, state).await;
    }
    Ok(())
}
