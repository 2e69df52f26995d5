//! Command handlers. Every command runs on the same orchestrator
//! components the watch mode polls with.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use flux_core::catalog::InstallStatus;
use flux_core::generation::{GenerationParams, GenerationRequest};
use flux_gateway::FluxApi;
use flux_sync::mutation::{Confirmation, MutationError};
use flux_sync::notify::{Notification, NotificationLevel};
use flux_sync::Orchestrator;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::cli::{BulkArgs, Command, GenerateArgs};
use crate::config::CliConfig;
use crate::save::DirectorySaveTarget;

/// Wire an orchestrator against the configured service. Nothing is
/// polled until a command runs.
pub fn build_orchestrator(config: &CliConfig) -> anyhow::Result<Orchestrator> {
    let api = FluxApi::new(config.api_url.clone(), config.request_timeout)
        .context("failed to build HTTP client")?;
    let save_target = DirectorySaveTarget::new(&config.download_dir);

    Ok(Orchestrator::new(
        Arc::new(api),
        Arc::new(save_target),
        config.sync_config(),
    ))
}

/// Run `command` to completion, then tear the orchestrator down.
pub async fn run(orchestrator: &Orchestrator, command: Command) -> anyhow::Result<()> {
    let result = match command {
        Command::Watch => watch(orchestrator).await,
        command => {
            prime(orchestrator).await;
            let mut notifications = orchestrator.subscribe();
            let result = execute(orchestrator, command).await;
            for notification in pending_notifications(&mut notifications) {
                print_notification(&notification);
            }
            result
        }
    };

    orchestrator.shutdown().await;
    result
}

/// One health probe and one reconciliation, so that gating and the
/// roster reflect the live service before a one-shot command.
async fn prime(orchestrator: &Orchestrator) {
    let health = orchestrator.health().probe().await;
    tracing::debug!(%health, "Initial health probe");
    // Failures are logged by the synchronizer; commands still run.
    let _ = orchestrator.roster().reconcile().await;
}

async fn execute(orchestrator: &Orchestrator, command: Command) -> anyhow::Result<()> {
    let session = orchestrator.session();
    let mutations = orchestrator.mutations();

    match command {
        Command::Watch => watch(orchestrator).await?,
        Command::Generate(args) => {
            let accepted = orchestrator.submitter().submit(single_request(args)).await?;
            println!("Submitted {} record(s) to {}", accepted.records, accepted.model);
        }
        Command::Bulk(args) => {
            let request = bulk_request(args).await?;
            let accepted = orchestrator.submitter().submit(request).await?;
            println!("Submitted {} record(s) to {}", accepted.records, accepted.model);
        }
        Command::Images => {
            let roster = session.roster();
            if roster.is_empty() {
                println!("No images");
            }
            for id in roster {
                println!("{id}");
            }
        }
        Command::Queue => {
            let snapshot = orchestrator
                .queue()
                .poll()
                .await
                .context("failed to fetch queue status")?;
            println!("pending: {}  running: {}", snapshot.pending, snapshot.running);
        }
        Command::Delete { id } => mutations.delete_one(&id).await?,
        Command::DeleteAll { yes } => {
            let confirmation = if yes {
                Confirmation::Confirmed
            } else {
                Confirmation::Declined
            };
            mutations
                .delete_all(confirmation)
                .await
                .map_err(|e| match e {
                    MutationError::NotConfirmed => anyhow!("{e}; pass --yes to confirm"),
                    other => other.into(),
                })?;
        }
        Command::Download { id } => mutations.download_one(&id).await?,
        Command::DownloadAll => mutations.download_all().await?,
        Command::Models => {
            let models = orchestrator
                .models()
                .refresh()
                .await
                .context("failed to fetch models")?;
            for model in models {
                println!("{:<28} {}", model.model, install_label(model.is_installed));
            }
        }
        Command::Install { name } => orchestrator.models().install(&name).await?,
        Command::Remove { name } => orchestrator.models().remove(&name).await?,
    }

    Ok(())
}

/// Poll until Ctrl-C, printing notifications and health changes.
async fn watch(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let mut notifications = orchestrator.subscribe();
    let mut health = orchestrator.session().subscribe_health();
    orchestrator.start_polling();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    tracing::info!("Watching service, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("Received Ctrl-C, stopping");
                break;
            }
            received = notifications.recv() => match received {
                Ok(notification) => print_notification(&notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            changed = health.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *health.borrow_and_update();
                println!("[health] service is {state}");
            }
        }
    }

    Ok(())
}

fn single_request(args: GenerateArgs) -> GenerationRequest {
    let mut params = GenerationParams::for_model(args.model, args.prompt);
    if let Some(width) = args.width {
        params.width = width;
    }
    if let Some(height) = args.height {
        params.height = height;
    }
    if let Some(batch_size) = args.batch_size {
        params.batch_size = batch_size;
    }
    if let Some(steps) = args.steps {
        params.steps = steps;
    }
    params.noise_seed = args.seed;

    GenerationRequest::Single {
        model: args.model,
        params,
    }
}

async fn bulk_request(args: BulkArgs) -> anyhow::Result<GenerationRequest> {
    let payload = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    Ok(GenerationRequest::Bulk {
        model: args.model,
        payload,
    })
}

fn install_label(status: InstallStatus) -> &'static str {
    match status {
        InstallStatus::Installed => "installed",
        InstallStatus::NotInstalled => "not installed",
        InstallStatus::Installing => "installing",
    }
}

fn print_notification(notification: &Notification) {
    let level = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    println!("[{level}] {}: {}", notification.title, notification.message);
}

/// Notifications already queued on `rx`, without waiting.
fn pending_notifications(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut pending = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        pending.push(notification);
    }
    pending
}
