//! Lifecycle owner for the session and every component around it.
//!
//! [`Orchestrator`] wires one gateway into the observers and actions,
//! starts the periodic observers as named tasks, and tears everything
//! down together. After teardown the session and notifier ignore late
//! results from actions that were still in flight.

use std::sync::{Arc, Mutex, PoisonError};

use flux_gateway::Gateway;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::health::HealthMonitor;
use crate::models::ModelCatalogWatcher;
use crate::mutation::{MutationCoordinator, SaveTarget};
use crate::notify::{Notification, Notifier};
use crate::queue::QueuePoller;
use crate::roster::RosterSynchronizer;
use crate::schedule::PeriodicTask;
use crate::session::SessionState;
use crate::submit::GenerationSubmitter;

pub struct Orchestrator {
    session: Arc<SessionState>,
    notifier: Arc<Notifier>,
    health: Arc<HealthMonitor>,
    roster: Arc<RosterSynchronizer>,
    queue: Arc<QueuePoller>,
    models: Arc<ModelCatalogWatcher>,
    submitter: Arc<GenerationSubmitter>,
    mutations: Arc<MutationCoordinator>,
    tasks: Mutex<Vec<PeriodicTask>>,
    config: SyncConfig,
    /// Master token: cancelled on shutdown, parent of every task token.
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Wire all components around a fresh session without starting any
    /// periodic task.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        save_target: Arc<dyn SaveTarget>,
        config: SyncConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let session = Arc::new(SessionState::with_lifecycle(cancel.clone()));
        let notifier = Arc::new(Notifier::new(config.notification_ttl, cancel.clone()));

        Self {
            health: Arc::new(HealthMonitor::new(
                Arc::clone(&gateway),
                Arc::clone(&session),
            )),
            roster: Arc::new(RosterSynchronizer::new(
                Arc::clone(&gateway),
                Arc::clone(&session),
                Arc::clone(&notifier),
            )),
            queue: Arc::new(QueuePoller::new(Arc::clone(&gateway), Arc::clone(&session))),
            models: Arc::new(ModelCatalogWatcher::new(
                Arc::clone(&gateway),
                Arc::clone(&session),
                Arc::clone(&notifier),
            )),
            submitter: Arc::new(GenerationSubmitter::new(
                Arc::clone(&gateway),
                Arc::clone(&session),
                Arc::clone(&notifier),
            )),
            mutations: Arc::new(MutationCoordinator::new(
                gateway,
                Arc::clone(&session),
                Arc::clone(&notifier),
                save_target,
            )),
            session,
            notifier,
            tasks: Mutex::new(Vec::new()),
            config,
            cancel,
        }
    }

    /// Wire all components and start polling. Must be called from within
    /// a tokio runtime.
    pub fn start(
        gateway: Arc<dyn Gateway>,
        save_target: Arc<dyn SaveTarget>,
        config: SyncConfig,
    ) -> Self {
        let orchestrator = Self::new(gateway, save_target, config);
        orchestrator.start_polling();
        orchestrator
    }

    /// Start the periodic observers. Calling it again while they run, or
    /// after shutdown, does nothing.
    pub fn start_polling(&self) {
        if self.cancel.is_cancelled() {
            tracing::warn!("Orchestrator already shut down, not starting pollers");
            return;
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            return;
        }

        let schedule = &self.config.schedule;

        let health = Arc::clone(&self.health);
        tasks.push(PeriodicTask::start("health", schedule.health, &self.cancel, move || {
            let health = Arc::clone(&health);
            async move {
                health.probe().await;
            }
        }));

        let roster = Arc::clone(&self.roster);
        tasks.push(PeriodicTask::start("images", schedule.images, &self.cancel, move || {
            let roster = Arc::clone(&roster);
            async move {
                // Failures are transient and already logged.
                let _ = roster.reconcile().await;
            }
        }));

        let queue = Arc::clone(&self.queue);
        tasks.push(PeriodicTask::start("queue", schedule.queue, &self.cancel, move || {
            let queue = Arc::clone(&queue);
            async move {
                let _ = queue.poll().await;
            }
        }));

        if let Some(period) = schedule.models {
            let models = Arc::clone(&self.models);
            tasks.push(PeriodicTask::start("models", period, &self.cancel, move || {
                let models = Arc::clone(&models);
                async move {
                    let _ = models.refresh().await;
                }
            }));
        }

        tracing::info!(tasks = tasks.len(), "Orchestrator polling started");
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Subscribe to user-facing notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn roster(&self) -> &Arc<RosterSynchronizer> {
        &self.roster
    }

    pub fn queue(&self) -> &Arc<QueuePoller> {
        &self.queue
    }

    pub fn models(&self) -> &Arc<ModelCatalogWatcher> {
        &self.models
    }

    pub fn submitter(&self) -> &Arc<GenerationSubmitter> {
        &self.submitter
    }

    pub fn mutations(&self) -> &Arc<MutationCoordinator> {
        &self.mutations
    }

    /// Names of the periodic tasks that are still running.
    pub fn running_tasks(&self) -> Vec<&'static str> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| !task.is_finished())
            .map(PeriodicTask::name)
            .collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tear down: cancel every periodic task and wait (bounded) for them
    /// to exit. In-flight actions keep running but their results are
    /// discarded.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down orchestrator");
        self.cancel.cancel();

        let tasks: Vec<PeriodicTask> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for task in tasks {
            tracing::debug!(task = task.name(), "Stopping periodic task");
            task.stop(self.config.shutdown_grace).await;
        }

        tracing::info!("Orchestrator shut down complete");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
