use std::time::Duration;

use crate::notify::DEFAULT_TTL;
use crate::schedule::PollSchedule;

/// Orchestrator settings. The binary builds this from the environment;
/// the library never reads it itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub schedule: PollSchedule,
    /// Display time attached to every notification.
    pub notification_ttl: Duration,
    /// How long shutdown waits for each periodic task to exit.
    pub shutdown_grace: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schedule: PollSchedule::default(),
            notification_ttl: DEFAULT_TTL,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
