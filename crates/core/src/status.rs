//! Service health and job queue signals.

use serde::{Deserialize, Serialize};

/// Tri-state availability of the generation service.
///
/// Starts as [`HealthState::Unknown`] until the first probe completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// Only a confirmed healthy service lets gated actions through.
    pub fn is_healthy(self) -> bool {
        matches!(self, HealthState::Healthy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending/running job counts reported by `GET /queue`.
///
/// Replaced wholesale on every successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(rename = "queue_pending")]
    pub pending: u32,
    #[serde(rename = "queue_running")]
    pub running: u32,
}
