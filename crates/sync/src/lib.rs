//! Client-side synchronization and polling orchestrator for the Flux
//! generation service.
//!
//! Three periodic observers (health, image roster, queue) and a model
//! catalog watcher keep a [`SessionState`](session::SessionState) in
//! step with the service, while the
//! [`GenerationSubmitter`](submit::GenerationSubmitter) and
//! [`MutationCoordinator`](mutation::MutationCoordinator) run
//! user-triggered actions gated on that state. The
//! [`Orchestrator`](orchestrator::Orchestrator) owns the lifecycle of
//! all of them.

pub mod config;
pub mod health;
pub mod models;
pub mod mutation;
pub mod notify;
pub mod orchestrator;
pub mod queue;
pub mod roster;
pub mod schedule;
pub mod session;
pub mod submit;

pub use config::SyncConfig;
pub use orchestrator::Orchestrator;
