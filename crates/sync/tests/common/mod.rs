//! Scripted gateway and save target shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flux_core::catalog::{InstallStatus, ModelInfo};
use flux_core::generation::{BulkBatch, GenerationParams, ModelVariant};
use flux_core::status::QueueSnapshot;
use flux_core::types::ImageId;
use flux_gateway::{Gateway, GatewayError};
use flux_sync::mutation::SaveTarget;
use flux_sync::notify::Notification;
use flux_sync::{Orchestrator, SyncConfig};
use tokio::sync::{broadcast, Notify};

pub const IMAGE_BYTES: &[u8] = b"png-bytes";
pub const ARCHIVE_BYTES: &[u8] = b"zip-bytes";

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Health,
    ListImages,
    Queue,
    Generate(ModelVariant),
    GenerateBulk(ModelVariant, usize),
    DeleteImage(String),
    DeleteAll,
    Download(String),
    DownloadAll,
    ListModels,
    InstallModel(String),
    RemoveModel(String),
}

impl Call {
    /// Operation key used by [`FakeGateway::fail`] and [`FakeGateway::gate`].
    fn op(&self) -> &'static str {
        match self {
            Call::Health => "health",
            Call::ListImages => "images",
            Call::Queue => "queue",
            Call::Generate(_) => "generate",
            Call::GenerateBulk(..) => "generate_bulk",
            Call::DeleteImage(_) => "delete",
            Call::DeleteAll => "delete_all",
            Call::Download(_) => "download",
            Call::DownloadAll => "download_all",
            Call::ListModels => "models",
            Call::InstallModel(_) => "install",
            Call::RemoveModel(_) => "remove",
        }
    }
}

#[derive(Default)]
struct Script {
    images: Vec<ImageId>,
    queue: QueueSnapshot,
    models: Vec<ModelInfo>,
    failing: HashSet<&'static str>,
    timing_out: HashSet<&'static str>,
    rejection_body: Option<String>,
}

/// In-memory [`Gateway`] with scripted responses, per-operation failures
/// and gates that hold a call until the test releases it.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_images(&self, images: &[&str]) {
        self.script.lock().unwrap().images = images.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_queue(&self, pending: u32, running: u32) {
        self.script.lock().unwrap().queue = QueueSnapshot { pending, running };
    }

    pub fn set_models(&self, models: Vec<ModelInfo>) {
        self.script.lock().unwrap().models = models;
    }

    /// Make `op` answer with a 500 until [`succeed`](Self::succeed).
    pub fn fail(&self, op: &'static str) {
        self.script.lock().unwrap().failing.insert(op);
    }

    /// Make `op` fail with a client-side timeout.
    pub fn time_out(&self, op: &'static str) {
        self.script.lock().unwrap().timing_out.insert(op);
    }

    /// Body returned with every scripted 500.
    pub fn reject_with(&self, body: &str) {
        self.script.lock().unwrap().rejection_body = Some(body.to_string());
    }

    pub fn succeed(&self, op: &'static str) {
        let mut script = self.script.lock().unwrap();
        script.failing.remove(op);
        script.timing_out.remove(op);
    }

    /// Hold every `op` call until the returned handle is notified once per
    /// call.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .unwrap()
                .entry(op)
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    /// Wait (yielding to other tasks) until `op` has been called `n` times.
    pub async fn wait_for(&self, op: &'static str, n: usize) {
        while self.count(|c| c.op() == op) < n {
            tokio::task::yield_now().await;
        }
    }

    async fn enter(&self, call: Call) -> Result<(), GatewayError> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);

        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let script = self.script.lock().unwrap();
        if script.timing_out.contains(op) {
            return Err(GatewayError::Timeout);
        }
        if script.failing.contains(op) {
            return Err(GatewayError::Api {
                status: 500,
                body: script
                    .rejection_body
                    .clone()
                    .unwrap_or_else(|| "Internal Server Error".to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn health(&self) -> Result<(), GatewayError> {
        self.enter(Call::Health).await
    }

    async fn list_images(&self) -> Result<Vec<ImageId>, GatewayError> {
        self.enter(Call::ListImages).await?;
        Ok(self.script.lock().unwrap().images.clone())
    }

    async fn queue_status(&self) -> Result<QueueSnapshot, GatewayError> {
        self.enter(Call::Queue).await?;
        Ok(self.script.lock().unwrap().queue)
    }

    async fn generate(
        &self,
        model: ModelVariant,
        _params: &GenerationParams,
    ) -> Result<(), GatewayError> {
        self.enter(Call::Generate(model)).await
    }

    async fn generate_bulk(
        &self,
        model: ModelVariant,
        batch: &BulkBatch,
    ) -> Result<(), GatewayError> {
        self.enter(Call::GenerateBulk(model, batch.len())).await
    }

    async fn delete_image(&self, id: &str) -> Result<(), GatewayError> {
        self.enter(Call::DeleteImage(id.to_string())).await?;
        self.script.lock().unwrap().images.retain(|image| image != id);
        Ok(())
    }

    async fn delete_all_images(&self) -> Result<(), GatewayError> {
        self.enter(Call::DeleteAll).await?;
        self.script.lock().unwrap().images.clear();
        Ok(())
    }

    async fn download_image(&self, id: &str) -> Result<Vec<u8>, GatewayError> {
        self.enter(Call::Download(id.to_string())).await?;
        Ok(IMAGE_BYTES.to_vec())
    }

    async fn download_all_images(&self) -> Result<Vec<u8>, GatewayError> {
        self.enter(Call::DownloadAll).await?;
        Ok(ARCHIVE_BYTES.to_vec())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        self.enter(Call::ListModels).await?;
        Ok(self.script.lock().unwrap().models.clone())
    }

    async fn install_model(&self, name: &str) -> Result<(), GatewayError> {
        self.enter(Call::InstallModel(name.to_string())).await
    }

    async fn remove_model(&self, name: &str) -> Result<(), GatewayError> {
        self.enter(Call::RemoveModel(name.to_string())).await
    }
}

/// Collects saved downloads in memory.
#[derive(Default)]
pub struct MemorySaveTarget {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
    failing: AtomicBool,
}

impl MemorySaveTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SaveTarget for MemorySaveTarget {
    async fn save(&self, file_name: &str, content: Vec<u8>) -> std::io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only directory",
            ));
        }
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), content));
        Ok(())
    }
}

pub fn model(name: &str, status: InstallStatus) -> ModelInfo {
    ModelInfo {
        model: name.to_string(),
        url: format!("https://models.example.test/{name}"),
        is_installed: status,
    }
}

pub fn ids(names: &[&str]) -> Vec<ImageId> {
    names.iter().map(|s| s.to_string()).collect()
}

/// An orchestrator with no periodic tasks running, for driving the
/// components by hand.
pub fn idle_orchestrator() -> (Orchestrator, Arc<FakeGateway>, Arc<MemorySaveTarget>) {
    let gateway = FakeGateway::new();
    let save_target = MemorySaveTarget::new();
    let orchestrator = Orchestrator::new(
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        Arc::clone(&save_target) as Arc<dyn SaveTarget>,
        SyncConfig::default(),
    );
    (orchestrator, gateway, save_target)
}

/// Same as [`idle_orchestrator`], with health already confirmed.
pub async fn healthy_orchestrator() -> (Orchestrator, Arc<FakeGateway>, Arc<MemorySaveTarget>) {
    let (orchestrator, gateway, save_target) = idle_orchestrator();
    orchestrator.health().probe().await;
    (orchestrator, gateway, save_target)
}

/// Everything published so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        received.push(notification);
    }
    received
}
