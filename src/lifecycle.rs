//! Process-level start/stop/restart around a [`PipelineEngine`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::engine::{EngineStatus, PipelineEngine};

/// Reply to a control request. `success = false` means nothing was done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub startup_service_running: bool,
    #[serde(flatten)]
    pub engine: EngineStatus,
}

pub struct EngineLifecycle {
    engine: Arc<PipelineEngine>,
    started: AtomicBool,
    restart_pause: Duration,
}

impl EngineLifecycle {
    pub fn new(engine: Arc<PipelineEngine>, restart_pause: Duration) -> Self {
        Self {
            engine,
            started: AtomicBool::new(false),
            restart_pause,
        }
    }

    pub fn engine(&self) -> &Arc<PipelineEngine> {
        &self.engine
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("lifecycle already started");
            return;
        }
        self.engine.start().await;
    }

    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            tracing::debug!("lifecycle not started");
            return;
        }
        self.engine.stop().await;
    }

    pub async fn restart(&self) {
        tracing::info!(pause_ms = self.restart_pause.as_millis() as u64, "restarting pipeline engine");
        self.stop().await;
        tokio::time::sleep(self.restart_pause).await;
        self.start().await;
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            startup_service_running: self.is_started(),
            engine: self.engine.status(),
        }
    }

    /// Start in the background and return immediately.
    pub fn request_start(self: &Arc<Self>) -> ControlResponse {
        if self.is_started() {
            return ControlResponse::rejected("Pipeline engine is already running");
        }
        let this = Arc::clone(self);
        tokio::spawn(async move { this.start().await });
        ControlResponse::ok("Pipeline engine start initiated")
    }

    pub fn request_stop(self: &Arc<Self>) -> ControlResponse {
        if !self.is_started() {
            return ControlResponse::rejected("Pipeline engine is not running");
        }
        let this = Arc::clone(self);
        tokio::spawn(async move { this.stop().await });
        ControlResponse::ok("Pipeline engine stop initiated")
    }

    pub fn request_restart(self: &Arc<Self>) -> ControlResponse {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.restart().await });
        ControlResponse::ok("Pipeline engine restart initiated")
    }

    /// Start, wait for `signal`, then stop cleanly.
    pub async fn run_until<F: Future<Output = ()>>(&self, signal: F) {
        self.start().await;
        signal.await;
        tracing::info!("shutdown signal received");
        self.stop().await;
    }
}
