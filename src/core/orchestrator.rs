use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::context::AppContext;
use crate::core::controller::{RunReport, TriggerController};
use crate::core::hardware::TriggerEvent;
use crate::core::progress::RunPhase;

/// Daemon loop: waits for trigger events and hands each to the controller.
pub struct Orchestrator {
    controller: Arc<TriggerController>,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            controller: Arc::new(TriggerController::new(ctx)),
        }
    }

    pub fn controller(&self) -> &Arc<TriggerController> {
        &self.controller
    }

    pub async fn start(&self) -> Result<()> {
        let adapter = self.controller.context().adapter.clone();
        let (tx, mut rx) = mpsc::channel(32);

        adapter.start(tx);
        info!("Script started.");

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        self.handle_trigger_event(event);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        adapter.stop();

        let phase = self.controller.context().progress.phase().await;
        if phase != RunPhase::Idle {
            info!(phase = %phase, "Waiting for the run in {} phase to finish", phase);
        }
        self.controller.wait_idle().await;
        info!("Daemon stopped");

        Ok(())
    }

    /// Spawn a run for the event. The run itself decides whether it is
    /// allowed to proceed while another is active.
    pub fn handle_trigger_event(&self, event: TriggerEvent) -> JoinHandle<Option<RunReport>> {
        match event {
            TriggerEvent::Pressed => {
                let controller = self.controller.clone();
                tokio::spawn(async move { controller.on_trigger().await })
            }
        }
    }
}
