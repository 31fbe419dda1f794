//! Heartbeat on the status light while a copy is in progress.
//!
//! The copy orchestrator owns the [`StatusIndicator`]; stopping it cancels
//! the flashing task, which writes a final "off" before it exits. Dropping
//! the indicator without calling [`StatusIndicator::stop`] still cancels the
//! task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, warn};

use super::hardware::StatusLight;

pub struct StatusIndicator {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl StatusIndicator {
    /// Spawn the flashing task in the caller's span. `phase` is the duration
    /// of each on and off half.
    pub fn start(light: Arc<dyn StatusLight>, phase: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(flash(light, phase, token.clone()).in_current_span());

        Self {
            guard: token.drop_guard(),
            handle,
        }
    }

    /// Stop flashing and wait until the light has been switched off.
    pub async fn stop(self) {
        self.guard.disarm().cancel();

        if let Err(e) = self.handle.await {
            warn!(error = %e, "Status indicator task did not exit cleanly");
        }
    }
}

async fn flash(light: Arc<dyn StatusLight>, phase: Duration, token: CancellationToken) {
    debug!(phase_ms = phase.as_millis() as u64, "Status indicator started");

    let mut on = false;
    loop {
        on = !on;
        light.set(on);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(phase) => {}
        }
    }

    light.set(false);
    debug!("Status indicator stopped");
}
