use tokio::sync::Mutex;
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::DeviceRole;
use crate::context::AppContext;

use super::copier::{CopyReport, copy_files};
use super::matcher::{RunState, find_and_mount};
use super::progress::RunPhase;
use super::size::format_gb;
use super::unmounter::{UnmountOutcome, unmount_all};

/// Summary of one run, from trigger back to idle.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub source_mounted: bool,
    pub destination_mounted: bool,
    pub copy: CopyReport,
    pub unmounted: Vec<UnmountOutcome>,
}

/// Sequences one backup run per trigger event.
///
/// Stages never abort the sequence: each one logs its own failures and the
/// next stage still runs, so every run ends in `Idle` with all recorded
/// mounts handed to the unmounter.
pub struct TriggerController {
    ctx: AppContext,
    run_lock: Mutex<()>,
}

impl TriggerController {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            run_lock: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Run the full sequence once. Returns `None` when a run is already in
    /// progress; that trigger is logged and dropped.
    pub async fn on_trigger(&self) -> Option<RunReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Trigger ignored: a backup run is already in progress.");
            return None;
        };

        let run_id = Uuid::now_v7().to_string();
        let span = info_span!("run", run_id = %run_id);

        Some(self.run(run_id).instrument(span).await)
    }

    /// Wait for an in-flight run, if any, to reach `Idle`.
    pub async fn wait_idle(&self) {
        let _guard = self.run_lock.lock().await;
    }

    async fn run(&self, run_id: String) -> RunReport {
        let config = &self.ctx.config;
        let progress = &self.ctx.progress;

        info!("Trigger event detected.");
        progress.begin().await;

        let mut run = RunState::new();

        progress.set_phase(RunPhase::MountingSource).await;
        let source_mounted = self.mount_role(&config.source, &mut run).await;

        progress.set_phase(RunPhase::MountingDestination).await;
        let destination_mounted = self.mount_role(&config.destination, &mut run).await;

        progress.set_phase(RunPhase::Copying).await;
        let copy = copy_files(&self.ctx, &config.source.mount_point).await;

        progress.set_phase(RunPhase::Unmounting).await;
        let unmounted = self.unmount(run).await;

        progress.finish().await;

        let totals = progress.snapshot().await;
        info!(
            source_mounted,
            destination_mounted,
            files_copied = totals.files_copied,
            files_failed = totals.files_failed,
            bytes_copied = totals.bytes_copied,
            unmounted = unmounted.iter().filter(|u| u.succeeded()).count(),
            "Backup run finished: {} copied, {} failed, {}.",
            totals.files_copied,
            totals.files_failed,
            format_gb(totals.bytes_copied)
        );

        RunReport {
            run_id,
            source_mounted,
            destination_mounted,
            copy,
            unmounted,
        }
    }

    async fn mount_role(&self, role: &DeviceRole, run: &mut RunState) -> bool {
        let adapter = self.ctx.adapter.clone();
        let role = role.clone();
        let label = role.label.clone();
        let span = Span::current();

        let staged = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            let mut staged = RunState::new();
            let mounted = find_and_mount(adapter.as_ref(), &role, &mut staged);
            (mounted, staged)
        })
        .await;

        match staged {
            Ok((mounted, staged)) => {
                run.mounts.extend(staged.mounts);
                mounted
            }
            Err(e) => {
                error!(role = %label, error = %e, "Unexpected error while mounting {}", label);
                false
            }
        }
    }

    async fn unmount(&self, run: RunState) -> Vec<UnmountOutcome> {
        let adapter = self.ctx.adapter.clone();
        let span = Span::current();

        let outcomes = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            unmount_all(adapter.as_ref(), run)
        })
        .await;

        match outcomes {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "An unexpected error occurred during unmounting.");
                Vec::new()
            }
        }
    }
}
