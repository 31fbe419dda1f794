use std::path::PathBuf;

use tracing::{error, info};

use super::hardware::HardwareAdapter;
use super::matcher::RunState;

/// Result of one unmount attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmountOutcome {
    pub device_path: PathBuf,
    pub label: String,
    pub error: Option<String>,
}

impl UnmountOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Unmount every device recorded during the run.
///
/// Consumes the run state so each record is handed over exactly once. A
/// failure on one device never stops the attempt on the next.
pub fn unmount_all(adapter: &dyn HardwareAdapter, run: RunState) -> Vec<UnmountOutcome> {
    if run.mounts.is_empty() {
        info!("No devices to unmount.");
        return Vec::new();
    }

    run.mounts
        .into_iter()
        .map(|record| {
            let error = match adapter.unmount(&record.device_path) {
                Ok(()) => {
                    info!(role = %record.label, "{} unmounted successfully.", record);
                    None
                }
                Err(e) => {
                    error!(
                        role = %record.label,
                        error = %e,
                        "Error unmounting {}: {}",
                        record,
                        e
                    );
                    Some(e.to_string())
                }
            };

            UnmountOutcome {
                device_path: record.device_path,
                label: record.label,
                error,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedAdapter;
    use crate::core::hardware::MountRecord;

    fn record(name: &str, label: &str) -> MountRecord {
        MountRecord {
            device_path: PathBuf::from("/dev").join(name),
            label: label.to_string(),
            mount_point: PathBuf::from("/media").join(name),
        }
    }

    #[test]
    fn test_empty_run_unmounts_nothing() {
        let (adapter, sim) = SimulatedAdapter::new();

        assert!(unmount_all(&adapter, RunState::new()).is_empty());
        assert!(sim.unmount_calls().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_next_device() {
        let (adapter, sim) = SimulatedAdapter::new();
        sim.fail_unmount("sda1");

        let mut run = RunState::new();
        run.record(record("sda1", "SD_CARD"));
        run.record(record("sdb1", "USB_HDD"));

        let outcomes = unmount_all(&adapter, run);

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].succeeded());
        assert!(outcomes[0].error.as_deref().unwrap().contains("busy"));
        assert!(outcomes[1].succeeded());
        assert_eq!(
            sim.unmount_calls(),
            vec![PathBuf::from("/dev/sda1"), PathBuf::from("/dev/sdb1")]
        );
    }
}
