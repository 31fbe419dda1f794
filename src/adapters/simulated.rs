use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::CommandError;
use crate::core::hardware::{
    BlockDevice, DeviceKind, HardwareAdapter, StatusLight, TriggerEvent,
};
use crate::core::size::gb_to_bytes;

enum SimulatedCommand {
    Press,
}

#[derive(Default)]
struct SimulatedState {
    devices: Vec<BlockDevice>,
    raw_listing: Option<String>,
    failing_mounts: HashSet<PathBuf>,
    failing_unmounts: HashSet<PathBuf>,
    mounted: Vec<(PathBuf, PathBuf)>,
    mount_calls: Vec<PathBuf>,
    unmount_calls: Vec<PathBuf>,
}

type SharedState = Arc<Mutex<SimulatedState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle used by tests and the stdin console to drive a [`SimulatedAdapter`].
#[derive(Clone)]
pub struct Simulator {
    tx: mpsc::UnboundedSender<SimulatedCommand>,
    state: SharedState,
}

impl Simulator {
    pub fn press(&self) {
        let _ = self.tx.send(SimulatedCommand::Press);
    }

    /// Attach a partition of `size_gb` gigabytes.
    pub fn add_device(&self, name: &str, size_gb: u64) {
        self.add(name, gb_to_bytes(size_gb), DeviceKind::Part);
    }

    /// Attach a whole-disk entry of `size_gb` gigabytes.
    pub fn add_disk(&self, name: &str, size_gb: u64) {
        self.add(name, gb_to_bytes(size_gb), DeviceKind::Disk);
    }

    fn add(&self, name: &str, size_bytes: u64, kind: DeviceKind) {
        lock(&self.state).devices.push(BlockDevice {
            name: name.to_string(),
            size_bytes,
            kind,
        });
    }

    pub fn remove_device(&self, name: &str) {
        lock(&self.state).devices.retain(|d| d.name != name);
    }

    /// Serve this text verbatim as the device listing.
    pub fn set_raw_listing(&self, listing: &str) {
        lock(&self.state).raw_listing = Some(listing.to_string());
    }

    /// Make mounting `/dev/<name>` fail.
    pub fn fail_mount(&self, name: &str) {
        lock(&self.state)
            .failing_mounts
            .insert(Path::new("/dev").join(name));
    }

    /// Make unmounting `/dev/<name>` fail.
    pub fn fail_unmount(&self, name: &str) {
        lock(&self.state)
            .failing_unmounts
            .insert(Path::new("/dev").join(name));
    }

    pub fn mount_calls(&self) -> Vec<PathBuf> {
        lock(&self.state).mount_calls.clone()
    }

    pub fn unmount_calls(&self) -> Vec<PathBuf> {
        lock(&self.state).unmount_calls.clone()
    }

    /// Devices currently mounted, as `(device, mount point)`.
    pub fn mounted(&self) -> Vec<(PathBuf, PathBuf)> {
        lock(&self.state).mounted.clone()
    }
}

/// In-memory hardware: devices, mounts and trigger presses are all scripted.
pub struct SimulatedAdapter {
    // Taken by `start()`, which only runs once.
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<SimulatedCommand>>>,
    state: SharedState,
    cancel: CancellationToken,
}

impl SimulatedAdapter {
    pub fn new() -> (Self, Simulator) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = SharedState::default();

        (
            Self {
                cmd_rx: Mutex::new(Some(rx)),
                state: state.clone(),
                cancel: CancellationToken::new(),
            },
            Simulator { tx, state },
        )
    }
}

impl HardwareAdapter for SimulatedAdapter {
    fn start(&self, daemon_tx: mpsc::Sender<TriggerEvent>) {
        let Some(mut rx) = self
            .cmd_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            warn!("(SimulatedAdapter) start() called twice, ignoring");
            return;
        };

        info!("(SimulatedAdapter) Listening for simulator commands");

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let cmd = tokio::select! {
                    _ = cancel.cancelled() => break,
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => cmd,
                        None => break,
                    },
                };

                let event = match cmd {
                    SimulatedCommand::Press => TriggerEvent::Pressed,
                };

                if daemon_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    fn stop(&self) {
        self.cancel.cancel();
    }

    fn list_devices(&self) -> Result<String, CommandError> {
        let state = lock(&self.state);

        if let Some(raw) = &state.raw_listing {
            return Ok(raw.clone());
        }

        Ok(state
            .devices
            .iter()
            .map(|d| format!("{} {} {}\n", d.name, d.size_bytes, d.kind.as_str()))
            .collect())
    }

    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), CommandError> {
        let mut state = lock(&self.state);
        state.mount_calls.push(device.to_path_buf());

        if state.failing_mounts.contains(device) {
            return Err(CommandError::Failed {
                command: format!("mount {} {}", device.display(), mount_point.display()),
                status: "exit status: 32".to_string(),
                stderr: "simulated mount failure".to_string(),
            });
        }

        debug!(device = %device.display(), mount_point = %mount_point.display(), "(SimulatedAdapter) mount");
        state
            .mounted
            .push((device.to_path_buf(), mount_point.to_path_buf()));
        Ok(())
    }

    fn unmount(&self, device: &Path) -> Result<(), CommandError> {
        let mut state = lock(&self.state);
        state.unmount_calls.push(device.to_path_buf());

        if state.failing_unmounts.contains(device) {
            return Err(CommandError::Failed {
                command: format!("umount {}", device.display()),
                status: "exit status: 32".to_string(),
                stderr: "target is busy".to_string(),
            });
        }

        state.mounted.retain(|(d, _)| d != device);
        Ok(())
    }
}

/// Writes kept by [`SimulatedLight`]; older ones are dropped.
const LIGHT_HISTORY: usize = 64;

#[derive(Default)]
struct LightState {
    recent: VecDeque<bool>,
    switched_on: bool,
}

/// Records writes instead of driving a pin. Only the most recent writes are
/// kept, so a long-running simulated daemon does not grow without bound.
#[derive(Default)]
pub struct SimulatedLight {
    state: Mutex<LightState>,
}

impl SimulatedLight {
    fn lock(&self) -> MutexGuard<'_, LightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recent writes, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.lock().recent.iter().copied().collect()
    }

    pub fn is_on(&self) -> bool {
        self.lock().recent.back().copied().unwrap_or(false)
    }

    /// Whether the light has been switched on at least once.
    pub fn was_switched_on(&self) -> bool {
        self.lock().switched_on
    }
}

impl StatusLight for SimulatedLight {
    fn set(&self, on: bool) {
        let mut state = self.lock();
        if state.recent.len() == LIGHT_HISTORY {
            state.recent.pop_front();
        }
        state.recent.push_back(on);
        state.switched_on |= on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_history_is_bounded() {
        let light = SimulatedLight::default();
        for i in 0..(LIGHT_HISTORY * 3) {
            light.set(i % 2 == 0);
        }
        light.set(false);

        let history = light.history();
        assert_eq!(history.len(), LIGHT_HISTORY);
        assert_eq!(history.last(), Some(&false));
        assert!(light.was_switched_on());
        assert!(!light.is_on());
    }

    #[test]
    fn test_light_never_switched_on() {
        let light = SimulatedLight::default();
        light.set(false);
        assert!(!light.was_switched_on());
        assert_eq!(light.history(), vec![false]);
    }
}
