use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::gpio::{Direction, GpioPin};
use crate::config::AppConfig;
use crate::core::error::CommandError;
use crate::core::hardware::{HardwareAdapter, TriggerEvent};

/// How often the trigger pin is sampled.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Presses closer together than this are treated as contact bounce.
const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct LinuxAdapterConfig {
    /// Prefix mount/umount with `sudo`.
    pub use_sudo: bool,
    pub gpio_root: PathBuf,
    pub trigger_pin: u32,
    pub trigger_active_low: bool,
}

impl Default for LinuxAdapterConfig {
    fn default() -> Self {
        Self {
            use_sudo: true,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            trigger_pin: 17,
            trigger_active_low: true,
        }
    }
}

impl From<&AppConfig> for LinuxAdapterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            use_sudo: config.use_sudo,
            gpio_root: config.gpio_root.clone(),
            trigger_pin: config.trigger_pin,
            trigger_active_low: config.trigger_active_low,
        }
    }
}

/// `lsblk`, `mount`/`umount` and a sysfs GPIO trigger button.
pub struct LinuxAdapter {
    config: LinuxAdapterConfig,
    cancel: CancellationToken,
}

impl LinuxAdapter {
    pub fn new(config: LinuxAdapterConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LinuxAdapterConfig::default())
    }

    fn privileged(&self, program: &str) -> Command {
        if self.config.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        }
    }
}

/// Run a command to completion, returning stdout or the failure with stderr.
fn run(mut cmd: Command) -> Result<String, CommandError> {
    let rendered = format!("{:?}", cmd);
    debug!(command = %rendered, "Running command");

    let output = cmd.output().map_err(|source| CommandError::Spawn {
        program: cmd.get_program().to_string_lossy().to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

impl HardwareAdapter for LinuxAdapter {
    fn start(&self, tx: mpsc::Sender<TriggerEvent>) {
        let pin = GpioPin::new(&self.config.gpio_root, self.config.trigger_pin);
        if let Err(e) = pin.export(Direction::In) {
            error!(pin = pin.pin(), error = %e, "Failed to set up trigger pin");
            return;
        }

        let active_low = self.config.trigger_active_low;
        let cancel = self.cancel.clone();

        info!(pin = pin.pin(), active_low, "Listening for trigger button");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            let mut was_pressed = true; // never fire on a pin already held at startup
            let mut last_fired: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let level = match pin.read() {
                    Ok(level) => level,
                    Err(e) => {
                        warn!(pin = pin.pin(), error = %e, "Failed to read trigger pin");
                        continue;
                    }
                };

                let pressed = level != active_low;
                let rising = pressed && !was_pressed;
                was_pressed = pressed;

                if !rising || last_fired.is_some_and(|t| t.elapsed() < DEBOUNCE) {
                    continue;
                }
                last_fired = Some(Instant::now());

                if tx.send(TriggerEvent::Pressed).await.is_err() {
                    break;
                }
            }

            debug!("Trigger listener stopped");
        });
    }

    fn stop(&self) {
        self.cancel.cancel();
    }

    fn list_devices(&self) -> Result<String, CommandError> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-n", "-b", "-o", "NAME,SIZE,TYPE"]);
        run(cmd)
    }

    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), CommandError> {
        if !mount_point.is_dir() {
            return Err(CommandError::Rejected(format!(
                "mount point {} does not exist",
                mount_point.display()
            )));
        }

        let mut cmd = self.privileged("mount");
        cmd.arg(device).arg(mount_point);
        run(cmd).map(|_| ())
    }

    fn unmount(&self, device: &Path) -> Result<(), CommandError> {
        nix::unistd::sync();

        let mut cmd = self.privileged("umount");
        cmd.arg(device);
        run(cmd).map(|_| ())
    }
}
