use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc;

use super::error::CommandError;
use super::size::gb_to_bytes;

/// A physical trigger (button press, or a `once` invocation) that starts one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Pressed,
}

/// Block device classification as reported by the listing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Disk,
    Part,
    Other,
}

impl DeviceKind {
    pub fn from_token(token: &str) -> Self {
        match token {
            "disk" => Self::Disk,
            "part" => Self::Part,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Part => "part",
            Self::Other => "other",
        }
    }
}

/// One entry of a device scan. Produced fresh on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDevice {
    pub name: String,
    pub size_bytes: u64,
    pub kind: DeviceKind,
}

impl BlockDevice {
    /// Full device node path, e.g. `/dev/sda1`.
    pub fn device_path(&self) -> PathBuf {
        Path::new("/dev").join(&self.name)
    }
}

/// Inclusive byte range a device must fall into to be selected for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl SizeRange {
    pub fn from_gb(min_gb: u64, max_gb: u64) -> Self {
        Self {
            min_bytes: gb_to_bytes(min_gb),
            max_bytes: gb_to_bytes(max_gb),
        }
    }

    pub fn contains(&self, size_bytes: u64) -> bool {
        self.min_bytes <= size_bytes && size_bytes <= self.max_bytes
    }
}

/// A device mounted during the current run. Exactly one per successful mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub device_path: PathBuf,
    pub label: String,
    pub mount_point: PathBuf,
}

impl fmt::Display for MountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.label, self.device_path.display())
    }
}

pub trait HardwareAdapter: Send + Sync {
    /// Start listening for trigger events.
    /// Spawns internal tasks that send events to the provided channel.
    fn start(&self, event_sender: mpsc::Sender<TriggerEvent>);

    /// Stop the trigger listener gracefully.
    fn stop(&self);

    /// Raw output of the block-device listing: one `NAME SIZE TYPE` line per device.
    fn list_devices(&self) -> Result<String, CommandError>;

    /// Mount `device` at `mount_point`.
    /// NOTE: blocking; call from a blocking context (e.g. spawn_blocking).
    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), CommandError>;

    /// Flush buffers and unmount `device`.
    /// NOTE: blocking; call from a blocking context (e.g. spawn_blocking).
    fn unmount(&self, device: &Path) -> Result<(), CommandError>;
}

/// On/off sink for the status light.
pub trait StatusLight: Send + Sync {
    fn set(&self, on: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_range_is_inclusive() {
        let range = SizeRange::from_gb(50, 500);
        assert!(range.contains(gb_to_bytes(50)));
        assert!(range.contains(gb_to_bytes(500)));
        assert!(!range.contains(gb_to_bytes(50) - 1));
        assert!(!range.contains(gb_to_bytes(500) + 1));
    }

    #[test]
    fn test_device_kind_tokens() {
        assert_eq!(DeviceKind::from_token("part"), DeviceKind::Part);
        assert_eq!(DeviceKind::from_token("disk"), DeviceKind::Disk);
        assert_eq!(DeviceKind::from_token("rom"), DeviceKind::Other);
        assert_eq!(DeviceKind::from_token("PART"), DeviceKind::Other);
    }

    #[test]
    fn test_device_path() {
        let dev = BlockDevice {
            name: "sda1".to_string(),
            size_bytes: 1,
            kind: DeviceKind::Part,
        };
        assert_eq!(dev.device_path(), PathBuf::from("/dev/sda1"));
    }

    #[test]
    fn test_mount_record_display() {
        let record = MountRecord {
            device_path: PathBuf::from("/dev/sdb1"),
            label: "USB_HDD".to_string(),
            mount_point: PathBuf::from("/media/usbhdd"),
        };
        assert_eq!(record.to_string(), "USB_HDD at /dev/sdb1");
    }
}
