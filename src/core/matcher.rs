use tracing::{error, info, warn};

use crate::config::DeviceRole;

use super::error::ParseError;
use super::hardware::{BlockDevice, DeviceKind, HardwareAdapter, MountRecord, SizeRange};
use super::scanner::parse_listing;
use super::size::format_gb;

/// Mounts accumulated during one run. Moved into the unmounter at the end.
#[derive(Debug, Default)]
pub struct RunState {
    pub mounts: Vec<MountRecord>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: MountRecord) {
        self.mounts.push(record);
    }
}

/// Pick the first partition, in listing order, whose size lies in `range`.
///
/// Consumes the listing lazily: a malformed line after the match is never
/// reached, a malformed line before it aborts the scan.
pub fn select_device(listing: &str, range: &SizeRange) -> Result<Option<BlockDevice>, ParseError> {
    for device in parse_listing(listing) {
        let device = device?;
        if device.kind == DeviceKind::Part && range.contains(device.size_bytes) {
            return Ok(Some(device));
        }
    }
    Ok(None)
}

/// Scan, select and mount the device for `role`. Returns whether a device was mounted.
///
/// Never tries a second candidate when the mount of the first one fails.
pub fn find_and_mount(adapter: &dyn HardwareAdapter, role: &DeviceRole, run: &mut RunState) -> bool {
    info!(role = %role.label, "Mounting {}", role.label);

    let listing = match adapter.list_devices() {
        Ok(listing) => listing,
        Err(e) => {
            error!(role = %role.label, error = %e, "Failed to list block devices");
            return false;
        }
    };

    let device = match select_device(&listing, &role.size_range()) {
        Ok(Some(device)) => device,
        Ok(None) => {
            warn!(role = %role.label, "No suitable {} found.", role.label);
            return false;
        }
        Err(e) => {
            error!(role = %role.label, error = %e, "Device scan aborted");
            return false;
        }
    };

    info!(
        role = %role.label,
        device = %device.name,
        "Found {} at {} with size {}.",
        role.label,
        device.name,
        format_gb(device.size_bytes)
    );

    let device_path = device.device_path();
    let mount_point = role.mount_point.clone();

    match adapter.mount(&device_path, &mount_point) {
        Ok(()) => {
            info!(
                role = %role.label,
                mount_point = %mount_point.display(),
                "{} mounted at {}.",
                role.label,
                mount_point.display()
            );
            run.record(MountRecord {
                device_path,
                label: role.label.clone(),
                mount_point,
            });
            true
        }
        Err(e) => {
            error!(
                role = %role.label,
                device = %device_path.display(),
                error = %e,
                "Failed to mount {}",
                device_path.display()
            );
            false
        }
    }
}
