//! Minimal sysfs GPIO access (`/sys/class/gpio`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::hardware::StatusLight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GpioPin {
    root: PathBuf,
    pin: u32,
}

impl GpioPin {
    pub fn new(root: &Path, pin: u32) -> Self {
        Self {
            root: root.to_path_buf(),
            pin,
        }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    /// Export the pin if the kernel has not done so yet, then set its direction.
    pub fn export(&self, direction: Direction) -> io::Result<()> {
        if !self.pin_dir().exists() {
            debug!(pin = self.pin, "Exporting GPIO pin");
            fs::write(self.root.join("export"), self.pin.to_string())?;
        }
        fs::write(self.pin_dir().join("direction"), direction.as_str())
    }

    /// Current level, `true` for high.
    pub fn read(&self) -> io::Result<bool> {
        let value = fs::read_to_string(self.pin_dir().join("value"))?;
        Ok(value.trim() == "1")
    }

    pub fn write(&self, high: bool) -> io::Result<()> {
        fs::write(self.pin_dir().join("value"), if high { "1" } else { "0" })
    }
}

/// Status light on an output pin. Write failures are logged, never raised.
pub struct GpioLight {
    pin: GpioPin,
}

impl GpioLight {
    pub fn new(root: &Path, pin: u32) -> Self {
        let pin = GpioPin::new(root, pin);
        if let Err(e) = pin.export(Direction::Out) {
            warn!(pin = pin.pin(), error = %e, "Failed to export status light pin");
        }
        Self { pin }
    }
}

impl StatusLight for GpioLight {
    fn set(&self, on: bool) {
        if let Err(e) = self.pin.write(on) {
            debug!(pin = self.pin.pin(), on, error = %e, "Failed to write status light");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_sysfs(root: &Path, pin: u32, value: &str) {
        let dir = root.join(format!("gpio{}", pin));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("direction"), "in").unwrap();
        fs::write(dir.join("value"), value).unwrap();
    }

    #[test]
    fn test_export_sets_direction_on_exported_pin() {
        let temp = tempdir().unwrap();
        fake_sysfs(temp.path(), 21, "0");

        GpioPin::new(temp.path(), 21).export(Direction::Out).unwrap();

        let direction = fs::read_to_string(temp.path().join("gpio21/direction")).unwrap();
        assert_eq!(direction, "out");
        assert!(!temp.path().join("export").exists());
    }

    #[test]
    fn test_export_requests_missing_pin() {
        let temp = tempdir().unwrap();

        // No kernel behind the fake root, so the direction write fails after the export.
        let result = GpioPin::new(temp.path(), 17).export(Direction::In);
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(temp.path().join("export")).unwrap(), "17");
    }

    #[test]
    fn test_read_and_write_levels() {
        let temp = tempdir().unwrap();
        fake_sysfs(temp.path(), 4, "1\n");

        let pin = GpioPin::new(temp.path(), 4);
        assert!(pin.read().unwrap());

        pin.write(false).unwrap();
        assert!(!pin.read().unwrap());
    }

    #[test]
    fn test_light_writes_value() {
        let temp = tempdir().unwrap();
        fake_sysfs(temp.path(), 21, "0");

        let light = GpioLight::new(temp.path(), 21);
        light.set(true);
        assert_eq!(fs::read_to_string(temp.path().join("gpio21/value")).unwrap(), "1");
        light.set(false);
        assert_eq!(fs::read_to_string(temp.path().join("gpio21/value")).unwrap(), "0");
    }

    #[test]
    fn test_light_without_sysfs_does_not_panic() {
        let light = GpioLight::new(Path::new("/nonexistent/gpio"), 21);
        light.set(true);
        light.set(false);
    }
}
