use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::core::hardware::SizeRange;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sdbackup/config.toml";

/// One device role (source card or destination drive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRole {
    pub label: String,
    pub min_size_gb: u64,
    pub max_size_gb: u64,
    pub mount_point: PathBuf,
}

impl DeviceRole {
    pub fn size_range(&self) -> SizeRange {
        SizeRange::from_gb(self.min_size_gb, self.max_size_gb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub log_file: PathBuf,
    pub print_to_screen: bool,
    pub verbose: bool,
    pub json_logs: bool,
    pub simulation: bool,

    /// Prefix mount/umount with `sudo`.
    pub use_sudo: bool,

    pub gpio_root: PathBuf,
    pub trigger_pin: u32,
    /// Button pulls the line low when pressed.
    pub trigger_active_low: bool,
    pub status_pin: u32,
    pub flash_interval_ms: u64,

    pub destination_root: PathBuf,
    pub default_destination: PathBuf,
    pub marker_file: PathBuf,
    /// Case-sensitive, without the leading dot.
    pub video_extension: String,

    pub source: DeviceRole,
    pub destination: DeviceRole,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/home/pi/sdbackup/sdbackup.log"),
            print_to_screen: true,
            verbose: false,
            json_logs: false,
            simulation: false,
            use_sudo: true,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            trigger_pin: 17,
            trigger_active_low: true,
            status_pin: 21,
            flash_interval_ms: 500,
            destination_root: PathBuf::from("/media/usbhdd/"),
            default_destination: PathBuf::from("sdbackup/other/"),
            marker_file: PathBuf::from("id.txt"),
            video_extension: "MP4".to_string(),
            source: DeviceRole {
                label: "SD_CARD".to_string(),
                min_size_gb: 50,
                max_size_gb: 500,
                mount_point: PathBuf::from("/media/sdcard"),
            },
            destination: DeviceRole {
                label: "USB_HDD".to_string(),
                min_size_gb: 1500,
                max_size_gb: 3000,
                mount_point: PathBuf::from("/media/usbhdd/"),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file, then `SDBACKUP_*`
    /// environment variables, then command line overrides.
    pub fn new<T: Serialize>(cli_args: Option<&T>, config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SDBACKUP_").split("__"));

        if let Some(args) = cli_args {
            figment = figment.merge(Serialized::defaults(args));
        }

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for role in [&self.source, &self.destination] {
            if role.min_size_gb > role.max_size_gb {
                bail!(
                    "{}: min_size_gb ({}) exceeds max_size_gb ({})",
                    role.label,
                    role.min_size_gb,
                    role.max_size_gb
                );
            }
        }

        if self.flash_interval_ms == 0 {
            bail!("flash_interval_ms must be greater than zero");
        }

        if self.video_extension.is_empty() || self.video_extension.starts_with('.') {
            bail!("video_extension must be non-empty and given without a leading dot");
        }

        Ok(())
    }

    pub fn flash_interval(&self) -> Duration {
        Duration::from_millis(self.flash_interval_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
