use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::core::hardware::{HardwareAdapter, StatusLight};

mod gpio;
#[cfg(target_os = "linux")]
mod linux;
mod simulated;

pub use gpio::{Direction, GpioLight, GpioPin};
#[cfg(target_os = "linux")]
pub use linux::{LinuxAdapter, LinuxAdapterConfig};
pub use simulated::{SimulatedAdapter, SimulatedLight, Simulator};

pub struct Hardware {
    pub adapter: Arc<dyn HardwareAdapter>,
    pub light: Arc<dyn StatusLight>,
}

/// Pick the hardware for this host. In simulation mode the simulator is
/// driven from stdin.
pub fn get_hardware(config: &AppConfig) -> Hardware {
    if config.simulation || cfg!(not(target_os = "linux")) {
        let (adapter, simulator) = SimulatedAdapter::new();
        spawn_console(simulator);

        return Hardware {
            adapter: Arc::new(adapter),
            light: Arc::new(SimulatedLight::default()),
        };
    }

    #[cfg(target_os = "linux")]
    {
        Hardware {
            adapter: Arc::new(LinuxAdapter::new(config.into())),
            light: Arc::new(GpioLight::new(&config.gpio_root, config.status_pin)),
        }
    }

    #[cfg(not(target_os = "linux"))]
    unreachable!("non-Linux hosts always run simulated")
}

fn spawn_console(simulator: Simulator) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines().map_while(Result::ok) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [] | ["press"] => simulator.press(),
                ["add", name, size_gb] => match size_gb.parse() {
                    Ok(size_gb) => simulator.add_device(name, size_gb),
                    Err(_) => println!("(Simulator) size must be whole gigabytes"),
                },
                ["rm", name] => simulator.remove_device(name),
                ["fail", name] => simulator.fail_mount(name),
                _ => println!(
                    "(Simulator) Use: 'press', 'add <name> <size_gb>', 'rm <name>' or 'fail <name>'"
                ),
            }
        }
        info!("(Simulator) stdin closed");
    });
}
