//! Linux adapter integration tests.
//!
//! The trigger tests run against a fake sysfs GPIO tree in a temp directory.
//! The mount test needs root and Linux-specific tools (losetup, mkfs.ext4).
//!
//! Run all tests: `cargo test --test linux_adapter`
//! Run ignored tests: `sudo cargo test --test linux_adapter -- --ignored`

#![cfg(target_os = "linux")]

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use nix::unistd::Uid;
use sdbackup::adapters::{LinuxAdapter, LinuxAdapterConfig};
use sdbackup::core::scanner::parse_listing;
use sdbackup::core::{HardwareAdapter, TriggerEvent};
use tempfile::{NamedTempFile, TempDir, tempdir};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::timeout;

const PIN: u32 = 17;

fn is_root() -> bool {
    Uid::effective().is_root()
}

fn has_tool(program: &str, version_flag: &str) -> bool {
    Command::new(program).arg(version_flag).output().is_ok()
}

/// A sysfs-like tree with pin 17 already exported and reading `level`.
fn fake_gpio(level: &str) -> TempDir {
    let root = tempdir().unwrap();
    let pin_dir = root.path().join(format!("gpio{PIN}"));
    fs::create_dir_all(&pin_dir).unwrap();
    fs::write(pin_dir.join("direction"), "in").unwrap();
    fs::write(pin_dir.join("value"), level).unwrap();
    root
}

fn set_level(root: &Path, level: &str) {
    fs::write(root.join(format!("gpio{PIN}/value")), level).unwrap();
}

fn adapter_on(root: &Path) -> LinuxAdapter {
    LinuxAdapter::new(LinuxAdapterConfig {
        gpio_root: root.to_path_buf(),
        trigger_pin: PIN,
        trigger_active_low: true,
        use_sudo: false,
    })
}

#[tokio::test]
async fn test_list_devices() {
    if !has_tool("lsblk", "--version") {
        eprintln!("Skipping: lsblk not available");
        return;
    }

    let adapter = LinuxAdapter::with_defaults();
    let listing = match adapter.list_devices() {
        Ok(listing) => listing,
        Err(e) => {
            // Containers without /sys/block make lsblk fail.
            eprintln!("Skipping: lsblk failed: {e}");
            return;
        }
    };

    for device in parse_listing(&listing) {
        assert!(device.is_ok(), "unparseable lsblk output: {device:?}");
    }
}

#[tokio::test]
async fn test_start_stop() {
    let gpio = fake_gpio("1");
    let adapter = adapter_on(gpio.path());
    let (tx, mut rx) = mpsc::channel(32);

    adapter.start(tx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    adapter.stop();

    let closed = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("listener did not stop");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_button_press_emits_trigger() {
    let gpio = fake_gpio("1");
    let adapter = adapter_on(gpio.path());
    let (tx, mut rx) = mpsc::channel(32);

    adapter.start(tx);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Active low: pulling the line to 0 is a press.
    set_level(gpio.path(), "0");

    let event = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timeout waiting for trigger")
        .expect("channel closed");
    assert_eq!(event, TriggerEvent::Pressed);

    adapter.stop();
}

#[tokio::test]
async fn test_held_button_fires_once() {
    let gpio = fake_gpio("1");
    let adapter = adapter_on(gpio.path());
    let (tx, mut rx) = mpsc::channel(32);

    adapter.start(tx);
    tokio::time::sleep(Duration::from_millis(60)).await;
    set_level(gpio.path(), "0");

    assert!(timeout(Duration::from_secs(1), rx.recv()).await.is_ok());

    // Still held: no further edges.
    let again = timeout(Duration::from_millis(400), rx.recv()).await;
    assert!(again.is_err(), "held button fired twice");

    adapter.stop();
}

#[tokio::test]
async fn test_pin_held_at_startup_does_not_fire() {
    let gpio = fake_gpio("0");
    let adapter = adapter_on(gpio.path());
    let (tx, mut rx) = mpsc::channel(32);

    adapter.start(tx);

    let event = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(event.is_err(), "fired on a pin already held at startup");

    adapter.stop();
}

#[test]
fn test_missing_gpio_tree_does_not_start() {
    let root = tempdir().unwrap();
    let adapter = adapter_on(&root.path().join("missing"));
    let (tx, mut rx) = mpsc::channel(1);

    // Export fails, so no listener is spawned (and no runtime is needed).
    adapter.start(tx);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
}

/// Create a loopback device from a temp file, formatted with ext4.
/// Returns the loop device path (e.g., /dev/loop0) on success.
fn setup_loopback(file_path: &str, size_mb: u64) -> Option<String> {
    let result = Command::new("dd")
        .args([
            "if=/dev/zero",
            &format!("of={}", file_path),
            "bs=1M",
            &format!("count={}", size_mb),
        ])
        .output()
        .ok()?;
    if !result.status.success() {
        eprintln!("dd failed: {}", String::from_utf8_lossy(&result.stderr));
        return None;
    }

    let result = Command::new("mkfs.ext4")
        .args(["-F", "-q", file_path])
        .output()
        .ok()?;
    if !result.status.success() {
        eprintln!(
            "mkfs.ext4 failed: {}",
            String::from_utf8_lossy(&result.stderr)
        );
        return None;
    }

    let output = Command::new("losetup")
        .args(["--find", "--show", file_path])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        eprintln!(
            "losetup failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        None
    }
}

fn teardown_loopback(loop_device: &str) {
    let _ = Command::new("losetup").args(["-d", loop_device]).output();
}

#[test]
#[ignore = "requires root privileges and losetup/mkfs.ext4"]
fn test_mount_and_unmount_loopback() {
    if !is_root() {
        eprintln!("Skipping: requires root");
        return;
    }
    if !has_tool("losetup", "--version") || !has_tool("mkfs.ext4", "-V") {
        eprintln!("Skipping: losetup or mkfs.ext4 not available");
        return;
    }

    let image = NamedTempFile::new().expect("create temp file");
    let mount_point = tempdir().unwrap();

    let Some(loop_device) = setup_loopback(&image.path().to_string_lossy(), 32) else {
        eprintln!("Failed to setup loopback device");
        return;
    };

    let adapter = LinuxAdapter::new(LinuxAdapterConfig {
        use_sudo: false,
        ..Default::default()
    });

    let mounted = adapter.mount(Path::new(&loop_device), mount_point.path());
    let written = mounted
        .as_ref()
        .ok()
        .map(|_| fs::write(mount_point.path().join("written.MP4"), b"written"));
    let unmounted = adapter.unmount(Path::new(&loop_device));

    teardown_loopback(&loop_device);

    assert!(mounted.is_ok(), "mount failed: {:?}", mounted.err());
    assert!(matches!(written, Some(Ok(()))));
    assert!(unmounted.is_ok(), "unmount failed: {:?}", unmounted.err());
    assert!(!mount_point.path().join("written.MP4").exists());
}
