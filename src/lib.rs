//! Unattended SD card to USB drive video backup.
//!
//! On a trigger (GPIO button or `sdbackup -o`) the [`core::TriggerController`]
//! finds the source card and destination drive by partition size, mounts
//! both, copies video files while flashing the status light, and unmounts
//! everything it mounted.

pub mod adapters;
pub mod config;
pub mod context;
pub mod core;
pub mod logging;
