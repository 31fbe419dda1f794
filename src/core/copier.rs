use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::context::AppContext;

use super::destination::{DestinationResolution, resolve_destination};
use super::error::CopyError;
use super::hardware::StatusLight;
use super::indicator::StatusIndicator;
use super::progress::ProgressTracker;

/// Buffer size for file I/O operations (128KB for optimal throughput)
const BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    Copied,
    Failed,
}

/// Outcome for one candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub file_name: String,
    pub status: CopyStatus,
    pub error_detail: Option<String>,
}

impl CopyOutcome {
    fn copied(file_name: String) -> Self {
        Self {
            file_name,
            status: CopyStatus::Copied,
            error_detail: None,
        }
    }

    fn failed(file_name: String, detail: String) -> Self {
        Self {
            file_name,
            status: CopyStatus::Failed,
            error_detail: Some(detail),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CopyReport {
    pub destination: DestinationResolution,
    pub destination_dir: PathBuf,
    pub outcomes: Vec<CopyOutcome>,
}

impl CopyReport {
    pub fn copied(&self) -> usize {
        self.count(CopyStatus::Copied)
    }

    pub fn failed(&self) -> usize {
        self.count(CopyStatus::Failed)
    }

    fn count(&self, status: CopyStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Copy every video file under `source_root` into the resolved destination.
///
/// The destination is flat: files land under their bare name, and an existing
/// file with the same name is overwritten (last write wins). Each file is
/// copied independently; a failure is logged and the walk continues. The
/// status light flashes for exactly the duration of the walk.
pub async fn copy_files(ctx: &AppContext, source_root: &Path) -> CopyReport {
    let config = &ctx.config;

    let destination = resolve_destination(
        source_root,
        &config.marker_file,
        &config.default_destination,
    );
    let destination_dir = destination.path_under(&config.destination_root);

    info!(destination = %destination_dir.display(), "Copying files to: {}", destination_dir.display());

    let span = info_span!(
        "copy",
        source = %source_root.display(),
        destination = %destination_dir.display()
    );

    let work = {
        let source_root = source_root.to_path_buf();
        let destination_dir = destination_dir.clone();
        let suffix = format!(".{}", config.video_extension);
        let progress = ctx.progress.clone();

        move || {
            let _enter = span.enter();

            // Keep going: each file then fails on its own and is logged.
            if let Err(e) = fs::create_dir_all(&destination_dir) {
                error!(
                    destination = %destination_dir.display(),
                    error = %e,
                    "Failed to create destination directory"
                );
            }

            walk_and_copy(&source_root, &destination_dir, &suffix, &progress)
        }
    };

    let outcomes = match with_indicator(ctx.light.clone(), config.flash_interval(), work).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!(error = %e, "Copy walk aborted unexpectedly");
            Vec::new()
        }
    };

    CopyReport {
        destination,
        destination_dir,
        outcomes,
    }
}

/// Run blocking `work` while the status light flashes. The light is off
/// again when this returns, also when `work` panics.
async fn with_indicator<T, F>(
    light: Arc<dyn StatusLight>,
    phase: Duration,
    work: F,
) -> Result<T, JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let indicator = StatusIndicator::start(light, phase);
    let result = tokio::task::spawn_blocking(work).await;
    indicator.stop().await;
    result
}

/// Whether a file name carries the video extension. Case-sensitive.
pub fn is_video_file(file_name: &str, suffix: &str) -> bool {
    file_name.ends_with(suffix)
}

fn walk_and_copy(
    source_root: &Path,
    destination_dir: &Path,
    suffix: &str,
    progress: &ProgressTracker,
) -> Vec<CopyOutcome> {
    let mut outcomes = Vec::new();

    // Symlinked clips are copied as their targets; link loops are skipped.
    for entry in WalkDir::new(source_root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if !is_video_file(&file_name, suffix) {
            continue;
        }

        let dest_path = destination_dir.join(&file_name);

        info!(file = %file_name, "Attempting to copy \"{}\"", file_name);

        let outcome = match copy_single_file(entry.path(), &dest_path, true) {
            Ok(bytes) => {
                info!(file = %file_name, bytes, "File \"{}\" copied successfully.", file_name);
                progress.finish_file_blocking(bytes, true);
                CopyOutcome::copied(file_name)
            }
            Err(e) => {
                error!(
                    file = %file_name,
                    device_removed = e.is_device_removed(),
                    "Error copying file \"{}\": {}",
                    file_name,
                    e
                );
                progress.finish_file_blocking(0, false);
                CopyOutcome::failed(file_name, e.to_string())
            }
        };

        outcomes.push(outcome);
    }

    outcomes
}

/// Copy a single file with metadata preservation. Truncates an existing `dest`.
fn copy_single_file(source: &Path, dest: &Path, sync_file: bool) -> Result<u64, CopyError> {
    let source_metadata = fs::metadata(source).map_err(|e| CopyError::new("stat", source, e))?;

    let source_file = File::open(source).map_err(|e| CopyError::new("open", source, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);

    let dest_file = File::create(dest).map_err(|e| CopyError::new("create", dest, e))?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| CopyError::new("read", source, e))?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| CopyError::new("write", dest, e))?;

        bytes_written += bytes_read as u64;
    }

    writer.flush().map_err(|e| CopyError::new("flush", dest, e))?;

    if sync_file {
        let inner = writer
            .into_inner()
            .map_err(|e| CopyError::new("flush", dest, e.into_error()))?;
        inner.sync_all().map_err(|e| CopyError::new("sync", dest, e))?;
    }

    // Log but do not fail: FAT/exFAT targets reject permission changes
    if let Err(e) = fs::set_permissions(dest, source_metadata.permissions()) {
        debug!(dest = %dest.display(), error = %e, "Failed to set file permissions");
    }

    let atime = filetime::FileTime::from_last_access_time(&source_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&source_metadata);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        debug!(dest = %dest.display(), error = %e, "Failed to preserve file timestamps");
    }

    Ok(bytes_written)
}
