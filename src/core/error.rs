use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing sizes or the block-device listing.
///
/// Fatal to the scan or match attempt in progress, never to the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid size string '{0}'")]
    InvalidSize(String),

    #[error("malformed device listing at line {line}: '{content}' ({reason})")]
    MalformedListing {
        line: usize,
        content: String,
        reason: String,
    },
}

/// An external command (listing, mount, unmount) that failed.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Rejected(String),
}

/// A single file that could not be copied.
#[derive(Debug, Error)]
#[error("{step} {path}: {source}")]
pub struct CopyError {
    pub step: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl CopyError {
    pub fn new(step: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            step,
            path: path.into(),
            source,
        }
    }

    /// Whether the underlying I/O error suggests the device went away mid-copy.
    pub fn is_device_removed(&self) -> bool {
        is_device_removed_error(&self.source)
    }
}

/// Check if an I/O error indicates the device has been removed
pub fn is_device_removed_error(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => true,
        ErrorKind::PermissionDenied => false,
        _ => matches!(
            error.raw_os_error(),
            Some(libc::EIO | libc::ENODEV | libc::ENXIO | libc::ENOMEDIUM | libc::EMEDIUMTYPE)
        ),
    }
}
