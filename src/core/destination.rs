use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

/// Where the destination subpath came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationOrigin {
    MarkerFile,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationResolution {
    pub subpath: PathBuf,
    pub origin: DestinationOrigin,
}

impl DestinationResolution {
    fn default_for(subpath: &Path) -> Self {
        Self {
            subpath: subpath.to_path_buf(),
            origin: DestinationOrigin::Default,
        }
    }

    /// Absolute destination directory under the drive root.
    pub fn path_under(&self, drive_root: &Path) -> PathBuf {
        drive_root.join(&self.subpath)
    }
}

/// Resolve the destination subpath from the marker file on the source, or
/// fall back to `default_subpath`. Read once per run, before copying.
pub fn resolve_destination(
    source_root: &Path,
    marker_file: &Path,
    default_subpath: &Path,
) -> DestinationResolution {
    let marker_path = source_root.join(marker_file);

    let content = match std::fs::read_to_string(&marker_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(
                marker = %marker_path.display(),
                "{} NOT found, using default path",
                marker_file.display()
            );
            return DestinationResolution::default_for(default_subpath);
        }
        Err(e) => {
            warn!(
                marker = %marker_path.display(),
                error = %e,
                "Marker file unreadable, using default path"
            );
            return DestinationResolution::default_for(default_subpath);
        }
    };

    match sanitize_subpath(content.trim()) {
        Some(subpath) => {
            info!(subpath = %subpath.display(), "{} found", marker_file.display());
            DestinationResolution {
                subpath,
                origin: DestinationOrigin::MarkerFile,
            }
        }
        None => {
            warn!(
                marker = %marker_path.display(),
                content = %content.trim(),
                "Marker file content is not a usable subpath, using default path"
            );
            DestinationResolution::default_for(default_subpath)
        }
    }
}

/// Keep a marker subpath under the drive root: leading `/` is dropped, `..`
/// and empty paths are refused.
fn sanitize_subpath(raw: &str) -> Option<PathBuf> {
    let mut subpath = PathBuf::new();

    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => subpath.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    (!subpath.as_os_str().is_empty()).then_some(subpath)
}
