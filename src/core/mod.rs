pub mod controller;
pub mod copier;
pub mod destination;
pub mod error;
pub mod hardware;
pub mod indicator;
pub mod matcher;
pub mod orchestrator;
pub mod progress;
pub mod scanner;
pub mod size;
pub mod unmounter;

pub use controller::{RunReport, TriggerController};
pub use copier::{CopyOutcome, CopyReport, CopyStatus, copy_files};
pub use destination::{DestinationOrigin, DestinationResolution, resolve_destination};
pub use error::{CommandError, CopyError, ParseError};
pub use hardware::{
    BlockDevice, DeviceKind, HardwareAdapter, MountRecord, SizeRange, StatusLight, TriggerEvent,
};
pub use indicator::StatusIndicator;
pub use matcher::{RunState, find_and_mount, select_device};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressTracker, RunPhase, RunProgress};
pub use size::parse_size;
pub use unmounter::{UnmountOutcome, unmount_all};
