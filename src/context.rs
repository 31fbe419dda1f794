use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{HardwareAdapter, ProgressTracker, StatusLight};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub adapter: Arc<dyn HardwareAdapter>,
    pub light: Arc<dyn StatusLight>,
    pub progress: ProgressTracker,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        adapter: Arc<dyn HardwareAdapter>,
        light: Arc<dyn StatusLight>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
            light,
            progress: ProgressTracker::new(),
        }
    }
}
