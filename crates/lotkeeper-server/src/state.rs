//! Shared application state.

use crate::config::Config;
use lotkeeper_core::{CoordinatorConfig, LifecycleCoordinator};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub coordinator: Arc<LifecycleCoordinator>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> lotkeeper_core::Result<Self> {
        let coordinator = Arc::new(LifecycleCoordinator::new(CoordinatorConfig {
            db_path: config.db_path.clone(),
            slot_ids: config.slot_ids.clone(),
        })?);

        Ok(Self {
            coordinator,
            config,
        })
    }
}
