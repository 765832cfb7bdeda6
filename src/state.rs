use std::sync::Arc;

use crate::{config::Config, store::ExamStore};
use axum::extract::FromRef;

/// Shared handle to the Persistence Gateway plus configuration.
/// Built once at startup; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<dyn ExamStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
