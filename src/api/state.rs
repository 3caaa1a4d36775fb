//! Application state for the API server

use crate::{Config, PodcastArchiver};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the archiver instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The archiver instance
    pub archiver: Arc<PodcastArchiver>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(archiver: Arc<PodcastArchiver>, config: Arc<Config>) -> Self {
        Self { archiver, config }
    }
}
