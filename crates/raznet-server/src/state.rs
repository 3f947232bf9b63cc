use crate::uploads::UploadDir;
use raznet::coordinator::Coordinator;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Attachment paths must resolve inside this directory
    pub uploads: Arc<UploadDir>,
    /// Tag reported to clients when a session starts
    pub provider: &'static str,
}

impl AppState {
    pub fn new(coordinator: Coordinator, uploads: UploadDir) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            uploads: Arc::new(uploads),
            provider: "ollama",
        }
    }
}
