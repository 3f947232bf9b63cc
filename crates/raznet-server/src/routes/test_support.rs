use crate::state::AppState;
use crate::uploads::UploadDir;
use async_trait::async_trait;
use raznet::coordinator::Coordinator;
use raznet::models::message::Message;
use raznet::models::tool::Tool;
use raznet::providers::base::{Delta, DeltaStream, ModelPurpose, Provider};
use raznet::tools::CapabilityTools;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Streams canned replies in order, one per request
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<Vec<Vec<Delta>>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Vec<Delta>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn stream(
        &self,
        _purpose: ModelPurpose,
        _system: Option<&str>,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> anyhow::Result<DeltaStream> {
        *self.calls.lock().unwrap() += 1;
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Vec::new()
            } else {
                replies.remove(0)
            }
        };
        Ok(Box::pin(futures::stream::iter(reply.into_iter().map(Ok))))
    }
}

#[derive(Clone, Default)]
pub struct StaticTools {
    pub search: String,
    pub page: String,
    pub pdf: String,
}

impl CapabilityTools for StaticTools {
    fn search(&self, _query: &str) -> anyhow::Result<String> {
        Ok(self.search.clone())
    }

    fn browse(&self, _url: &str) -> anyhow::Result<String> {
        Ok(self.page.clone())
    }

    fn extract_pdf_text(&self, _path: &Path) -> anyhow::Result<String> {
        Ok(self.pdf.clone())
    }
}

/// State backed by a fresh upload directory, removed when the returned guard drops
pub fn app_state(provider: ScriptedProvider, tools: StaticTools) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let uploads = UploadDir::open(dir.path()).unwrap();
    let coordinator = Coordinator::new(Arc::new(provider), Arc::new(tools)).unwrap();
    (AppState::new(coordinator, uploads), dir)
}
