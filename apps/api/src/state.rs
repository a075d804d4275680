use std::sync::Arc;

use crate::export::RenderClient;
use crate::llm_client::GenerationClient;
use crate::models::resume::StaticProfile;
use crate::pipeline::{Orchestrator, RunRegistry};
use crate::profile::{FileStore, ProfileStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub files: FileStore,
    pub generator: GenerationClient,
    pub renderer: RenderClient,
    pub orchestrator: Orchestrator,
    /// Live optimization sessions.
    pub runs: RunRegistry,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        files: FileStore,
        generator: GenerationClient,
        renderer: RenderClient,
        profile: StaticProfile,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            generator.clone(),
            store.clone(),
            files.clone(),
            Arc::new(profile),
        );
        Self {
            store,
            files,
            generator,
            renderer,
            orchestrator,
            runs: RunRegistry::new(),
        }
    }
}
