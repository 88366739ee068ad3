use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobStore;
use crate::llm_client::LanguageModel;
use crate::sources::reader::PageReader;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` while no model key is configured; generation requests are refused.
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub reader: Arc<dyn PageReader>,
    /// In-memory background jobs, shared by the generator tasks and the status route.
    pub jobs: JobStore,
}

impl AppState {
    pub fn new(
        config: Config,
        llm: Option<Arc<dyn LanguageModel>>,
        reader: Arc<dyn PageReader>,
    ) -> Self {
        let jobs = JobStore::new(config.job_retention);
        Self {
            config,
            llm,
            reader,
            jobs,
        }
    }
}
