//! In-process fakes for the two outbound dependencies, shared by router and client tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::config::Config;
use crate::llm_client::{LanguageModel, LlmError, TextStream};
use crate::sources::reader::{FetchError, PageReader, WebsiteContent};
use crate::state::AppState;

pub const CANNED_REPLY: &str = r#"{"personas": [{"id": "persona-1", "type": "The Hustler"}, {"id": "persona-2", "type": "The Planner"}]}"#;

/// Always answers with `CANNED_REPLY`, streamed in two deltas.
pub struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(CANNED_REPLY.to_string())
    }

    async fn stream(&self, _prompt: &str) -> Result<TextStream, LlmError> {
        let (head, tail) = CANNED_REPLY.split_at(40);
        let items = vec![Ok(head.to_string()), Ok(tail.to_string())];
        Ok(stream::iter(items).boxed())
    }
}

/// Every fetch fails, as if the site blocked the reader.
pub struct OfflineReader;

#[async_trait]
impl PageReader for OfflineReader {
    async fn fetch(&self, url: &str) -> Result<WebsiteContent, FetchError> {
        Err(FetchError {
            url: url.to_string(),
            source: None,
        })
    }
}

pub fn app_state(with_model: bool) -> AppState {
    let llm: Option<Arc<dyn LanguageModel>> = if with_model {
        Some(Arc::new(CannedModel))
    } else {
        None
    };
    AppState::new(Config::default(), llm, Arc::new(OfflineReader))
}

/// Serves the full router on an ephemeral local port; returns its base URL.
pub async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, crate::routes::build_router(state))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}
