//! In-memory [`AgentPage`] for retriever tests.

use crate::page::{AgentPage, ApiResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakePage {
    url: Mutex<String>,
    pinned: bool,
    routes: Mutex<HashMap<String, ApiResponse>>,
    requests: Mutex<Vec<String>>,
    documents: Mutex<HashMap<String, String>>,
    visits: Mutex<Vec<String>>,
    triggers: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    search_input: Mutex<bool>,
    typed: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            ..Self::default()
        }
    }

    /// A tab whose navigations never take effect.
    pub fn pinned(url: &str) -> Self {
        Self {
            pinned: true,
            ..Self::new(url)
        }
    }

    pub fn route(&self, path: &str, body: Value) {
        self.route_status(path, 200, body);
    }

    pub fn route_status(&self, path: &str, status: u16, body: Value) {
        let res = ApiResponse {
            ok: (200..300).contains(&status),
            status,
            data: Some(body),
            error: None,
        };
        self.routes.lock().unwrap().insert(path.to_string(), res);
    }

    /// Requests to `path` fail before any response arrives.
    pub fn route_failure(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), ApiResponse::failed("TypeError: Failed to fetch"));
    }

    /// Markup served while the tab is at `url`.
    pub fn document(&self, url: &str, html: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn with_trigger(&self, selector: &str) {
        self.triggers.lock().unwrap().push(selector.to_string());
    }

    pub fn with_search_input(&self) {
        *self.search_input.lock().unwrap() = true;
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_matching(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|path| path.starts_with(prefix))
            .count()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentPage for FakePage {
    async fn url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Option<String> {
        Some("Agent Workspace".to_string())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.visits.lock().unwrap().push(url.to_string());
        if !self.pinned {
            *self.url.lock().unwrap() = url.to_string();
        }
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        let url = self.url.lock().unwrap().clone();
        if url.is_empty() {
            return Err(Error::Page("tab has no document".to_string()));
        }
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn fetch_json(&self, path: &str) -> ApiResponse {
        self.requests.lock().unwrap().push(path.to_string());
        let routes = self.routes.lock().unwrap();
        let bare = path.split('?').next().unwrap_or(path);
        routes
            .get(path)
            .or_else(|| routes.get(bare))
            .cloned()
            .unwrap_or(ApiResponse {
                ok: false,
                status: 404,
                data: None,
                error: None,
            })
    }

    async fn prepare_interaction(&self, _ui_wait: Duration) {}

    async fn wait_until_ready(&self, _ui_wait: Duration) {}

    async fn click_first(&self, selector: &str) -> bool {
        let present = self.triggers.lock().unwrap().iter().any(|s| s == selector);
        if present {
            self.clicks.lock().unwrap().push(selector.to_string());
        }
        present
    }

    async fn focus_first_visible(&self, _selectors: &[&str]) -> bool {
        *self.search_input.lock().unwrap()
    }

    async fn type_and_submit(&self, text: &str) -> Result<()> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
