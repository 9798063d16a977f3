//! The seam between retrieval logic and a live browser tab.

use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Result of a same-origin JSON fetch made from inside the page.
///
/// Transport failures and unparseable bodies are folded into `ok: false` /
/// `data: None` rather than surfacing as errors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    pub status: u16,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: 0,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The parsed body, only when the request succeeded.
    pub fn body(&self) -> Option<&Value> {
        if self.ok { self.data.as_ref() } else { None }
    }
}

/// A bound agent tab.
///
/// Implemented over CDP by `zagent-browser`; tests use in-memory fakes.
#[async_trait]
pub trait AgentPage: Send + Sync {
    /// Current URL of the tab.
    async fn url(&self) -> Result<String>;

    /// Document title, if any. Never fails.
    async fn title(&self) -> Option<String>;

    /// Navigate and wait for the DOM to load.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Serialized markup of the rendered document.
    async fn html(&self) -> Result<String>;

    /// GET `path` with the page's ambient session cookies. Never fails.
    async fn fetch_json(&self, path: &str) -> ApiResponse;

    /// Blur whatever has focus and let the UI settle.
    async fn prepare_interaction(&self, ui_wait: Duration);

    /// Wait for agent navigation anchors, then settle. Best-effort.
    async fn wait_until_ready(&self, ui_wait: Duration);

    /// Click the first element matching `selector`. `false` when none exists.
    async fn click_first(&self, selector: &str) -> bool;

    /// Focus and clear the first visible element matching any of `selectors`,
    /// tried in order. `false` when nothing visible matched.
    async fn focus_first_visible(&self, selectors: &[&str]) -> bool;

    /// Type into the element focused by [`AgentPage::focus_first_visible`] and press Enter.
    async fn type_and_submit(&self, text: &str) -> Result<()>;
}

/// Per-call retrieval settings. Not retained past the call.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    /// `scheme://host` of the agent application; empty means "derive from the page".
    pub base_url: String,
    pub ui_wait: Duration,
}

impl RetrievalContext {
    pub fn new(base_url: impl Into<String>, ui_wait: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            ui_wait,
        }
    }

    /// The configured base URL, else the one the page is currently on.
    pub async fn resolve_base<P: AgentPage + ?Sized>(&self, page: &P) -> String {
        if let Some(base) = crate::text::base_url(&self.base_url) {
            return base;
        }
        match page.url().await {
            Ok(url) => crate::text::base_url(&url).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_response_body_only_when_ok() {
        let ok = ApiResponse {
            ok: true,
            status: 200,
            data: Some(json!({"user": {"id": 1}})),
            error: None,
        };
        assert!(ok.body().is_some());

        let not_found = ApiResponse {
            ok: false,
            status: 404,
            data: Some(json!({"error": "RecordNotFound"})),
            error: None,
        };
        assert!(not_found.body().is_none());
        assert!(ApiResponse::failed("boom").body().is_none());
    }

    #[test]
    fn test_api_response_deserializes_page_payload() {
        let raw = r#"{"ok":false,"status":0,"error":"Failed to fetch","data":null}"#;
        let res: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(res.error.as_deref(), Some("Failed to fetch"));
        assert!(res.data.is_none());
    }
}
