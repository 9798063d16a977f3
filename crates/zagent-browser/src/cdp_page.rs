use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use zagent_core::retrieve::dom::settle;
use zagent_core::{AgentPage, ApiResponse, Error, Result};

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);
pub const EVALUATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const READY_TIMEOUT: Duration = Duration::from_secs(15);
const READY_POLL: Duration = Duration::from_millis(250);

const READY_SELECTOR: &str = r#"a[href*="/agent/filters/"], a[href*="/agent/tickets/"], main"#;
/// Marks the element chosen by `focus_first_visible` for `type_and_submit`.
const FOCUS_MARK: &str = "data-zagent-focus";

/// An agent tab driven over CDP.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

async fn bounded<T, E: std::fmt::Display>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T> {
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::Page(format!("{}: {}", what, e))),
        Err(_) => Err(Error::Timeout {
            ms: limit.as_millis() as u64,
            what: what.to_string(),
        }),
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Raise the tab.
    pub async fn bring_to_front(&self) -> Result<()> {
        self.page
            .bring_to_front()
            .await
            .map_err(|e| Error::Page(e.to_string()))?;
        Ok(())
    }

    async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(Error::Page)?;
        let result = bounded(
            EVALUATION_TIMEOUT,
            "script evaluation",
            self.page.evaluate_expression(params),
        )
        .await?;
        result
            .into_value::<T>()
            .map_err(|e| Error::Page(format!("Unexpected script result: {}", e)))
    }

    async fn anchor_present(&self) -> bool {
        let script = format!("!!document.querySelector({})", js_string(READY_SELECTOR));
        self.evaluate::<bool>(&script).await.unwrap_or(false)
    }
}

#[async_trait]
impl AgentPage for CdpPage {
    async fn url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| Error::Page(format!("Failed to read page URL: {}", e)))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> Option<String> {
        self.page
            .get_title()
            .await
            .ok()
            .flatten()
            .filter(|t| !t.trim().is_empty())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        tracing::debug!("Navigating to {}", url);
        match timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Navigation(format!("Failed to open {}: {}", url, e))),
            Err(_) => Err(Error::Timeout {
                ms: NAVIGATION_TIMEOUT.as_millis() as u64,
                what: format!("navigation to {}", url),
            }),
        }
    }

    async fn html(&self) -> Result<String> {
        bounded(EVALUATION_TIMEOUT, "page content", self.page.content()).await
    }

    async fn fetch_json(&self, path: &str) -> ApiResponse {
        let script = format!(
            r#"(async () => {{
  try {{
    const res = await fetch({path}, {{ credentials: 'same-origin', headers: {{ Accept: 'application/json' }} }});
    const text = await res.text();
    let data = null;
    try {{ data = text ? JSON.parse(text) : null; }} catch (_) {{ data = null; }}
    return {{ ok: res.ok, status: res.status, data, error: null }};
  }} catch (e) {{
    return {{ ok: false, status: 0, data: null, error: String((e && e.message) || e) }};
  }}
}})()"#,
            path = js_string(path)
        );

        match self.evaluate::<ApiResponse>(&script).await {
            Ok(response) => {
                tracing::debug!("GET {} -> {}", path, response.status);
                response
            }
            Err(e) => {
                tracing::debug!("GET {} failed: {}", path, e);
                ApiResponse::failed(e.to_string())
            }
        }
    }

    async fn prepare_interaction(&self, ui_wait: Duration) {
        let blur = "(() => { const el = document.activeElement; \
                    if (el && typeof el.blur === 'function') el.blur(); return true; })()";
        if let Err(e) = self.evaluate::<bool>(blur).await {
            tracing::debug!("blur failed: {}", e);
        }
        tokio::time::sleep(settle(ui_wait, 120, 4)).await;
    }

    async fn wait_until_ready(&self, ui_wait: Duration) {
        self.prepare_interaction(ui_wait).await;

        let deadline = Instant::now() + READY_TIMEOUT;
        while !self.anchor_present().await {
            if Instant::now() >= deadline {
                tracing::debug!("No agent anchors after {:?}", READY_TIMEOUT);
                break;
            }
            tokio::time::sleep(READY_POLL).await;
        }

        tokio::time::sleep(settle(ui_wait, 500, 2)).await;
    }

    async fn click_first(&self, selector: &str) -> bool {
        match self.page.find_element(selector).await {
            Ok(element) => match timeout(Duration::from_secs(2), element.click()).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    tracing::debug!("click on {} failed: {}", selector, e);
                    false
                }
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    async fn focus_first_visible(&self, selectors: &[&str]) -> bool {
        let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
        let script = format!(
            r#"(() => {{
  const isVisible = (el) => {{
    if (!el || !(el instanceof HTMLElement)) return false;
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
  }};
  document.querySelectorAll('[{mark}]').forEach((el) => el.removeAttribute('{mark}'));
  for (const selector of {list}) {{
    const el = Array.from(document.querySelectorAll(selector)).find(isVisible);
    if (!el) continue;
    el.setAttribute('{mark}', '1');
    el.focus();
    el.click();
    if ('value' in el) {{
      el.value = '';
      el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    }} else {{
      el.textContent = '';
    }}
    return true;
  }}
  return false;
}})()"#,
            mark = FOCUS_MARK,
            list = list
        );
        self.evaluate::<bool>(&script).await.unwrap_or(false)
    }

    async fn type_and_submit(&self, text: &str) -> Result<()> {
        let selector = format!("[{}]", FOCUS_MARK);
        let element = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(|e| Error::Page(format!("Search input went away: {}", e)))?;
        bounded(EVALUATION_TIMEOUT, "typing search query", element.type_str(text)).await?;
        bounded(EVALUATION_TIMEOUT, "submitting search", element.press_key("Enter")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"/api/v2/search.json?query="a b""#), r#""/api/v2/search.json?query=\"a b\"""#);
    }

    #[tokio::test]
    async fn test_bounded_maps_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, String>(())
        };
        match bounded(Duration::from_millis(10), "slow thing", slow).await {
            Err(Error::Timeout { ms, what }) => {
                assert_eq!(ms, 10);
                assert_eq!(what, "slow thing");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bounded_maps_failure() {
        let failing = async { Err::<(), _>("socket closed") };
        let err = bounded(Duration::from_secs(1), "page content", failing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Page error: page content: socket closed");
    }
}
