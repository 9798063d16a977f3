//! Finds (or opens) the Zendesk agent tab an invocation works in.

use crate::cdp_page::CdpPage;
use crate::host_pattern::HostPattern;
use crate::session::CdpSession;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use zagent_core::AgentPage;

/// Settle time after binding, before any extraction.
pub const BIND_SETTLE: Duration = Duration::from_millis(500);

/// Which existing tab to use, by index into the tab list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabChoice {
    /// On the target host and inside the agent area.
    Agent(usize),
    /// On the target host but outside the agent area.
    OutsideAgent(usize),
    None,
}

fn in_agent_area(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|url| url.path().to_lowercase().starts_with("/agent/"))
        .unwrap_or(false)
}

/// Prefer the first agent-area tab, else the first tab on the host.
pub fn select_tab(urls: &[String], pattern: &HostPattern) -> TabChoice {
    let on_host: Vec<usize> = urls
        .iter()
        .enumerate()
        .filter(|(_, url)| pattern.matches_url(url))
        .map(|(idx, _)| idx)
        .collect();

    if let Some(idx) = on_host.iter().copied().find(|idx| in_agent_area(&urls[*idx])) {
        return TabChoice::Agent(idx);
    }
    match on_host.first() {
        Some(idx) => TabChoice::OutsideAgent(*idx),
        None => TabChoice::None,
    }
}

/// What `bind` does with the current tab list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAction {
    /// Use this tab as it is.
    Reuse(usize),
    /// Send this tab to the start URL.
    Navigate { tab: usize, url: String },
    /// Open a new tab on the start URL.
    Open(String),
}

/// Decide how to bind given the tab URLs. `start_url` empty means none.
pub fn plan_bind(urls: &[String], start_url: &str) -> Result<BindAction> {
    let start_url = Some(start_url.trim()).filter(|s| !s.is_empty());
    let pattern = HostPattern::for_start_url(start_url);

    match select_tab(urls, &pattern) {
        TabChoice::Agent(idx) => Ok(BindAction::Reuse(idx)),
        TabChoice::OutsideAgent(idx) => match start_url {
            Some(url) => Ok(BindAction::Navigate {
                tab: idx,
                url: url.to_string(),
            }),
            None => Err(Error::Bind(
                "Found Zendesk tab but not an agent page. Provide --start-path or set \
                 domain/startPath in zendesk config."
                    .to_string(),
            )),
        },
        TabChoice::None => match start_url {
            Some(url) => Ok(BindAction::Open(url.to_string())),
            None => Err(Error::Bind(
                "No Zendesk agent tab found. Provide --start-path or set domain/startPath \
                 in zendesk config."
                    .to_string(),
            )),
        },
    }
}

/// Raise the tab unless running in the background. Failure to raise is logged only.
async fn raise<F, T, E>(background: bool, bring_to_front: F)
where
    F: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    if background {
        return;
    }
    if let Err(e) = bring_to_front.await {
        tracing::debug!("bring_to_front failed: {}", e);
    }
}

/// Bind the agent tab for this session.
///
/// `start_url` is where to go when no suitable tab exists; empty means none.
pub async fn bind(session: &CdpSession, start_url: &str, background: bool) -> Result<CdpPage> {
    let pages = session.pages().await?;
    let mut urls = Vec::with_capacity(pages.len());
    for page in &pages {
        urls.push(page.url().await.ok().flatten().unwrap_or_default());
    }

    let page = match plan_bind(&urls, start_url)? {
        BindAction::Reuse(idx) => {
            tracing::debug!("Reusing agent tab {}", urls[idx]);
            CdpPage::new(pages[idx].clone())
        }
        BindAction::Navigate { tab, url } => {
            tracing::debug!("Moving tab {} to {}", urls[tab], url);
            let page = CdpPage::new(pages[tab].clone());
            page.goto(&url).await?;
            page
        }
        BindAction::Open(url) => {
            tracing::info!("Opening {}", url);
            let page = CdpPage::new(session.new_page("about:blank").await?);
            page.goto(&url).await?;
            page
        }
    };

    raise(background, page.bring_to_front()).await;
    tokio::time::sleep(BIND_SETTLE).await;
    Ok(page)
}
