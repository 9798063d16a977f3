//! Rendered-page tier: navigation helpers and markup extraction.
//!
//! Extraction works on a [`Snapshot`] of the tab (URL, title, serialized HTML)
//! parsed with `scraper`. Parsing is synchronous so no parsed document is ever
//! held across an await point.

use super::matching::{EXACT_MATCH, best_match};
use crate::model::{
    Identity, MatchOrigin, MatchedQueue, QueueListing, QueueTicket, SearchHit, SearchResults,
    Ticket, TicketComment,
};
use crate::page::{AgentPage, RetrievalContext};
use crate::text::{
    agent_url, base_url, clean, clean_opt, digits_only, is_agent_path, is_numeric_id,
    ticket_id_from_url, truncate_chars, view_id_from_url,
};
use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

pub const MAX_TAGS: usize = 40;
pub const MAX_COMMENT_CHARS: usize = 4000;

lazy_static! {
    static ref SUBJECT: Selector = sel(
        r#"[data-test-id="ticket-pane-subject"], [data-garden-id="forms.input"], h1, [title]"#
    );
    static ref FIELD_LABEL: Selector = sel("label, dt, div, span");
    static ref FIELD_HOLDER: Selector = sel("div, dl");
    static ref FIELD_VALUE: Selector = sel(
        r#"button, [data-garden-id="dropdowns.menu_wrapper"], [aria-haspopup="listbox"], dd, [title]"#
    );
    static ref TAG: Selector = sel(
        r#"a[href*="tags"], [data-test-id="ticket-tags"] span, [data-garden-id="tags.item"]"#
    );
    static ref COMMENT: Selector = sel(
        r#"[data-test-id="omni-log-comment-item"], article, [role="article"], [data-test-id="ticket-pane-comment"]"#
    );
    static ref COMMENT_BODY: Selector = sel(
        r#"[data-test-id="rich-text"], [data-test-id="comment-body"], .zd-comment, p, div"#
    );
    static ref COMMENT_AUTHOR: Selector = sel(
        r#"[data-test-id="omni-log-comment-author"], [data-test-id="author"], h4, strong"#
    );
    static ref COMMENT_TIME: Selector = sel(r#"time, [data-test-id="omni-log-comment-time"]"#);

    static ref QUEUE_NAME: Selector = sel(r#"h1, [data-test-id="views_table_header"]"#);
    static ref TICKET_LINK: Selector = sel(r#"a[href*="/agent/tickets/"]"#);
    static ref QUEUE_ROW: Selector = sel("tr, li, article, div");
    static ref ROW_STATUS: Selector = sel(
        r#"[data-test-id*="status"], [title*="status" i], [aria-label*="status" i]"#
    );
    static ref ROW_REQUESTER: Selector = sel(r#"[data-test-id*="requester"], [title*="requester" i]"#);

    static ref SEARCH_ROW: Selector = sel("article, li, tr, div");
    static ref SEARCH_SNIPPET: Selector = sel(
        r#"p, [data-test-id*="snippet"], [data-test-id*="description"]"#
    );

    static ref VIEW_LINK: Selector = sel(r#"a[href*="/agent/filters/"]"#);

    static ref PROFILE: Selector = sel(
        r#"[data-test-id="header-profile-menu-button"], button[aria-label*="profile" i], [data-garden-id="chrome.nav_item"][aria-label*="profile" i]"#
    );
    static ref PROFILE_AVATAR: Selector = sel("img[alt]");
    static ref USER_LINK: Selector = sel(r#"a[href*="/agent/users/"]"#);
    static ref USER_ID: Regex = Regex::new(r"(?i)/agent/users/(\d+)").unwrap();
}

pub const SEARCH_TRIGGERS: &[&str] = &[
    r#"button[aria-label*="Search" i]"#,
    r#"[data-test-id*="search-launcher"]"#,
    r#"[data-test-id*="search"] button"#,
];

pub const SEARCH_INPUTS: &[&str] = &[
    r#"input[type="search"]"#,
    r#"input[role="combobox"]"#,
    r#"input[placeholder*="Search" i]"#,
    r#"input[aria-label*="Search" i]"#,
    r#"textarea[aria-label*="Search" i]"#,
    r#"[role="searchbox"]"#,
    r#"[role="combobox"][contenteditable="true"]"#,
    r#"[contenteditable="true"][aria-label*="Search" i]"#,
    r#"[data-test-id*="search"] input"#,
    r#"[data-test-id*="search"] [contenteditable="true"]"#,
];

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Point-in-time copy of a tab, enough to run any extractor against.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub url: String,
    pub title: Option<String>,
    pub html: String,
}

impl Snapshot {
    pub async fn capture<P: AgentPage + ?Sized>(page: &P) -> Result<Self> {
        let url = page.url().await?;
        let html = page.html().await?;
        let title = page.title().await.and_then(|t| clean_opt(&t));
        Ok(Self { url, title, html })
    }

    /// Resolve an `href` against the page's origin.
    fn absolute(&self, href: &str) -> String {
        Url::parse(&self.url)
            .and_then(|base| base.join(href))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| agent_url(&base_url(&self.url).unwrap_or_default(), href))
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    clean(&el.text().collect::<String>())
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().and_then(|el| clean_opt(&text_of(el)))
}

/// Nearest element (self included) matching `selector`.
fn closest<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    if selector.matches(&el) {
        return Some(el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| selector.matches(ancestor))
}

/// Value next to a form label such as "Status" or "Assignee".
fn read_field(doc: &Html, label: &str) -> Option<String> {
    let needle = label.to_lowercase();
    let row = doc
        .select(&FIELD_LABEL)
        .find(|node| text_of(*node).to_lowercase() == needle)?;
    let holder = closest(row, &FIELD_HOLDER)
        .or_else(|| row.parent().and_then(ElementRef::wrap))?;
    first_text(holder, &FIELD_VALUE)
}

/// Ticket links in document order, one per ticket id.
fn unique_ticket_links<'a>(doc: &'a Html) -> impl Iterator<Item = (String, ElementRef<'a>)> + 'a {
    let mut seen = HashSet::new();
    doc.select(&TICKET_LINK).filter_map(move |link| {
        let href = link.value().attr("href")?;
        let id = ticket_id_from_url(href)?;
        seen.insert(id.clone()).then_some((id, link))
    })
}

pub fn parse_ticket(snapshot: &Snapshot, max_comments: usize) -> Ticket {
    let doc = Html::parse_document(&snapshot.html);
    let max_comments = max_comments.max(1);

    let subject = doc.select(&SUBJECT).next().and_then(|el| {
        clean_opt(&text_of(el)).or_else(|| el.value().attr("value").and_then(clean_opt))
    });

    let tags = doc
        .select(&TAG)
        .filter_map(|el| clean_opt(&text_of(el)))
        .take(MAX_TAGS)
        .collect();

    let mut comments = Vec::new();
    for node in doc.select(&COMMENT) {
        let body = node
            .select(&COMMENT_BODY)
            .next()
            .map(text_of)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| text_of(node));
        if body.is_empty() {
            continue;
        }

        comments.push(TicketComment {
            author: first_text(node, &COMMENT_AUTHOR),
            time: first_text(node, &COMMENT_TIME),
            text: truncate_chars(&body, MAX_COMMENT_CHARS),
        });
        if comments.len() >= max_comments {
            break;
        }
    }

    Ticket {
        page_url: snapshot.url.clone(),
        page_title: snapshot.title.clone(),
        ticket_id: ticket_id_from_url(&snapshot.url),
        subject,
        status: read_field(&doc, "Status"),
        priority: read_field(&doc, "Priority"),
        assignee: read_field(&doc, "Assignee"),
        requester: read_field(&doc, "Requester"),
        tags,
        comments,
    }
}

/// Rows of the currently rendered view. `None` returns every visible row.
pub fn parse_queue(snapshot: &Snapshot, count: Option<usize>) -> QueueListing {
    let doc = Html::parse_document(&snapshot.html);
    let cap = count.map(|n| n.max(1)).unwrap_or(usize::MAX);

    let tickets = unique_ticket_links(&doc)
        .take(cap)
        .map(|(id, link)| {
            let row = closest(link, &QUEUE_ROW).unwrap_or(link);
            QueueTicket {
                ticket_id: Some(id),
                subject: clean_opt(&text_of(link)),
                status: first_text(row, &ROW_STATUS),
                requester: first_text(row, &ROW_REQUESTER),
                url: link.value().attr("href").map(|href| snapshot.absolute(href)),
                ..QueueTicket::default()
            }
        })
        .collect();

    QueueListing {
        page_url: snapshot.url.clone(),
        page_title: snapshot.title.clone(),
        queue_name: doc.select(&QUEUE_NAME).next().and_then(|el| clean_opt(&text_of(el))),
        full_sync: false,
        tickets,
    }
}

pub fn parse_search(snapshot: &Snapshot, query: &str, count: usize) -> SearchResults {
    let doc = Html::parse_document(&snapshot.html);

    let results = unique_ticket_links(&doc)
        .take(count.max(1))
        .map(|(id, link)| {
            let container = closest(link, &SEARCH_ROW).unwrap_or(link);
            SearchHit {
                ticket_id: Some(id),
                title: clean_opt(&text_of(link)),
                snippet: first_text(container, &SEARCH_SNIPPET),
                url: link.value().attr("href").map(|href| snapshot.absolute(href)),
            }
        })
        .collect();

    SearchResults {
        page_url: snapshot.url.clone(),
        page_title: snapshot.title.clone(),
        query: clean(query),
        results,
    }
}

/// Best-scoring view link in the agent navigation.
pub fn match_queue_link(snapshot: &Snapshot, queue_name: &str) -> Option<MatchedQueue> {
    let doc = Html::parse_document(&snapshot.html);

    let links = doc.select(&VIEW_LINK).filter_map(|link| {
        let name = clean_opt(&text_of(link))?;
        let href = link.value().attr("href").unwrap_or_default();
        Some((name, snapshot.absolute(href)))
    });

    let ((name, href), score) = best_match(links, queue_name, |(name, _)| name.as_str())?;
    Some(MatchedQueue {
        id: view_id_from_url(&href),
        score,
        name: Some(name),
        href,
        source: MatchOrigin::Dom,
    })
}

/// The signed-in agent as shown by the header profile control.
pub fn parse_identity(snapshot: &Snapshot) -> Option<Identity> {
    let doc = Html::parse_document(&snapshot.html);
    let profile = doc.select(&PROFILE).next()?;

    let name = profile
        .select(&PROFILE_AVATAR)
        .find_map(|img| img.value().attr("alt").and_then(clean_opt))
        .or_else(|| profile.value().attr("title").and_then(clean_opt))
        .or_else(|| clean_opt(&text_of(profile)));
    let id = profile
        .select(&USER_LINK)
        .find_map(|link| {
            let href = link.value().attr("href")?;
            USER_ID.captures(href).map(|caps| caps[1].to_string())
        });

    let identity = Identity {
        id,
        name,
        email: None,
        role: None,
    };
    identity.is_known().then_some(identity)
}

pub fn settle(ui_wait: Duration, floor_ms: u64, divisor: u32) -> Duration {
    Duration::from_millis(floor_ms).max(ui_wait / divisor)
}

pub async fn open_ticket<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    ticket_id: &str,
) -> Result<()> {
    let id = digits_only(ticket_id);
    if id.is_empty() {
        return Err(Error::InvalidInput("Ticket id is required.".to_string()));
    }

    let base = ctx.resolve_base(page).await;
    page.goto(&agent_url(&base, &format!("/agent/tickets/{}", id))).await?;
    page.wait_until_ready(ctx.ui_wait).await;

    let current = page.url().await?;
    let opened = Regex::new(&format!(r"(?i)/agent/tickets/{}($|[/?#])", id))
        .map(|re| re.is_match(&current))
        .unwrap_or(false);
    if !opened {
        return Err(Error::Navigation(format!(
            "Ticket {} was not opened. Current URL: {}",
            id, current
        )));
    }
    Ok(())
}

/// Navigate straight to a configured view path.
pub async fn open_queue_by_path<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    queue_path: &str,
) -> Result<MatchedQueue> {
    let path = clean(queue_path);
    if !is_agent_path(&path) {
        return Err(Error::InvalidInput(format!(
            "Invalid queue path \"{}\". Queue paths must begin with \"/agent/\".",
            path
        )));
    }

    let href = agent_url(&ctx.resolve_base(page).await, &path);
    page.goto(&href).await?;
    page.wait_until_ready(ctx.ui_wait).await;

    Ok(MatchedQueue {
        id: view_id_from_url(&path),
        score: EXACT_MATCH,
        name: None,
        href,
        source: MatchOrigin::ConfigPath,
    })
}

/// Find a view among the rendered navigation links and open it.
pub async fn open_queue_by_name<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    queue_name: &str,
) -> Result<MatchedQueue> {
    let requested = clean(queue_name);
    if requested.is_empty() {
        return Err(Error::InvalidInput("Queue name is required.".to_string()));
    }
    page.wait_until_ready(ctx.ui_wait).await;

    let matched = if is_numeric_id(&requested) {
        let base = ctx.resolve_base(page).await;
        MatchedQueue {
            href: agent_url(&base, &format!("/agent/filters/{}", requested)),
            id: Some(requested.clone()),
            score: EXACT_MATCH,
            name: Some(requested.clone()),
            source: MatchOrigin::IdDom,
        }
    } else {
        let snapshot = Snapshot::capture(page).await?;
        match_queue_link(&snapshot, &requested)
            .ok_or_else(|| Error::QueueNotFound(requested.clone()))?
    };

    page.goto(&matched.href).await?;
    page.wait_until_ready(ctx.ui_wait).await;
    Ok(matched)
}

/// Drive the in-app search box. `false` when no usable input could be focused.
pub async fn submit_search_from_ui<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    query: &str,
) -> Result<bool> {
    page.wait_until_ready(ctx.ui_wait).await;
    page.prepare_interaction(ctx.ui_wait).await;

    for selector in SEARCH_TRIGGERS {
        if page.click_first(selector).await {
            tracing::debug!("Clicked search trigger {}", selector);
            tokio::time::sleep(settle(ctx.ui_wait, 200, 3)).await;
        }
    }

    if !page.focus_first_visible(SEARCH_INPUTS).await {
        tracing::debug!("No visible search input found");
        return Ok(false);
    }

    page.type_and_submit(query).await?;
    tokio::time::sleep(settle(ctx.ui_wait, 700, 2)).await;
    Ok(true)
}

/// Run a search through the UI, or by URL when the UI route is unavailable,
/// then extract the hits.
pub async fn run_search<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    query: &str,
    count: usize,
) -> Result<SearchResults> {
    let q = clean(query);
    if q.is_empty() {
        return Err(Error::InvalidInput("Search query is required.".to_string()));
    }

    if !submit_search_from_ui(page, ctx, &q).await? {
        let base = ctx.resolve_base(page).await;
        page.goto(&super::api::search_page_url(&base, &q)).await?;
        page.wait_until_ready(ctx.ui_wait).await;
    }

    let snapshot = Snapshot::capture(page).await?;
    Ok(parse_search(&snapshot, &q, count))
}
