//! Dual-source retrieval.
//!
//! Every entity kind is tried against the structured API first. A non-empty API
//! answer is authoritative and returned as [`Retrieved::Api`]; anything else
//! (missing, non-2xx, malformed, zero rows) falls through to extraction from the
//! rendered page, returned as [`Retrieved::Dom`]. When both tiers come back empty
//! the outcome is [`Retrieved::Empty`], which is not an error.
//!
//! Navigation failures and timeouts are errors and propagate; tier misses never do.

pub mod api;
pub mod dom;
pub mod matching;

#[cfg(test)]
pub(crate) mod testing;

use crate::model::{Identity, MatchedQueue, QueueListing, Retrieved, SearchResults, Ticket};
use crate::page::{AgentPage, RetrievalContext};
use crate::text::{clean, ticket_id_from_url, view_id_from_url};
use crate::{Error, Result};
use dom::Snapshot;

/// Open a ticket by id and read it.
pub async fn read_ticket<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    ticket_id: &str,
    comment_count: usize,
) -> Result<Retrieved<Ticket>> {
    dom::open_ticket(page, ctx, ticket_id).await?;
    read_current_ticket(page, ctx, comment_count).await
}

/// Read whichever ticket the tab is showing.
pub async fn read_current_ticket<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    comment_count: usize,
) -> Result<Retrieved<Ticket>> {
    let current = page.url().await?;
    let base = ctx.resolve_base(page).await;

    if let Some(id) = ticket_id_from_url(&current) {
        if let Some(mut ticket) = api::read_ticket(page, &id, comment_count, &base).await {
            ticket.page_url = current;
            ticket.page_title = page.title().await;
            return Ok(Retrieved::Api(ticket));
        }
        tracing::warn!("API returned nothing for ticket {}, reading the page instead", id);
    }

    let snapshot = Snapshot::capture(page).await?;
    let ticket = dom::parse_ticket(&snapshot, comment_count);
    Ok(if ticket.is_blank() {
        Retrieved::Empty
    } else {
        Retrieved::Dom(ticket)
    })
}

/// Open a queue by configured path, view id or fuzzy name.
///
/// A path wins over a name. Names are looked up through the views API first,
/// then among the navigation links on the page.
pub async fn open_queue<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    queue_name: &str,
    queue_path: Option<&str>,
) -> Result<MatchedQueue> {
    let requested = clean(queue_name);
    let path = queue_path.map(clean).filter(|p| !p.is_empty());

    if let Some(path) = path {
        return dom::open_queue_by_path(page, ctx, &path).await;
    }
    if requested.is_empty() {
        return Err(Error::InvalidInput(
            "Queue name or queue path is required.".to_string(),
        ));
    }

    page.wait_until_ready(ctx.ui_wait).await;
    let base = ctx.resolve_base(page).await;

    if let Some(matched) = api::find_view_by_name(page, &requested, &base).await {
        tracing::debug!("Resolved queue {:?} via API to {}", requested, matched.href);
        page.goto(&matched.href).await?;
        page.wait_until_ready(ctx.ui_wait).await;
        return Ok(matched);
    }

    tracing::warn!("No view named {:?} via API, scanning navigation links", requested);
    dom::open_queue_by_name(page, ctx, &requested).await
}

/// Read the tickets of the view the tab is showing.
///
/// `count: None` requests a full sync.
pub async fn read_queue<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    count: Option<usize>,
) -> Result<Retrieved<QueueListing>> {
    let current = page.url().await?;
    let base = ctx.resolve_base(page).await;

    if let Some(view_id) = view_id_from_url(&current) {
        if let Some(mut listing) = api::read_queue(page, &view_id, count, &base).await {
            listing.page_url = current;
            listing.page_title = page.title().await;
            return Ok(Retrieved::Api(listing));
        }
        tracing::warn!("API returned no tickets for view {}, reading the page instead", view_id);
    }

    let snapshot = Snapshot::capture(page).await?;
    let listing = dom::parse_queue(&snapshot, count);
    Ok(if listing.tickets.is_empty() {
        Retrieved::Empty
    } else {
        Retrieved::Dom(listing)
    })
}

pub async fn search_tickets<P: AgentPage + ?Sized>(
    page: &P,
    ctx: &RetrievalContext,
    query: &str,
    count: usize,
) -> Result<Retrieved<SearchResults>> {
    let q = clean(query);
    if q.is_empty() {
        return Err(Error::InvalidInput("Search query is required.".to_string()));
    }

    page.wait_until_ready(ctx.ui_wait).await;
    let base = ctx.resolve_base(page).await;

    if let Some(mut results) = api::search_tickets(page, &q, count, &base).await {
        results.page_title = page.title().await;
        return Ok(Retrieved::Api(results));
    }
    tracing::warn!("API search for {:?} found nothing, searching through the page", q);

    let results = dom::run_search(page, ctx, &q, count).await?;
    Ok(if results.results.is_empty() {
        Retrieved::Empty
    } else {
        Retrieved::Dom(results)
    })
}

pub async fn current_user<P: AgentPage + ?Sized>(
    page: &P,
    _ctx: &RetrievalContext,
) -> Result<Retrieved<Identity>> {
    if let Some(identity) = api::current_user(page).await {
        return Ok(Retrieved::Api(identity));
    }

    let snapshot = Snapshot::capture(page).await?;
    Ok(match dom::parse_identity(&snapshot) {
        Some(identity) => Retrieved::Dom(identity),
        None => Retrieved::Empty,
    })
}

/// Whether the tab carries a signed-in agent session.
pub async fn is_authenticated<P: AgentPage + ?Sized>(page: &P, ctx: &RetrievalContext) -> bool {
    match current_user(page, ctx).await {
        Ok(found) => found.entity().is_some_and(|user| user.id.is_some()),
        Err(e) => {
            tracing::debug!("Identity lookup failed: {}", e);
            false
        }
    }
}
