//! Final command payloads: retrieval output plus request and session metadata.
//!
//! Everything here is a pure function of its arguments.

use crate::config::QueueSelection;
use crate::model::{
    MatchedQueue, QueueListing, QueueTicket, Retrieved, SearchHit, SearchResults, Source, Ticket,
};
use serde::Serialize;

pub const READ_TICKET: &str = "read-ticket";
pub const READ_QUEUE: &str = "read-queue";
pub const SEARCH_TICKETS: &str = "search-tickets";

/// How the control channel for this invocation was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub launched_chrome: bool,
    pub cdp_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReport {
    pub ok: bool,
    pub command: &'static str,
    pub source: Option<Source>,
    pub found: bool,
    #[serde(flatten)]
    pub session: SessionMeta,
    pub requested_ticket_id: String,
    #[serde(flatten)]
    pub ticket: Option<Ticket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReport {
    pub ok: bool,
    pub command: &'static str,
    pub source: Option<Source>,
    pub found: bool,
    #[serde(flatten)]
    pub session: SessionMeta,
    pub requested_queue_name: String,
    pub requested_queue_display_name: Option<String>,
    pub requested_queue_path: Option<String>,
    pub requested_queue_alias: Option<String>,
    pub requested_queue_team: Option<String>,
    pub matched_queue: MatchedQueue,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub queue_name: String,
    pub full_sync: bool,
    pub result_count: usize,
    pub tickets: Vec<QueueTicket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub ok: bool,
    pub command: &'static str,
    pub source: Option<Source>,
    pub found: bool,
    #[serde(flatten)]
    pub session: SessionMeta,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub query: String,
    pub result_count: usize,
    pub results: Vec<SearchHit>,
}

pub fn ticket_report(
    found: Retrieved<Ticket>,
    requested_ticket_id: &str,
    session: SessionMeta,
) -> TicketReport {
    let source = found.source();
    let ticket = found.into_entity();
    TicketReport {
        ok: true,
        command: READ_TICKET,
        source,
        found: ticket.is_some(),
        session,
        requested_ticket_id: requested_ticket_id.to_string(),
        ticket,
    }
}

pub fn queue_report(
    found: Retrieved<QueueListing>,
    selection: &QueueSelection,
    matched: MatchedQueue,
    full_sync: bool,
    session: SessionMeta,
) -> QueueReport {
    let source = found.source();
    let listing = found.into_entity();

    let queue_name = listing
        .as_ref()
        .and_then(|l| l.queue_name.clone())
        .or_else(|| matched.name.clone())
        .unwrap_or_else(|| selection.queue_name.clone());
    let (page_url, page_title, tickets) = match listing {
        Some(l) => (Some(l.page_url), l.page_title, l.tickets),
        None => (None, None, Vec::new()),
    };

    QueueReport {
        ok: true,
        command: READ_QUEUE,
        source,
        found: source.is_some(),
        session,
        requested_queue_name: selection.queue_name.clone(),
        requested_queue_display_name: selection.display_name.clone(),
        requested_queue_path: selection.path.clone(),
        requested_queue_alias: selection.alias.clone(),
        requested_queue_team: selection.team.clone(),
        matched_queue: matched,
        page_url,
        page_title,
        queue_name,
        full_sync,
        result_count: tickets.len(),
        tickets,
    }
}

pub fn search_report(
    found: Retrieved<SearchResults>,
    query: &str,
    session: SessionMeta,
) -> SearchReport {
    let source = found.source();
    let (page_url, page_title, query, results) = match found.into_entity() {
        Some(r) => (Some(r.page_url), r.page_title, r.query, r.results),
        None => (None, None, crate::text::clean(query), Vec::new()),
    };

    SearchReport {
        ok: true,
        command: SEARCH_TICKETS,
        source,
        found: source.is_some(),
        session,
        page_url,
        page_title,
        query,
        result_count: results.len(),
        results,
    }
}
