//! Structured-API tier: same-origin JSON requests made from inside the agent page.
//!
//! Every function here answers `None` when the API has nothing usable (non-2xx,
//! malformed body, zero rows), leaving the decision to fall back to the caller.

use super::matching::{EXACT_MATCH, best_match};
use crate::model::{
    Identity, MatchOrigin, MatchedQueue, QueueListing, QueueTicket, SearchHit, SearchResults,
    Ticket, TicketComment,
};
use crate::page::AgentPage;
use crate::text::{
    agent_url, clean, clean_opt, digits_only, encode_component, is_numeric_id, truncate_chars,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use url::Url;

pub const MAX_COMMENT_CHARS: usize = 4000;
pub const MAX_SNIPPET_CHARS: usize = 500;
pub const QUEUE_PAGE_CAP: usize = 500;
pub const SEARCH_PAGE_CAP: usize = 50;
const API_PAGE_SIZE: usize = 100;

/// Bounds for following `next_page` links.
#[derive(Debug, Clone, Copy)]
pub struct PageCaps {
    /// `None` means no item cap; the page cap still applies.
    pub max_items: Option<usize>,
    pub max_pages: usize,
    pub item_key: &'static str,
}

/// Fetch rows from a paginated endpoint until the item cap, the page cap,
/// or the last page is reached, whichever comes first.
pub async fn get_all_pages<P: AgentPage + ?Sized>(
    page: &P,
    initial_path: &str,
    caps: PageCaps,
) -> Vec<Value> {
    let max_items = caps.max_items.map(|n| n.max(1)).unwrap_or(usize::MAX);
    let max_pages = caps.max_pages.max(1);

    let mut next_path = Some(initial_path.to_string());
    let mut page_count = 0;
    let mut rows: Vec<Value> = Vec::new();

    while let Some(path) = next_path.take() {
        if page_count >= max_pages || rows.len() >= max_items {
            break;
        }

        let res = page.fetch_json(&path).await;
        let Some(body) = res.body() else {
            tracing::debug!("API page {} returned no data (status {})", path, res.status);
            break;
        };

        let remaining = max_items - rows.len();
        if let Some(items) = body.get(caps.item_key).and_then(Value::as_array) {
            rows.extend(items.iter().take(remaining).cloned());
        }
        page_count += 1;

        next_path = body
            .get("next_page")
            .and_then(Value::as_str)
            .and_then(|next| Url::parse(next).ok())
            .map(|url| match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            });
    }

    tracing::debug!(
        "Collected {} rows from {} page(s) starting at {}",
        rows.len(),
        page_count,
        initial_path
    );
    rows
}

/// Numeric ids arrive as numbers or strings; normalise to a non-empty string.
pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn text_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).map(clean).unwrap_or_default()
}

fn text_field_opt(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(clean_opt)
}

/// Resolve user ids to display names with a single batched lookup.
///
/// Ids are de-duplicated (first occurrence order) before the request.
pub async fn fetch_users_map<P, I>(page: &P, ids: I) -> HashMap<String, String>
where
    P: AgentPage + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let unique: Vec<String> = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();
    if unique.is_empty() {
        return HashMap::new();
    }

    let path = format!(
        "/api/v2/users/show_many.json?ids={}",
        encode_component(&unique.join(","))
    );
    let res = page.fetch_json(&path).await;
    let Some(users) = res
        .body()
        .and_then(|body| body.get("users"))
        .and_then(Value::as_array)
    else {
        return HashMap::new();
    };

    let mut map = HashMap::new();
    for user in users {
        let Some(id) = id_string(user.get("id")) else {
            continue;
        };
        let name = text_field_opt(user, "name")
            .or_else(|| text_field_opt(user, "email"))
            .unwrap_or_else(|| id.clone());
        map.insert(id, name);
    }
    map
}

fn display_name(users: &HashMap<String, String>, id: Option<&String>) -> Option<String> {
    let id = id?;
    Some(users.get(id).cloned().unwrap_or_else(|| id.clone()))
}

pub async fn read_ticket<P: AgentPage + ?Sized>(
    page: &P,
    ticket_id: &str,
    comment_count: usize,
    base_url: &str,
) -> Option<Ticket> {
    let id = digits_only(ticket_id);
    if id.is_empty() {
        return None;
    }
    let comment_count = comment_count.max(1);

    let ticket_res = page.fetch_json(&format!("/api/v2/tickets/{}.json", id)).await;
    let ticket = ticket_res.body()?.get("ticket")?.clone();

    let comments_res = page
        .fetch_json(&format!("/api/v2/tickets/{}/comments.json?sort_order=desc", id))
        .await;
    let raw_comments: Vec<Value> = comments_res
        .body()
        .and_then(|body| body.get("comments"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let requester_id = id_string(ticket.get("requester_id"));
    let assignee_id = id_string(ticket.get("assignee_id"));
    let actor_ids = requester_id
        .iter()
        .chain(assignee_id.iter())
        .cloned()
        .chain(raw_comments.iter().filter_map(|c| id_string(c.get("author_id"))));
    let users = fetch_users_map(page, actor_ids).await;

    // newest N, presented oldest first
    let comments = raw_comments
        .iter()
        .take(comment_count)
        .rev()
        .filter_map(|c| {
            let body = text_field_opt(c, "plain_body").or_else(|| text_field_opt(c, "body"))?;
            let author_id = id_string(c.get("author_id"));
            Some(TicketComment {
                author: display_name(&users, author_id.as_ref()),
                time: text_field_opt(c, "created_at"),
                text: truncate_chars(&body, MAX_COMMENT_CHARS),
            })
        })
        .collect();

    let tags = ticket
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Ticket {
        page_url: agent_url(base_url, &format!("/agent/tickets/{}", id)),
        page_title: None,
        ticket_id: id_string(ticket.get("id")).or(Some(id)),
        subject: text_field_opt(&ticket, "subject"),
        status: text_field_opt(&ticket, "status"),
        priority: text_field_opt(&ticket, "priority"),
        assignee: display_name(&users, assignee_id.as_ref()),
        requester: display_name(&users, requester_id.as_ref()),
        tags,
        comments,
    })
}

/// Look a view up by title across the regular and active view listings.
pub async fn find_view_by_name<P: AgentPage + ?Sized>(
    page: &P,
    queue_name: &str,
    base_url: &str,
) -> Option<MatchedQueue> {
    let requested = clean(queue_name);
    if requested.is_empty() {
        return None;
    }

    // a bare id needs no lookup
    if is_numeric_id(&requested) {
        return Some(MatchedQueue {
            href: agent_url(base_url, &format!("/agent/filters/{}", requested)),
            id: Some(requested.clone()),
            score: EXACT_MATCH,
            name: Some(requested),
            source: MatchOrigin::IdApi,
        });
    }

    let mut views: Vec<Value> = Vec::new();
    for path in [
        "/api/v2/views.json?page[size]=100",
        "/api/v2/views/active.json?page[size]=100",
    ] {
        let res = page.fetch_json(path).await;
        if let Some(rows) = res
            .body()
            .and_then(|body| body.get("views"))
            .and_then(Value::as_array)
        {
            views.extend(rows.iter().cloned());
        }
    }

    let candidates = views.iter().filter_map(|view| {
        let id = id_string(view.get("id"))?;
        let title = text_field_opt(view, "title")?;
        Some((id, title))
    });

    let ((id, title), score) = best_match(candidates, &requested, |(_, title)| title.as_str())?;
    Some(MatchedQueue {
        href: agent_url(base_url, &format!("/agent/filters/{}", id)),
        id: Some(id),
        score,
        name: Some(title),
        source: MatchOrigin::Api,
    })
}

/// Read a view's tickets. `count: None` is a full sync bounded only by the page cap.
pub async fn read_queue<P: AgentPage + ?Sized>(
    page: &P,
    view_id: &str,
    count: Option<usize>,
    base_url: &str,
) -> Option<QueueListing> {
    let id = digits_only(view_id);
    if id.is_empty() {
        return None;
    }
    let count = count.map(|n| n.max(1));
    let per_page = count.unwrap_or(API_PAGE_SIZE).min(API_PAGE_SIZE);

    let view_res = page.fetch_json(&format!("/api/v2/views/{}.json", id)).await;
    let raw_tickets = get_all_pages(
        page,
        &format!("/api/v2/views/{}/tickets.json?per_page={}", id, per_page),
        PageCaps {
            max_items: count,
            max_pages: QUEUE_PAGE_CAP,
            item_key: "tickets",
        },
    )
    .await;
    if raw_tickets.is_empty() {
        return None;
    }

    let user_ids = raw_tickets.iter().flat_map(|t| {
        [
            id_string(t.get("requester_id")),
            id_string(t.get("assignee_id")),
        ]
        .into_iter()
        .flatten()
    });
    let users = fetch_users_map(page, user_ids).await;

    let tickets = raw_tickets
        .iter()
        .map(|t| {
            let ticket_id = id_string(t.get("id"));
            let assignee_id = id_string(t.get("assignee_id"));
            let requester_id = id_string(t.get("requester_id"));
            QueueTicket {
                url: ticket_id
                    .as_ref()
                    .map(|tid| agent_url(base_url, &format!("/agent/tickets/{}", tid))),
                ticket_id,
                subject: Some(text_field(t, "subject")),
                status: Some(text_field(t, "status")),
                assignee: display_name(&users, assignee_id.as_ref()),
                assignee_id,
                requester: display_name(&users, requester_id.as_ref()),
                requester_id,
            }
        })
        .collect();

    let queue_name = view_res
        .body()
        .and_then(|body| body.get("view"))
        .and_then(|view| text_field_opt(view, "title"));

    Some(QueueListing {
        page_url: agent_url(base_url, &format!("/agent/filters/{}", id)),
        page_title: None,
        queue_name,
        full_sync: count.is_none(),
        tickets,
    })
}

pub fn search_page_url(base_url: &str, query: &str) -> String {
    agent_url(
        base_url,
        &format!("/agent/search/1?query={}", encode_component(query)),
    )
}

pub async fn search_tickets<P: AgentPage + ?Sized>(
    page: &P,
    query: &str,
    count: usize,
    base_url: &str,
) -> Option<SearchResults> {
    let q = clean(query);
    if q.is_empty() {
        return None;
    }
    let count = count.max(1);

    let rows = get_all_pages(
        page,
        &format!(
            "/api/v2/search.json?query={}&per_page={}",
            encode_component(&format!("type:ticket {}", q)),
            count.min(API_PAGE_SIZE)
        ),
        PageCaps {
            max_items: Some(count),
            max_pages: SEARCH_PAGE_CAP,
            item_key: "results",
        },
    )
    .await;

    let results: Vec<SearchHit> = rows
        .iter()
        .filter(|row| row.get("result_type").and_then(Value::as_str) == Some("ticket"))
        .take(count)
        .map(|row| {
            let ticket_id = id_string(row.get("id"));
            SearchHit {
                url: ticket_id
                    .as_ref()
                    .map(|tid| agent_url(base_url, &format!("/agent/tickets/{}", tid))),
                ticket_id,
                title: Some(text_field(row, "subject")),
                snippet: clean_opt(&truncate_chars(&text_field(row, "description"), MAX_SNIPPET_CHARS)),
            }
        })
        .collect();
    if results.is_empty() {
        return None;
    }

    Some(SearchResults {
        page_url: search_page_url(base_url, &q),
        page_title: None,
        query: q,
        results,
    })
}

pub async fn current_user<P: AgentPage + ?Sized>(page: &P) -> Option<Identity> {
    let res = page.fetch_json("/api/v2/users/me.json").await;
    let user = res.body()?.get("user")?;

    let identity = Identity {
        id: id_string(user.get("id")),
        name: text_field_opt(user, "name"),
        email: text_field_opt(user, "email"),
        role: text_field_opt(user, "role"),
    };
    // anonymous sessions get a user object without an id
    identity.id.as_ref()?;
    Some(identity)
}
