//! Normalized entity records produced by the retriever.
//!
//! Both retrieval tiers produce exactly these shapes. Which tier answered is carried
//! by [`Retrieved`], never by the shape of the record itself.

use serde::{Deserialize, Serialize};

/// Which retrieval tier produced an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Api,
    Dom,
}

/// Outcome of a two-tier retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved<T> {
    Api(T),
    Dom(T),
    /// Both tiers came back empty. Not an error.
    Empty,
}

impl<T> Retrieved<T> {
    pub fn source(&self) -> Option<Source> {
        match self {
            Retrieved::Api(_) => Some(Source::Api),
            Retrieved::Dom(_) => Some(Source::Dom),
            Retrieved::Empty => None,
        }
    }

    pub fn entity(&self) -> Option<&T> {
        match self {
            Retrieved::Api(entity) | Retrieved::Dom(entity) => Some(entity),
            Retrieved::Empty => None,
        }
    }

    pub fn into_entity(self) -> Option<T> {
        match self {
            Retrieved::Api(entity) | Retrieved::Dom(entity) => Some(entity),
            Retrieved::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Retrieved::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketComment {
    pub author: Option<String>,
    pub time: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub page_url: String,
    pub page_title: Option<String>,
    pub ticket_id: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub requester: Option<String>,
    pub tags: Vec<String>,
    pub comments: Vec<TicketComment>,
}

impl Ticket {
    /// True when the record carries nothing worth returning.
    pub fn is_blank(&self) -> bool {
        self.ticket_id.is_none()
            && self.subject.is_none()
            && self.status.is_none()
            && self.comments.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTicket {
    pub ticket_id: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListing {
    pub page_url: String,
    pub page_title: Option<String>,
    pub queue_name: Option<String>,
    #[serde(default)]
    pub full_sync: bool,
    pub tickets: Vec<QueueTicket>,
}

impl QueueListing {
    pub fn result_count(&self) -> usize {
        self.tickets.len()
    }
}

/// How a queue name or id was resolved to a concrete view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOrigin {
    ConfigPath,
    IdApi,
    IdDom,
    Api,
    Dom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedQueue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub score: u8,
    pub name: Option<String>,
    pub href: String,
    pub source: MatchOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub ticket_id: Option<String>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub page_url: String,
    pub page_title: Option<String>,
    pub query: String,
    pub results: Vec<SearchHit>,
}

impl SearchResults {
    pub fn result_count(&self) -> usize {
        self.results.len()
    }
}

/// The signed-in agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    pub fn is_known(&self) -> bool {
        self.id.is_some() || self.name.is_some() || self.email.is_some()
    }
}
