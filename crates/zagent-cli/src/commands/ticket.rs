use crate::GlobalArgs;
use crate::output::emit;
use crate::runtime::{block_on, with_agent_browser};
use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::Value;
use zagent_core::ResolvedConfig;
use zagent_core::assemble::{READ_TICKET, ticket_report};
use zagent_core::retrieve;
use zagent_core::store::TicketCache;
use zagent_core::text::digits_only;

/// `ticket read <id>`: cache first, then the agent tab.
pub fn read(globals: &GlobalArgs, ticket_id: &str, comments: usize) -> Result<()> {
    let config = globals.resolve()?;
    let comments = comments.max(1);
    let id = digits_only(ticket_id);

    if config.cache || config.cache_only {
        if let Some(cached) = cached_ticket(&config, &id) {
            return emit(&config, globals.out.as_deref(), &cached);
        }
    }

    if config.cache_only {
        bail!(
            "No cached ticket found for {} within ttl={}s.",
            if id.is_empty() { ticket_id } else { id.as_str() },
            config.cache_ttl
        );
    }

    let requested = if id.is_empty() { ticket_id.to_string() } else { id };
    let report = block_on(with_agent_browser(&config, |agent| async move {
        let found = retrieve::read_ticket(&agent.page, &agent.ctx, ticket_id, comments).await?;
        if found.is_empty() {
            tracing::warn!("Ticket {} not found through the API or the page", requested);
        }
        Ok(ticket_report(found, &requested, agent.meta))
    }))??;

    emit(&config, globals.out.as_deref(), &report)
}

/// A fresh cached record, stamped like a live result.
fn cached_ticket(config: &ResolvedConfig, id: &str) -> Option<Value> {
    let mut cached = TicketCache::read(&config.store_root, id, config.cache_ttl, Utc::now())?;
    tracing::debug!("Cache hit for ticket {}", id);

    let fields = cached.as_object_mut()?;
    let cdp_url = fields
        .get("cdpUrl")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(config.cdp_url.as_str())
        .to_string();
    fields.insert("ok".to_string(), Value::Bool(true));
    fields.insert("command".to_string(), Value::from(READ_TICKET));
    fields.insert("requestedTicketId".to_string(), Value::from(id));
    fields.insert("launchedChrome".to_string(), Value::Bool(false));
    fields.insert("cdpUrl".to_string(), Value::String(cdp_url));
    Some(cached)
}
