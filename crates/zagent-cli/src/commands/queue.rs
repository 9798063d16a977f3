use crate::GlobalArgs;
use crate::output::emit;
use crate::runtime::{block_on, with_agent_browser};
use anyhow::{Result, bail};
use serde::Serialize;
use zagent_core::assemble::queue_report;
use zagent_core::retrieve;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueRow {
    alias: String,
    path: String,
    team: Option<String>,
    is_default: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueList {
    ok: bool,
    command: &'static str,
    domain: Option<String>,
    default_queue: Option<String>,
    count: usize,
    queues: Vec<QueueRow>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// `queue list`: configured aliases, no browser involved.
pub fn list(globals: &GlobalArgs, team: Option<&str>) -> Result<()> {
    let config = globals.resolve()?;
    let team_filter = team.map(|t| t.trim().to_lowercase()).unwrap_or_default();

    // BTreeMap iteration is already sorted by alias
    let queues: Vec<QueueRow> = config
        .queues
        .iter()
        .map(|(alias, queue)| QueueRow {
            alias: alias.clone(),
            path: queue.path.clone(),
            team: queue.team.clone(),
            is_default: *alias == config.default_queue,
        })
        .filter(|row| {
            team_filter.is_empty()
                || row.team.as_deref().unwrap_or_default().to_lowercase() == team_filter
        })
        .collect();

    let result = QueueList {
        ok: true,
        command: "list-queues",
        domain: non_empty(&config.domain),
        default_queue: non_empty(&config.default_queue),
        count: queues.len(),
        queues,
    };
    emit(&config, globals.out.as_deref(), &result)
}

/// `queue read [name]`: omitting `count` reads the whole queue.
pub fn read(globals: &GlobalArgs, name: Option<&str>, count: Option<usize>) -> Result<()> {
    let config = globals.resolve()?;
    let selection = config.resolve_queue(name);
    if selection.is_empty() {
        bail!(
            "Queue name is required. Pass `queue read \"<queue>\"`, set `defaultQueue` in zendesk.config.json, or set ZENDESK_DEFAULT_QUEUE."
        );
    }
    tracing::debug!(
        "Queue selection: name={} alias={:?} path={:?}",
        selection.queue_name,
        selection.alias,
        selection.path
    );

    let count = count.map(|n| n.max(1));
    let full_sync = count.is_none();

    let report = block_on(with_agent_browser(&config, |agent| async move {
        let matched = retrieve::open_queue(
            &agent.page,
            &agent.ctx,
            &selection.queue_name,
            selection.path.as_deref(),
        )
        .await?;
        let found = retrieve::read_queue(&agent.page, &agent.ctx, count).await?;
        Ok(queue_report(found, &selection, matched, full_sync, agent.meta))
    }))??;

    emit(&config, globals.out.as_deref(), &report)
}
