use crate::GlobalArgs;
use crate::output::emit;
use crate::runtime::{block_on, with_agent_browser};
use anyhow::Result;
use zagent_core::assemble::search_report;
use zagent_core::retrieve;

/// `search tickets <query>`
pub fn tickets(globals: &GlobalArgs, query: &str, count: usize) -> Result<()> {
    let config = globals.resolve()?;
    let count = count.max(1);

    let report = block_on(with_agent_browser(&config, |agent| async move {
        let found = retrieve::search_tickets(&agent.page, &agent.ctx, query, count).await?;
        Ok(search_report(found, query, agent.meta))
    }))??;

    emit(&config, globals.out.as_deref(), &report)
}
