use anyhow::Result;
use chrono::Utc;
use console::style;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use zagent_core::ResolvedConfig;
use zagent_core::store::SnapshotWriter;

/// Persist, optionally write `--out`, then print as JSON or text.
pub fn emit<T: Serialize>(config: &ResolvedConfig, out: Option<&Path>, result: &T) -> Result<()> {
    let mut output = serde_json::to_value(result)?;

    let cache_hit = output.get("cacheHit").and_then(Value::as_bool) == Some(true);
    if config.store && !cache_hit {
        if let Some(persisted) = SnapshotWriter::persist(&output, &config.store_root, Utc::now())? {
            if let Value::Object(fields) = &mut output {
                fields.insert("persisted".to_string(), serde_json::to_value(&persisted)?);
            }
        }
    }

    if let Some(out) = out {
        let out_path = std::path::absolute(out)?;
        SnapshotWriter::write_json(&out_path, &output)?;
    }

    if config.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in render_text(&output) {
        println!("{}", line);
    }
    Ok(())
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn or<'a>(value: &'a Value, key: &str, fallback: &'a str) -> &'a str {
    text(value, key).unwrap_or(fallback)
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn stored_line(output: &Value) -> Option<String> {
    output
        .get("persisted")
        .and_then(|p| p.get("latestPath"))
        .and_then(Value::as_str)
        .map(|path| format!("Stored: {}", style(path).dim()))
}

fn user_label(user: &Value) -> Option<String> {
    ["name", "email", "id"]
        .iter()
        .find_map(|key| text(user, key))
        .map(str::to_string)
}

/// Human-readable summary of a command payload.
pub fn render_text(output: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let command = or(output, "command", "");

    match command {
        "read-ticket" => {
            lines.push(format!("Ticket: {}", style(or(output, "ticketId", "unknown")).bold()));
            lines.push(format!("Subject: {}", or(output, "subject", "unknown")));
            lines.push(format!("Status: {}", or(output, "status", "unknown")));
            lines.push(format!("Priority: {}", or(output, "priority", "unknown")));
            lines.push(format!("Assignee: {}", or(output, "assignee", "unknown")));
            lines.push(format!("Requester: {}", or(output, "requester", "unknown")));
            lines.push(format!("URL: {}", or(output, "pageUrl", "unknown")));
            if output.get("cacheHit").and_then(Value::as_bool) == Some(true) {
                let age = output.get("cacheAgeSeconds").and_then(Value::as_u64).unwrap_or(0);
                lines.push(format!("Cache: hit ({}s old)", age));
            }
            lines.extend(stored_line(output));
            lines.push(String::new());
            for (i, row) in items(output, "comments").iter().enumerate() {
                lines.push(format!(
                    "{}. [{} @ {}] {}",
                    i + 1,
                    or(row, "author", "Unknown"),
                    or(row, "time", "time-unknown"),
                    or(row, "text", "")
                ));
            }
        }
        "read-queue" => {
            lines.push(format!("Queue: {}", style(or(output, "queueName", "unknown")).bold()));
            lines.push(format!("URL: {}", or(output, "pageUrl", "unknown")));
            lines.push(format!("Tickets: {}", output["resultCount"]));
            lines.extend(stored_line(output));
            lines.push(String::new());
            for (i, row) in items(output, "tickets").iter().enumerate() {
                lines.push(format!(
                    "{}. #{} {} [{}]",
                    i + 1,
                    or(row, "ticketId", "?"),
                    or(row, "subject", "(no subject)"),
                    or(row, "status", "unknown")
                ));
            }
        }
        "search-tickets" => {
            lines.push(format!("Query: {}", style(or(output, "query", "")).bold()));
            lines.push(format!("URL: {}", or(output, "pageUrl", "unknown")));
            lines.push(format!("Hits: {}", output["resultCount"]));
            lines.extend(stored_line(output));
            lines.push(String::new());
            for (i, row) in items(output, "results").iter().enumerate() {
                lines.push(format!(
                    "{}. #{} {}",
                    i + 1,
                    or(row, "ticketId", "?"),
                    or(row, "title", "(no title)")
                ));
                if let Some(snippet) = text(row, "snippet") {
                    lines.push(format!("   {}", style(snippet).dim()));
                }
                if let Some(url) = text(row, "url") {
                    lines.push(format!("   {}", url));
                }
            }
        }
        "list-queues" => {
            lines.push(format!("Domain: {}", or(output, "domain", "unknown")));
            lines.push(format!("Default queue: {}", or(output, "defaultQueue", "none")));
            lines.push(format!(
                "Configured queues: {}",
                output.get("count").and_then(Value::as_u64).unwrap_or(0)
            ));
            lines.push(String::new());
            for (i, row) in items(output, "queues").iter().enumerate() {
                let marker = if row.get("isDefault").and_then(Value::as_bool) == Some(true) {
                    " (default)"
                } else {
                    ""
                };
                let team = text(row, "team")
                    .map(|t| format!(" [{}]", t))
                    .unwrap_or_default();
                lines.push(format!("{}. {}{}{}", i + 1, or(row, "alias", ""), marker, team));
                lines.push(format!("   {}", or(row, "path", "(no path configured)")));
            }
        }
        "auth-check" => {
            let flag = |section: &str, key: &str| {
                output
                    .get(section)
                    .and_then(|s| s.get(key))
                    .and_then(Value::as_bool)
                    == Some(true)
            };
            lines.push(format!(
                "CDP: {}",
                if flag("cdp", "reachable") { "reachable" } else { "unreachable" }
            ));
            lines.push(format!(
                "Config: {}",
                if flag("config", "ok") { "valid" } else { "invalid" }
            ));
            lines.push(format!(
                "Auth: {}",
                if flag("auth", "authenticated") {
                    style("authenticated").green().to_string()
                } else {
                    style("not authenticated").yellow().to_string()
                }
            ));
            if let Some(label) = output["auth"].get("user").and_then(user_label) {
                lines.push(format!("User: {}", label));
            }
            if let Some(error) = output["auth"].get("error").and_then(Value::as_str) {
                lines.push(format!("Error: {}", error));
            }
            let issues = output["config"]
                .get("issues")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if !flag("config", "ok") && !issues.is_empty() {
                lines.push(String::new());
                for issue in issues {
                    lines.push(format!("- {}", issue.as_str().unwrap_or_default()));
                }
            }
        }
        "auth-login" => {
            let confirmed = output.get("authenticated").and_then(Value::as_bool) == Some(true);
            lines.push(if confirmed {
                style("Zendesk login confirmed.").green().to_string()
            } else {
                style("Zendesk login not confirmed.").yellow().to_string()
            });
            let url = text(output, "pageUrl")
                .or_else(|| text(output, "startUrl"))
                .unwrap_or("unknown");
            lines.push(format!("URL: {}", url));
            if let Some(label) = output.get("user").and_then(user_label) {
                lines.push(format!("User: {}", label));
            }
        }
        "doctor" => {
            let ok = output.get("ok").and_then(Value::as_bool) == Some(true);
            lines.push(format!(
                "Status: {}",
                if ok {
                    style("ok").green().to_string()
                } else {
                    style("needs attention").yellow().to_string()
                }
            ));
            for check in items(output, "checks") {
                let passed = check.get("ok").and_then(Value::as_bool) == Some(true);
                let detail = text(check, "detail")
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                lines.push(format!(
                    "- {}: {}{}",
                    or(check, "name", "?"),
                    if passed { "ok" } else { "fail" },
                    detail
                ));
            }
        }
        _ => lines.push(output.to_string()),
    }

    lines
}
