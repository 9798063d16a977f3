//! Queue aliases from the config file and resolution of user queue input.

use crate::text::{clean, clean_opt, is_agent_path};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A configured queue alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueAlias {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub path: String,
    pub team: Option<String>,
}

/// What a queue argument (or its absence) resolved to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSelection {
    pub queue_name: String,
    pub display_name: Option<String>,
    pub path: Option<String>,
    pub alias: Option<String>,
    pub team: Option<String>,
}

impl QueueSelection {
    pub fn is_empty(&self) -> bool {
        self.queue_name.is_empty() && self.path.is_none()
    }
}

/// Prefix a leading `/` when missing; empty input yields `fallback`.
pub fn normalize_agent_path(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    let selected = if trimmed.is_empty() { fallback.trim() } else { trimmed };
    if selected.is_empty() || selected.starts_with('/') {
        selected.to_string()
    } else {
        format!("/{}", selected)
    }
}

fn field(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).and_then(clean_opt)
}

/// Parse the `queues` object. Entries without a path are dropped.
pub fn parse_queues(raw: Option<&Value>) -> BTreeMap<String, QueueAlias> {
    let Some(Value::Object(queues)) = raw else {
        return BTreeMap::new();
    };

    queues
        .iter()
        .filter_map(|(alias, row)| {
            let row = row.as_object()?;
            let name = field(row, "name").or_else(|| field(row, "displayName"));
            let display_name = field(row, "displayName").or_else(|| field(row, "name"));
            let path = normalize_agent_path(&field(row, "path").unwrap_or_default(), "");
            if path.is_empty() {
                return None;
            }
            Some((
                alias.clone(),
                QueueAlias {
                    name,
                    display_name,
                    path,
                    team: field(row, "team"),
                },
            ))
        })
        .collect()
}

fn select(alias: &str, row: &QueueAlias) -> QueueSelection {
    QueueSelection {
        queue_name: row
            .name
            .clone()
            .or_else(|| row.display_name.clone())
            .unwrap_or_else(|| alias.to_string()),
        display_name: row.display_name.clone().or_else(|| row.name.clone()),
        path: Some(row.path.clone()),
        alias: Some(alias.to_string()),
        team: row.team.clone(),
    }
}

/// Resolve a queue argument against the configured aliases.
///
/// Tries the exact alias, a case-insensitive alias, then a case-insensitive
/// name or display name. Unknown input is passed through as a bare name.
pub fn resolve_queue_input(
    raw: Option<&str>,
    default_queue: &str,
    queues: &BTreeMap<String, QueueAlias>,
) -> QueueSelection {
    let requested = clean_opt(raw.unwrap_or_default()).unwrap_or_else(|| clean(default_queue));
    if requested.is_empty() {
        return QueueSelection::default();
    }

    if let Some(row) = queues.get(&requested) {
        return select(&requested, row);
    }

    let lowered = requested.to_lowercase();
    if let Some((alias, row)) = queues
        .iter()
        .find(|(alias, _)| alias.to_lowercase() == lowered)
    {
        return select(alias, row);
    }

    let named = |value: &Option<String>| {
        value.as_deref().is_some_and(|v| v.to_lowercase() == lowered)
    };
    if let Some((alias, row)) = queues
        .iter()
        .find(|(_, row)| named(&row.name) || named(&row.display_name))
    {
        return select(alias, row);
    }

    QueueSelection {
        queue_name: requested.clone(),
        display_name: Some(requested),
        ..QueueSelection::default()
    }
}

/// Problems with the config file's shape. Reported, never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContractValidation {
    pub ok: bool,
    pub issues: Vec<String>,
}

pub fn validate_contract(
    file: &Map<String, Value>,
    queues: &BTreeMap<String, QueueAlias>,
) -> ContractValidation {
    let mut issues = Vec::new();
    let text = |key: &str| file.get(key).and_then(Value::as_str).map(clean).unwrap_or_default();

    if text("domain").is_empty() {
        issues.push("Missing required field: domain".to_string());
    }

    let start_path = normalize_agent_path(&text("startPath"), "");
    if start_path.is_empty() {
        issues.push("Missing required field: startPath".to_string());
    } else if !is_agent_path(&start_path) {
        issues.push(format!(
            "Invalid startPath \"{}\". startPath must begin with \"/agent/\".",
            start_path
        ));
    }

    let default_queue = text("defaultQueue");
    if default_queue.is_empty() {
        issues.push("Missing required field: defaultQueue".to_string());
    }

    let raw_queues = file.get("queues").and_then(Value::as_object);
    match raw_queues {
        Some(rows) if !rows.is_empty() => {
            for (alias, row) in rows {
                let path = row
                    .get("path")
                    .and_then(Value::as_str)
                    .map(|p| normalize_agent_path(p, ""))
                    .unwrap_or_default();
                if path.is_empty() {
                    issues.push(format!("queues.{}.path is required", alias));
                } else if !is_agent_path(&path) {
                    issues.push(format!(
                        "queues.{}.path must begin with \"/agent/\" (got \"{}\")",
                        alias, path
                    ));
                }
            }
        }
        _ => issues.push(
            "Missing required field: queues (object with at least one alias)".to_string(),
        ),
    }

    if !default_queue.is_empty() && !queues.contains_key(&default_queue) {
        issues.push(format!(
            "defaultQueue \"{}\" is not defined in queues",
            default_queue
        ));
    }

    ContractValidation {
        ok: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Map<String, Value> {
        json!({
            "domain": "acme.zendesk.com",
            "startPath": "/agent/filters",
            "defaultQueue": "support-open",
            "queues": {
                "support-open": { "path": "agent/filters/123", "name": "Support Open", "team": "support" },
                "billing": { "path": "/agent/filters/200", "displayName": "Billing Queue" },
                "broken": { "name": "No path" }
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_parse_queues_normalizes_paths() {
        let file = sample();
        let queues = parse_queues(file.get("queues"));

        assert_eq!(queues.len(), 2);
        assert_eq!(queues["support-open"].path, "/agent/filters/123");
        assert_eq!(queues["billing"].name.as_deref(), Some("Billing Queue"));
        assert!(!queues.contains_key("broken"));
    }

    #[test]
    fn test_default_queue_resolves_alias() {
        let file = sample();
        let queues = parse_queues(file.get("queues"));

        let selection = resolve_queue_input(None, "support-open", &queues);
        assert_eq!(selection.alias.as_deref(), Some("support-open"));
        assert_eq!(selection.path.as_deref(), Some("/agent/filters/123"));
        assert_eq!(selection.queue_name, "Support Open");
        assert_eq!(selection.team.as_deref(), Some("support"));
    }

    #[test]
    fn test_resolve_by_case_and_name() {
        let file = sample();
        let queues = parse_queues(file.get("queues"));

        assert_eq!(
            resolve_queue_input(Some("BILLING"), "", &queues).alias.as_deref(),
            Some("billing")
        );
        assert_eq!(
            resolve_queue_input(Some("billing queue"), "", &queues).alias.as_deref(),
            Some("billing")
        );

        let unknown = resolve_queue_input(Some(" Escalations "), "support-open", &queues);
        assert_eq!(unknown.queue_name, "Escalations");
        assert_eq!(unknown.path, None);
        assert_eq!(unknown.alias, None);

        assert!(resolve_queue_input(None, "", &queues).is_empty());
    }

    #[test]
    fn test_validate_contract() {
        let file = sample();
        let queues = parse_queues(file.get("queues"));
        let validation = validate_contract(&file, &queues);

        assert!(!validation.ok);
        assert_eq!(validation.issues, vec!["queues.broken.path is required"]);

        let empty = validate_contract(&Map::new(), &BTreeMap::new());
        assert!(empty.issues.contains(&"Missing required field: domain".to_string()));
        assert_eq!(empty.issues.len(), 4);
    }
}
