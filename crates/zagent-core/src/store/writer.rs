use crate::Result;
use crate::assemble::{READ_QUEUE, READ_TICKET, SEARCH_TICKETS};
use crate::text::{slugify, ticket_id_from_url};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where a command result was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persisted {
    pub entity: &'static str,
    pub key: String,
    pub root: PathBuf,
    pub latest_path: PathBuf,
    pub snapshot_path: PathBuf,
}

pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Write `record` as a timestamped snapshot plus `latest.json`.
    ///
    /// Only ticket, queue and search results are stored; other commands yield `None`.
    pub fn persist(record: &Value, store_root: &Path, now: DateTime<Utc>) -> Result<Option<Persisted>> {
        let command = record.get("command").and_then(Value::as_str).unwrap_or_default();
        let text = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or_default();

        let local = now.with_timezone(&Local);
        let day = local.format("%Y/%m/%d").to_string();
        let file_name = local.format("%H%M%S.json").to_string();

        let (entity, key, root, snapshot_dir) = match command {
            READ_TICKET => {
                let id = record
                    .get("ticketId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| ticket_id_from_url(text("pageUrl")))
                    .unwrap_or_else(|| "unknown".to_string());
                let root = store_root.join("tickets").join(&id);
                let dir = root.join("snapshots").join(&day);
                ("ticket", id, root, dir)
            }
            READ_QUEUE => {
                let slug = slugify(text("queueName"));
                let root = store_root.join("queues").join(&slug);
                let dir = root.join("snapshots").join(&day);
                ("queue", slug, root, dir)
            }
            SEARCH_TICKETS => {
                let slug = slugify(text("query"));
                let root = store_root.join("searches").join(&slug);
                let dir = root.join(&day);
                ("search", slug, root, dir)
            }
            _ => return Ok(None),
        };

        let mut stamped = Map::new();
        stamped.insert(
            "capturedAt".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if let Value::Object(fields) = record {
            stamped.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let stamped = Value::Object(stamped);

        let snapshot_path = snapshot_dir.join(file_name);
        let latest_path = root.join("latest.json");
        Self::write_json(&snapshot_path, &stamped)?;
        Self::write_json(&latest_path, &stamped)?;

        tracing::info!("Stored {} snapshot at {}", entity, latest_path.display());
        Ok(Some(Persisted {
            entity,
            key,
            root,
            latest_path,
            snapshot_path,
        }))
    }

    /// Pretty JSON with a trailing newline, creating parent directories.
    pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        tracing::debug!("Writing JSON to: {}", path.display());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
