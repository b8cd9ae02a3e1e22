//! Command handlers.

use crate::state::AppState;
use crate::Command;
use anyhow::Context;
use phoneprobe_scanner::BulkRequest;
use serde_json::{json, Value};
use std::path::Path;

/// Run one command and return its JSON output.
pub async fn dispatch(state: &AppState, command: Command) -> anyhow::Result<Value> {
    let orchestrator = &state.orchestrator;

    match command {
        Command::Scan { phone, country } => {
            let record = orchestrator.scan(&phone, &country).await?;
            Ok(serde_json::to_value(record)?)
        }
        Command::Bulk { file, country } => {
            let requests = read_bulk_file(&file, country.as_deref()).await?;
            tracing::info!("Bulk scan of {} entries from {}", requests.len(), file.display());

            let items = orchestrator.bulk_scan(&requests).await;
            let scanned = items.iter().filter(|item| item.is_scanned()).count();
            Ok(json!({
                "requested": requests.len(),
                "processed": items.len(),
                "scanned": scanned,
                "items": items,
            }))
        }
        Command::History { identifier } => {
            let history = orchestrator.history(identifier.as_deref()).await?;
            Ok(serde_json::to_value(history)?)
        }
        Command::Stats => Ok(serde_json::to_value(orchestrator.stats().await?)?),
        Command::Forget { identifier } => {
            let deleted = orchestrator.forget(&identifier).await?;
            Ok(json!({ "identifier": identifier, "deleted": deleted }))
        }
    }
}

async fn read_bulk_file(path: &Path, default_country: Option<&str>) -> anyhow::Result<Vec<BulkRequest>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading bulk file {}", path.display()))?;
    parse_bulk_file(&contents, default_country)
}

/// Parse `phone,country` lines into bulk requests.
///
/// Blank lines and lines starting with `#` are skipped. A line without a
/// comma takes `default_country`; if none was given the line is an error.
pub fn parse_bulk_file(contents: &str, default_country: Option<&str>) -> anyhow::Result<Vec<BulkRequest>> {
    let mut requests = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request = match line.split_once(',') {
            Some((phone, country)) => BulkRequest::new(phone.trim(), country.trim()),
            None => {
                let country = default_country.with_context(|| {
                    format!("line {}: no country code and no --country given", number + 1)
                })?;
                BulkRequest::new(line, country)
            }
        };
        requests.push(request);
    }

    Ok(requests)
}
