#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use adradar_contracts::accessor::AccessorsConfig;
use adradar_contracts::event::PageEvent;
use adradar_engines::accessor_engine::AccessorEngine;
use adradar_engines::defaults::default_accessors;
use adradar_engines::functions::FunctionRegistry;
use adradar_engines::schema::parse_accessors_json;
use adradar_os::page_session::{EventOutcome, PageSession, PageSessionConfig, PageUpdate};
use adradar_storage::ledger::InMemoryWonBidLedger;
use adradar_storage::repo::WonBidRepo;
use serde_json::{json, Value};

pub const ACCESSORS_PATH_ENV: &str = "ADRADAR_ACCESSORS_PATH";

/// An explicit `--accessors` path wins over the environment.
pub fn resolve_accessors_path(cli: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    cli.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

pub fn execute_validate(text: &str) -> Result<String, String> {
    let config = parse_accessors_json(text, &FunctionRegistry::standard_v1())
        .map_err(|report| report.to_string())?;
    let libs: Vec<&str> = config.libs().collect();
    Ok(format!("OK ({})", libs.join(", ")))
}

pub fn execute_defaults() -> Result<String, String> {
    serde_json::to_string_pretty(&default_accessors().to_json()).map_err(|e| e.to_string())
}

pub fn load_accessors(path: Option<&Path>) -> Result<AccessorsConfig, String> {
    let Some(path) = path else {
        return Ok(default_accessors());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    parse_accessors_json(&text, &FunctionRegistry::standard_v1())
        .map_err(|report| format!("invalid accessors in {}: {report}", path.display()))
}

/// Feeds newline-delimited page events through a fresh session.
///
/// Emits one JSON line per event, then a final line listing the won bids.
/// Blank lines are skipped; an undecodable line aborts the replay.
pub fn execute_replay<R: BufRead>(accessors: AccessorsConfig, events: R) -> Result<String, String> {
    let mut session = PageSession::new(
        PageSessionConfig::mvp_v1(),
        AccessorEngine::default(),
        accessors,
        InMemoryWonBidLedger::new_in_memory(),
    );

    let mut out = Vec::new();
    for (idx, line) in events.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| format!("line {line_no}: {e}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: PageEvent =
            serde_json::from_str(&line).map_err(|e| format!("line {line_no}: {e}"))?;
        let update = session.handle(&event);
        out.push(render_update(line_no, &update)?.to_string());
    }

    let rows = serde_json::to_value(session.repo().won_bid_rows()).map_err(|e| e.to_string())?;
    out.push(json!({ "wonBids": rows }).to_string());
    Ok(out.join("\n"))
}

fn render_update(line_no: usize, update: &PageUpdate) -> Result<Value, String> {
    let displays = update
        .displays
        .iter()
        .map(|(id, display)| {
            let mut rendered = serde_json::to_value(display).map_err(|e| e.to_string())?;
            rendered["id"] = Value::from(id.as_str());
            Ok(rendered)
        })
        .collect::<Result<Vec<_>, String>>()?;

    let mut rendered = json!({
        "line": line_no,
        "numberOfAds": update.number_of_ads,
        "displays": displays,
    });
    match &update.outcome {
        EventOutcome::Ingested => rendered["outcome"] = Value::from("ingested"),
        EventOutcome::Dropped(reason) => {
            rendered["outcome"] = Value::from("dropped");
            rendered["reason"] = Value::from(reason.to_string());
        }
    }
    if let Some(id) = update.won_bid_id {
        rendered["wonBidId"] = Value::from(id.0);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_cli_01_cli_path_wins_over_env() {
        assert_eq!(
            resolve_accessors_path(Some("a.json".into()), Some("b.json".into())),
            Some(PathBuf::from("a.json"))
        );
        assert_eq!(
            resolve_accessors_path(None, Some("b.json".into())),
            Some(PathBuf::from("b.json"))
        );
        assert_eq!(resolve_accessors_path(None, Some(OsString::new())), None);
        assert_eq!(resolve_accessors_path(None, None), None);
    }

    #[test]
    fn at_cli_02_defaults_output_validates() {
        let text = execute_defaults().unwrap();
        assert_eq!(execute_validate(&text).unwrap(), "OK (pbjs, googletag, apstag)");
    }

    #[test]
    fn at_cli_03_validate_reports_violations() {
        let err = execute_validate(r#"{"accessors": {"pbjs": {}}}"#).unwrap_err();
        assert!(err.contains("pbjs"), "{err}");
    }
}
