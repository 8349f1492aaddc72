#![forbid(unsafe_code)]

use std::io::Cursor;

use adradar_engines::defaults::default_accessors;
use adradar_tools::replay_cli::{execute_replay, load_accessors};
use serde_json::Value;

fn replay(lines: &[&str]) -> Vec<Value> {
    let input = lines.join("\n");
    execute_replay(default_accessors(), Cursor::new(input))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn at_replay_01_emits_one_line_per_event_plus_summary() {
    let out = replay(&[
        r#"{"content":"slot","lib":"googletag","slot":{"id":"div-1","unitCode":"/1/top"}}"#,
        "",
        r#"{"content":"bid","lib":"pbjs","time":100,"bid":{"adUnitCode":"div-1","bidder":"ix","cpm":0.5,"currency":"USD","won":false}}"#,
        r#"{"content":"bid","lib":"pbjs","time":200,"bid":{"adUnitCode":"div-1","bidder":"ix","cpm":0.75,"currency":"USD","won":true},"hostname":"news.example"}"#,
    ]);
    assert_eq!(out.len(), 4);
    assert_eq!(out[0]["line"], 1);
    assert_eq!(out[0]["displays"][0]["kind"], "no_information");
    assert_eq!(out[1]["line"], 3);
    assert_eq!(out[1]["displays"][0]["text"], "CPM of at least 0.500 USD");
    assert_eq!(out[2]["outcome"], "ingested");
    assert_eq!(out[2]["wonBidId"], 1);
    assert_eq!(out[2]["displays"][0]["id"], "div-1");
    assert_eq!(out[2]["displays"][0]["text"], "CPM of 0.750 USD paid via ix");
    assert_eq!(out[3]["wonBids"].as_array().map(Vec::len), Some(1));
    assert_eq!(out[3]["wonBids"][0]["hostname"], "news.example");
    assert_eq!(out[3]["wonBids"][0]["original"]["cpm"], 0.75);
}

#[test]
fn at_replay_02_dropped_events_carry_reason() {
    let out = replay(&[
        r#"{"content":"bid","lib":"yieldbird","time":1,"bid":{}}"#,
    ]);
    assert_eq!(out[0]["outcome"], "dropped");
    assert_eq!(out[0]["reason"], "no accessors configured for library yieldbird");
    assert_eq!(out[1]["wonBids"], Value::Array(Vec::new()));
}

#[test]
fn at_replay_03_undecodable_line_aborts_with_line_number() {
    let err = execute_replay(
        default_accessors(),
        Cursor::new("{\"content\":\"slot\",\"slot\":{\"id\":\"a\",\"unitCode\":\"b\"}}\nnot json"),
    )
    .unwrap_err();
    assert!(err.starts_with("line 2:"), "{err}");
}

#[test]
fn at_replay_04_missing_accessors_file_is_an_error() {
    let path = std::env::temp_dir().join("adradar_missing_accessors_for_test.json");
    let err = load_accessors(Some(&path)).unwrap_err();
    assert!(err.starts_with("failed to read"), "{err}");
    assert_eq!(load_accessors(None).unwrap(), default_accessors());
}
