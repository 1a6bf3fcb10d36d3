use std::path::PathBuf;

use snaphound::{ConfigFile, EngineOptions, FileKind, JsonLinesSink, ResultFile, SearchEvent};
use snaphound::events::EventSink;
use tempfile::tempdir;

#[test]
fn config_file_overrides_defaults_and_ignores_unknown_keys() {
    let dir = tempdir().expect("failed to create tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "priority_path": ["~/Pictures"], "recursive": true, "chunk_size": 25 }"#,
    )
    .expect("write config");

    let file = ConfigFile::load(&path).expect("config should parse");
    let options = EngineOptions::default().merge_file(&file);
    assert!(options.recursive);
    assert_eq!(options.chunk_size, 25);
    assert_eq!(options.max_results, 50);
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempdir().expect("failed to create tempdir");
    let err = ConfigFile::discover(Some(dir.path().join("missing.json").as_path()))
        .expect_err("missing explicit config is an error");
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn events_are_written_as_json_lines() {
    let mut sink = JsonLinesSink::new(Vec::new());
    sink.emit(&SearchEvent::status("Searching for The END"))
        .expect("emit status");
    sink.emit(&SearchEvent::Results {
        files: vec![ResultFile {
            id: 1,
            file_path: PathBuf::from("/media/the_end.png"),
            kind: FileKind::Image,
            score: 1.25,
            origin: "name".to_string(),
            line: None,
            snippet: None,
        }],
    })
    .expect("emit results");

    let output = String::from_utf8(sink.into_inner()).expect("utf-8 output");
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "status");
    assert_eq!(lines[0]["message"], "Searching for The END");
    assert_eq!(lines[1]["event"], "results");
    assert_eq!(lines[1]["files"][0]["type"], "image");
    assert_eq!(lines[1]["files"][0]["file_path"], "/media/the_end.png");
    assert!(lines[1]["files"][0].get("line").is_none());
}
