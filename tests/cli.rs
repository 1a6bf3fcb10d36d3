use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use clap::Parser;
use snaphound::{EngineOptions, MemorySink, SnapHound};
use snaphound_search::cli::Cli;
use snaphound_search::dispatch::{EXIT_CANCELLED, USAGE, dispatch, exit_code};
use tempfile::tempdir;

fn library() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/library")
}

/// Run the binary with its temp dir, and so its default config and cache,
/// pointed at `scratch`.
fn run_binary(scratch: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snaphound-search"))
        .args(args)
        .env("TMPDIR", scratch)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run snaphound-search")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn short_argument_lists_print_usage_and_exit_one() {
    let scratch = tempdir().expect("failed to create tempdir");
    let cases: [&[&str]; 3] = [&[], &[r#"["/a"]"#], &["[]", "[]"]];
    for args in cases {
        let output = run_binary(scratch.path(), args);
        assert_eq!(output.status.code(), Some(1), "args: {args:?}");
        assert_eq!(stdout_lines(&output), vec![USAGE.to_string()], "args: {args:?}");
    }
}

#[test]
fn malformed_json_exits_non_zero_without_searching() {
    let scratch = tempdir().expect("failed to create tempdir");
    let output = run_binary(scratch.path(), &["not-json", r#"["/c"]"#]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "no events expected before the search");
    assert!(String::from_utf8_lossy(&output.stderr).contains("priority_paths"));
}

#[test]
fn valid_arrays_stream_events_and_ignore_extra_arguments() {
    let scratch = tempdir().expect("failed to create tempdir");
    let priority = serde_json::to_string(&[library().join("priority")]).expect("encode priority");
    let paths = serde_json::to_string(&[library().join("general")]).expect("encode paths");

    let output = run_binary(scratch.path(), &[&priority, &paths, "ignored", "also-ignored"]);

    assert_eq!(output.status.code(), Some(0));
    let events: Vec<serde_json::Value> = stdout_lines(&output)
        .iter()
        .map(|line| serde_json::from_str(line).expect("each stdout line is a json event"))
        .collect();
    assert_eq!(events[0]["event"], "status");
    assert_eq!(events[0]["message"], "Searching for The END");
    let last = events.last().expect("at least one event");
    assert_eq!(last["event"], "completed");
    assert_eq!(last["matched"], 4);
}

#[test]
fn extra_positionals_parse() {
    let cli = Cli::try_parse_from(["snaphound-search", r#"["/a"]"#, r#"["/c"]"#, "extra"])
        .expect("extra arguments are accepted");
    assert_eq!(cli.priority_paths_json.as_deref(), Some(r#"["/a"]"#));
    assert_eq!(cli.paths_json.as_deref(), Some(r#"["/c"]"#));
    assert_eq!(cli.extra, vec!["extra"]);
}

#[tokio::test]
async fn interrupted_search_maps_to_exit_130() {
    let cache = tempdir().expect("failed to create tempdir");
    let priority = serde_json::to_string(&[library().join("priority")]).expect("encode priority");

    let summary = dispatch(Some(&priority), Some("[]"), |paths, priority_paths| {
        let options = EngineOptions {
            cache_dir: Some(cache.path().to_path_buf()),
            ..EngineOptions::default()
        };
        let engine = SnapHound::with_options(paths, priority_paths, options, MemorySink::new())?;
        engine.cancel_handle().cancel();
        Ok(engine)
    })
    .await
    .expect("search should succeed");

    assert!(summary.cancelled);
    assert_eq!(exit_code(&summary), EXIT_CANCELLED);
    assert_eq!(EXIT_CANCELLED, 130);
}
