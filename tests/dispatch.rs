use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use snaphound::{EngineOptions, MemorySink, SearchEvent, SnapHound};
use snaphound_search::cli::EngineArgs;
use snaphound_search::dispatch::{DispatchError, Invocation, SEARCH_QUERY, TextSearch, dispatch};
use tempfile::tempdir;

#[derive(Default)]
struct Calls {
    constructed: Vec<(Vec<String>, Vec<String>)>,
    queries: Vec<String>,
}

struct RecordingEngine {
    calls: Arc<Mutex<Calls>>,
}

impl TextSearch for RecordingEngine {
    type Output = usize;

    async fn search_with_text(&mut self, query: &str) -> anyhow::Result<usize> {
        let mut calls = self.calls.lock().expect("calls lock");
        calls.queries.push(query.to_string());
        Ok(calls.queries.len())
    }
}

async fn run(
    priority: Option<&str>,
    paths: Option<&str>,
) -> (Result<usize, DispatchError>, Arc<Mutex<Calls>>) {
    let calls = Arc::new(Mutex::new(Calls::default()));
    let recorder = calls.clone();
    let outcome = dispatch(priority, paths, move |paths, priority_paths| {
        recorder
            .lock()
            .expect("calls lock")
            .constructed
            .push((paths, priority_paths));
        Ok(RecordingEngine { calls: recorder })
    })
    .await;
    (outcome, calls)
}

#[tokio::test]
async fn missing_arguments_never_build_the_engine() {
    for (priority, paths) in [(None, None), (Some(r#"["/a"]"#), None), (None, Some(r#"["/c"]"#))] {
        let (outcome, calls) = run(priority, paths).await;
        assert!(matches!(outcome, Err(DispatchError::MissingArguments)));
        let calls = calls.lock().expect("calls lock");
        assert!(calls.constructed.is_empty());
        assert!(calls.queries.is_empty());
    }
}

#[tokio::test]
async fn two_empty_lists_take_the_usage_path() {
    let (outcome, calls) = run(Some("[]"), Some("[]")).await;
    assert!(matches!(outcome, Err(DispatchError::MissingArguments)));
    assert!(calls.lock().expect("calls lock").constructed.is_empty());
}

#[tokio::test]
async fn valid_arrays_build_once_and_search_the_fixed_query() {
    let (outcome, calls) = run(Some(r#"["/a","/b"]"#), Some(r#"["/c"]"#)).await;
    assert_eq!(outcome.expect("dispatch should succeed"), 1);

    let calls = calls.lock().expect("calls lock");
    assert_eq!(
        calls.constructed,
        vec![(
            vec!["/c".to_string()],
            vec!["/a".to_string(), "/b".to_string()]
        )]
    );
    assert_eq!(calls.queries, vec![SEARCH_QUERY.to_string()]);
    assert_eq!(SEARCH_QUERY, "The END");
}

#[tokio::test]
async fn one_empty_list_is_still_searched() {
    let (outcome, calls) = run(Some("[]"), Some(r#"["/c"]"#)).await;
    assert!(outcome.is_ok());
    assert_eq!(calls.lock().expect("calls lock").queries.len(), 1);
}

#[tokio::test]
async fn malformed_json_stops_before_the_search() {
    let (outcome, calls) = run(Some("not-json"), Some(r#"["/c"]"#)).await;
    match outcome {
        Err(DispatchError::MalformedInput { position, name, .. }) => {
            assert_eq!(position, 1);
            assert_eq!(name, "priority_paths");
        }
        other => panic!("expected malformed input, got {other:?}"),
    }
    let calls = calls.lock().expect("calls lock");
    assert!(calls.constructed.is_empty());
    assert!(calls.queries.is_empty());
}

#[tokio::test]
async fn json_that_is_not_a_string_array_is_malformed() {
    let (outcome, _calls) = run(Some(r#"["/a"]"#), Some(r#"{"paths": ["/c"]}"#)).await;
    assert!(matches!(
        outcome,
        Err(DispatchError::MalformedInput { position: 2, .. })
    ));

    let (outcome, _calls) = run(Some("[1, 2]"), Some(r#"["/c"]"#)).await;
    assert!(matches!(
        outcome,
        Err(DispatchError::MalformedInput { position: 1, .. })
    ));
}

#[tokio::test]
async fn engine_errors_propagate() {
    let outcome = dispatch::<RecordingEngine, _>(Some(r#"["/a"]"#), Some("[]"), |_, _| {
        anyhow::bail!("engine unavailable")
    })
    .await;
    match outcome {
        Err(DispatchError::Engine(err)) => assert_eq!(err.to_string(), "engine unavailable"),
        other => panic!("expected engine error, got {other:?}"),
    }
}

#[test]
fn invocation_keeps_argument_order() {
    let invocation = Invocation::decode(Some(r#"["/p1", "/p2"]"#), Some(r#"["/g"]"#))
        .expect("valid arguments");
    assert_eq!(invocation.priority_paths, vec!["/p1", "/p2"]);
    assert_eq!(invocation.paths, vec!["/g"]);
}

#[tokio::test]
async fn dispatches_into_the_real_engine() {
    let cache = tempdir().expect("failed to create tempdir");
    let library = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/library");
    let priority = serde_json::to_string(&[library.join("priority")]).expect("encode priority");
    let paths = serde_json::to_string(&[library.join("general")]).expect("encode paths");

    let sink = MemorySink::new();
    let engine_sink = sink.clone();
    let summary = dispatch(Some(&priority), Some(&paths), |paths, priority_paths| {
        let options = EngineOptions {
            cache_dir: Some(cache.path().to_path_buf()),
            ..EngineOptions::default()
        };
        SnapHound::with_options(paths, priority_paths, options, engine_sink)
    })
    .await
    .expect("search should succeed");

    assert_eq!(summary.query, "The END");
    assert_eq!(summary.matched, 4);
    assert!(summary.hits[0].file_path.ends_with("priority/the_end.png"));
    assert!(matches!(
        sink.events().first(),
        Some(SearchEvent::Status { message }) if message == "Searching for The END"
    ));
}

#[test]
fn cli_flags_override_engine_defaults() {
    let dir = tempdir().expect("failed to create tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{ "max_results": 5, "recursive": false }"#).expect("write config");

    let args = EngineArgs {
        config: Some(config),
        recursive: true,
        chunk_size: Some(2),
        ..EngineArgs::default()
    };
    let options = args.to_options().expect("options should resolve");
    assert!(options.recursive);
    assert_eq!(options.max_results, 5);
    assert_eq!(options.chunk_size, 2);
    assert_eq!(options.concurrency, EngineOptions::default().concurrency);
}
