//! End-to-end hook dispatch tests

use reefgate_core::{Bytes, MemoryOpsLog, MemoryStore, OpsLogSink, RequestState, StorageBackend};
use reefgate_scripting::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{span, Event, Level, Metadata};

struct Harness {
    dispatcher: HookDispatcher,
    opslog: Arc<MemoryOpsLog>,
    store: Arc<MemoryStore>,
}

fn harness(point: ExecutionPoint, code: &str) -> Harness {
    let opslog = Arc::new(MemoryOpsLog::new());
    let store = Arc::new(MemoryStore::new());
    let resolver = StaticResolver::new().bind(point, ScriptSource::inline(code));
    let dispatcher = HookDispatcher::new(
        Arc::new(resolver),
        store.clone() as Arc<dyn StorageBackend>,
        opslog.clone() as Arc<dyn OpsLogSink>,
    );
    Harness {
        dispatcher,
        opslog,
        store,
    }
}

#[tokio::test]
async fn abort_short_circuits_and_keeps_prior_headers() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            set_response_header("x-denied-by", "policy");
            abort(403);
            set_response_header("x-after", "never");
        "#,
    );
    let mut state = RequestState::new("GET", "/photos/cat.jpg").with_bucket("photos");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    assert_eq!(status, 403);
    let resp = state.response.as_ref().unwrap();
    assert_eq!(resp.headers.get("x-denied-by").unwrap(), "policy");
    assert!(!resp.headers.contains_key("x-after"));
}

#[tokio::test]
async fn abort_503_short_circuits_before_storage() {
    let h = harness(ExecutionPoint::PreRequest, "abort(503);");
    let mut state = RequestState::new("GET", "/photos/cat.jpg")
        .with_bucket("photos")
        .with_object("cat.jpg");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    // Nonzero tells the pipeline to short-circuit: the downstream storage
    // operation for this request never runs.
    assert_eq!(status, 503);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn runaway_script_fails_open_within_budget() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            set_response_header("x-late", "1");
            loop { }
        "#,
    );
    let dispatcher = h.dispatcher.with_budget(ExecutionBudget::new(50, u64::MAX));
    let mut state = RequestState::new("GET", "/");

    let start = Instant::now();
    let status = dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    assert_eq!(status, 0);
    assert!(start.elapsed() < Duration::from_secs(2));
    // TimedOut discards every mutation from the invocation
    assert!(state.response.is_none());
    assert!(state.scratch.is_empty());
}

/// Counts error-level tracing events emitted on the current thread
#[derive(Debug)]
struct ErrorLogCounter(Arc<AtomicUsize>);

impl tracing::Subscriber for ErrorLogCounter {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _attrs: &span::Attributes<'_>) -> span::Id {
        span::Id::from_u64(1)
    }

    fn record(&self, _id: &span::Id, _values: &span::Record<'_>) {}

    fn record_follows_from(&self, _id: &span::Id, _follows: &span::Id) {}

    fn event(&self, event: &Event<'_>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn enter(&self, _id: &span::Id) {}

    fn exit(&self, _id: &span::Id) {}
}

#[tokio::test]
async fn malformed_script_fails_open_with_one_error_log() {
    let h = harness(ExecutionPoint::PreRequest, "let x = ;");
    let mut state = RequestState::new("GET", "/");

    let errors = Arc::new(AtomicUsize::new(0));
    let guard = tracing::subscriber::set_default(ErrorLogCounter(errors.clone()));
    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;
    drop(guard);

    assert_eq!(status, 0);
    assert!(state.response.is_none());
    assert!(h.opslog.is_empty());
    // one error-level log entry for the malformed script, exactly once
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_range_status_fails_open() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            set_response_header("x-early", "1");
            set_status(950);
        "#,
    );
    let mut state = RequestState::new("GET", "/");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    assert_eq!(status, 0);
    assert!(state.response.is_none());
}

#[tokio::test]
async fn abort_with_out_of_range_code_fails_open() {
    let h = harness(ExecutionPoint::PreRequest, "abort(950);");
    let mut state = RequestState::new("GET", "/");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    // an invalid abort code never short-circuits the request
    assert_eq!(status, 0);
    assert!(state.response.is_none());
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            scratch["who"] = read_header("x-who");
            set_response_header("x-seen", read_header("x-who"));
        "#,
    );
    let dispatcher = Arc::new(h.dispatcher);

    let mut tasks = Vec::new();
    for who in ["alice", "bob", "carol", "dave"] {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            let mut state = RequestState::new("GET", "/").with_header("x-who", who);
            let status = dispatcher
                .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
                .await;
            (who, status, state)
        }));
    }

    for task in tasks {
        let (who, status, state) = task.await.unwrap();
        assert_eq!(status, 0);
        assert_eq!(state.scratch.get("who").unwrap(), who);
        assert_eq!(
            state.response.as_ref().unwrap().headers.get("x-seen").unwrap(),
            who
        );
    }
}

#[tokio::test]
async fn run_hook_is_idempotent_without_side_effects() {
    let code = r#"
        if method == "GET" {
            scratch["verdict"] = "allowed";
        }
    "#;
    let h = harness(ExecutionPoint::PreRequest, code);
    let template = RequestState::new("GET", "/photos/cat.jpg").with_bucket("photos");

    let mut first = template.clone();
    let mut second = template.clone();
    let a = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut first)
        .await;
    let b = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut second)
        .await;

    assert_eq!(a, b);
    assert_eq!(first.scratch, second.scratch);
}

#[tokio::test]
async fn status_change_and_audit_entry_without_abort() {
    let h = harness(
        ExecutionPoint::PostRequest,
        r#"
            set_status(403);
            log("audit", "blocked");
        "#,
    );
    let mut state = RequestState::new("GET", "/photos/cat.jpg").with_bucket("photos");
    state.begin_response();

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PostRequest, "get_obj", &mut state)
        .await;

    // no abort: the request continues normally
    assert_eq!(status, 0);
    // but the committed status change is visible in the final response
    assert_eq!(state.response.as_ref().unwrap().status, 403);
    // and exactly one audit entry was recorded
    let entries = h.opslog.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, "audit");
    assert_eq!(entries[0].message, "blocked");
    assert_eq!(entries[0].operation, "get_obj");
    assert_eq!(entries[0].request_id, state.request_id);
}

#[tokio::test]
async fn storage_lookup_feeds_policy_decision() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            let denylist = storage_get("config", "denylist.txt");
            if denylist.len() > 0 {
                abort(451);
            }
        "#,
    );
    h.store
        .put_object("config", "denylist.txt", Bytes::from_static(b"blocked-bucket"));
    let mut state = RequestState::new("GET", "/");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;
    assert_eq!(status, 451);
}

#[tokio::test]
async fn scratch_flows_from_pre_to_post_hook() {
    let opslog = Arc::new(MemoryOpsLog::new());
    let store = Arc::new(MemoryStore::new());
    let resolver = StaticResolver::new()
        .bind(
            ExecutionPoint::PreRequest,
            ScriptSource::inline(r#"scratch["started"] = "yes";"#),
        )
        .bind(
            ExecutionPoint::PostRequest,
            ScriptSource::inline(
                r#"
                    if scratch["started"] == "yes" {
                        set_response_header("x-hooked", "both");
                    }
                "#,
            ),
        );
    let dispatcher = HookDispatcher::new(
        Arc::new(resolver),
        store as Arc<dyn StorageBackend>,
        opslog as Arc<dyn OpsLogSink>,
    );

    let mut state = RequestState::new("PUT", "/photos/cat.jpg").with_bucket("photos");
    assert_eq!(
        dispatcher
            .run_hook(ExecutionPoint::PreRequest, "put_obj", &mut state)
            .await,
        0
    );
    state.begin_response();
    assert_eq!(
        dispatcher
            .run_hook(ExecutionPoint::PostRequest, "put_obj", &mut state)
            .await,
        0
    );

    assert_eq!(
        state.response.as_ref().unwrap().headers.get("x-hooked").unwrap(),
        "both"
    );
}

#[tokio::test]
async fn uncaught_capability_misuse_fails_open_and_discards() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"
            set_response_header("x-early", "1");
            set_status(9999);
        "#,
    );
    let mut state = RequestState::new("GET", "/");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    assert_eq!(status, 0);
    // Failed outcomes never commit, even mutations made before the error
    assert!(state.response.is_none());
}

#[tokio::test]
async fn background_hook_runs_without_response_state() {
    let h = harness(
        ExecutionPoint::Background,
        r#"
            log("info", "housekeeping ran for " + bucket);
            scratch["last_run"] = "done";
        "#,
    );
    let mut state = RequestState::new("NONE", "-").with_bucket("photos");

    let status = h
        .dispatcher
        .run_hook(ExecutionPoint::Background, "background", &mut state)
        .await;

    assert_eq!(status, 0);
    assert_eq!(state.scratch.get("last_run").unwrap(), "done");
    assert_eq!(h.opslog.len(), 1);
}

#[tokio::test]
async fn scratch_values_survive_commit_into_state() {
    let h = harness(
        ExecutionPoint::PreRequest,
        r#"scratch["k"] = "v";"#,
    );
    let mut state = RequestState::new("GET", "/");
    state
        .scratch
        .insert("preexisting".to_string(), "kept".to_string());

    h.dispatcher
        .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
        .await;

    assert_eq!(
        state.scratch,
        HashMap::from([
            ("preexisting".to_string(), "kept".to_string()),
            ("k".to_string(), "v".to_string()),
        ])
    );
}
