use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pepper_core::load_plan;
use pepper_exec::executor::{
    Event, EventSink, HttpError, HttpRequestParts, HttpResponseParts, LeafStage, LeafStatus,
};
use pepper_exec::{Globals, HttpClient, RunReport, Runner, RunnerConfig, ScriptEngine};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MockHttpClient {
    responses: BTreeMap<String, Result<(u16, String), HttpError>>,
    delay: Option<Duration>,
    sent: Mutex<Vec<HttpRequestParts>>,
}

impl MockHttpClient {
    fn respond(mut self, path: &str, status: u16, body: &str) -> Self {
        self.responses.insert(path.to_string(), Ok((status, body.to_string())));
        self
    }

    fn fail(mut self, path: &str, err: HttpError) -> Self {
        self.responses.insert(path.to_string(), Err(err));
        self
    }

    fn sent(&self) -> Vec<HttpRequestParts> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(
        &self,
        req: HttpRequestParts,
        _timeout: Duration,
        _max_response_bytes: usize,
    ) -> Result<HttpResponseParts, HttpError> {
        let path = req.url.path().to_string();
        self.sent.lock().unwrap().push(req);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(&path) {
            Some(Ok((status, body))) => Ok(HttpResponseParts {
                status: *status,
                headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
                body: body.as_bytes().to_vec(),
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(HttpResponseParts {
                status: 404,
                ..Default::default()
            }),
        }
    }
}

#[derive(Default)]
struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(Event::type_name).collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    http: Arc<MockHttpClient>,
    events: Arc<MemoryEventSink>,
    globals: Globals,
    config: RunnerConfig,
}

impl Harness {
    fn new(http: MockHttpClient) -> Self {
        Self {
            http: Arc::new(http),
            events: Arc::new(MemoryEventSink::default()),
            globals: Globals::default(),
            config: RunnerConfig::default(),
        }
    }

    async fn run(&self, src: &str) -> RunReport {
        self.run_with(src, &CancellationToken::new()).await
    }

    async fn run_with(&self, src: &str, cancel: &CancellationToken) -> RunReport {
        let (doc, plan) = load_plan(src.as_bytes()).unwrap();
        let runner = Runner::new(
            self.config.clone(),
            self.http.clone(),
            Arc::new(ScriptEngine),
            self.events.clone(),
        );
        runner.run(&doc, &plan, &self.globals, cancel).await.unwrap()
    }
}

fn names(report: &RunReport) -> Vec<&str> {
    report.records.iter().map(|r| r.name.as_str()).collect()
}

const LOGIN_DOC: &str = r#"
(
  after{ globals["base"] = "https://api.test" }
)
login(
  mandatory{}
  do{POST ${base}/login}
  headers{Content-Type: application/json}
  body{{"user":"pepper"}}
  after{
    assert response.status == 200
    globals["token"] = response.json.token
  }
)
getUser(
  depends_on{login}
  do{GET ${base}/user?token=${token}}
)
"#;

#[tokio::test]
async fn login_token_flows_into_dependent_request() {
    let h = Harness::new(
        MockHttpClient::default()
            .respond("/login", 200, r#"{"token":"abc"}"#)
            .respond("/user", 200, r#"{"id":1}"#),
    );
    let report = h.run(LOGIN_DOC).await;

    assert_eq!(names(&report), vec!["global", "login", "getUser"]);
    assert!(report.is_success(), "{report:?}");
    assert!(report.records[0].implicit);
    assert!(report.records[1].mandatory);
    assert_eq!(report.records[1].http_status, Some(200));

    let sent = h.http.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].method, "POST");
    assert_eq!(sent[0].url.as_str(), "https://api.test/login");
    assert_eq!(sent[0].headers["Content-Type"], "application/json");
    assert_eq!(sent[0].body, br#"{"user":"pepper"}"#);
    assert_eq!(sent[1].url.as_str(), "https://api.test/user?token=abc");

    assert_eq!(h.globals.get("token").await, Some(json!("abc")));
}

#[tokio::test]
async fn events_follow_the_run() {
    let h = Harness::new(
        MockHttpClient::default()
            .respond("/login", 200, r#"{"token":"abc"}"#)
            .respond("/user", 200, "{}"),
    );
    h.run(LOGIN_DOC).await;

    assert_eq!(
        h.events.types(),
        vec![
            "run.started",
            "leaf.started",
            "leaf.passed",
            "leaf.started",
            "leaf.passed",
            "leaf.started",
            "leaf.passed",
            "run.finished",
        ]
    );
    let events = h.events.events.lock().unwrap();
    assert!(matches!(&events[1], Event::LeafStarted { leaf, implicit: true, .. } if leaf == "global"));
    assert!(matches!(&events[3], Event::LeafStarted { implicit: false, .. }));
    assert!(matches!(events.last(), Some(Event::RunFinished { passed: 3, failed: 0, not_run: 0, .. })));
}

#[tokio::test]
async fn mandatory_failure_aborts_the_run() {
    let h = Harness::new(MockHttpClient::default().respond("/fail", 500, "{}"));
    let report = h
        .run(
            "A(mandatory{} do{GET https://api.test/fail} after{assert response.status == 200})\n\
             B(do{GET https://api.test/b})\n\
             C(do{GET https://api.test/c})",
        )
        .await;

    assert_eq!(names(&report), vec!["A"]);
    assert_eq!(report.aborted_by.as_deref(), Some("A"));
    assert_eq!(report.not_run, vec!["B", "C"]);
    assert_eq!(h.http.sent().len(), 1);

    let a = &report.records[0];
    assert_eq!(a.status, LeafStatus::Fail);
    assert_eq!(a.stage, LeafStage::PostHook);
    assert_eq!(a.http_status, Some(500));
    let err = a.error.as_ref().unwrap();
    assert_eq!(err.kind, "assertion");
    assert_eq!(err.message, "assertion failed: response.status == 200");

    assert!(h.events.types().contains(&"run.aborted"));
}

#[tokio::test]
async fn non_mandatory_failure_continues_with_globals_set_before_it() {
    let h = Harness::new(MockHttpClient::default().respond("/b", 200, "{}"));
    let report = h
        .run(
            "A(after{ globals.seen = \"yes\"; fail \"boom\" })\n\
             B(do{GET https://api.test/b?seen=${seen}})",
        )
        .await;

    assert_eq!(names(&report), vec!["A", "B"]);
    assert_eq!(report.records[0].status, LeafStatus::Fail);
    assert_eq!(report.records[0].error.as_ref().unwrap().message, "boom");
    assert_eq!(report.records[0].http_status, None);
    assert_eq!(report.records[1].status, LeafStatus::Pass);
    assert!(report.aborted_by.is_none());
    assert!(!report.is_success());
    assert_eq!(h.http.sent()[0].url.as_str(), "https://api.test/b?seen=yes");
}

#[tokio::test]
async fn missing_template_value_fails_before_dispatch() {
    let h = Harness::new(MockHttpClient::default());
    let report = h.run("a(do{GET https://api.test/${nope}})").await;

    let a = &report.records[0];
    assert_eq!(a.stage, LeafStage::TemplateExpand);
    assert_eq!(a.error.as_ref().unwrap().kind, "template");
    assert!(h.http.sent().is_empty());
}

#[tokio::test]
async fn pre_hook_failure_skips_dispatch() {
    let h = Harness::new(MockHttpClient::default());
    let report = h.run("a(before{ assert false, \"not ready\" } do{GET https://api.test/a})").await;

    let a = &report.records[0];
    assert_eq!(a.stage, LeafStage::PreHook);
    assert_eq!(a.error.as_ref().unwrap().message, "not ready");
    assert!(h.http.sent().is_empty());
}

#[tokio::test]
async fn pre_hook_shapes_the_request_and_locals_expand_first() {
    let h = Harness::new(MockHttpClient::default().respond("/items", 200, "[]"));
    h.globals.set("path", json!("ignored")).await;
    let report = h
        .run(
            "a(do{GET https://api.test/${path}}\n\
               before{\n  locals.path = \"items\"\n  request.headers[\"X-Trace\"] = \"t1\"\n})",
        )
        .await;

    assert!(report.is_success(), "{report:?}");
    let sent = h.http.sent();
    assert_eq!(sent[0].url.as_str(), "https://api.test/items");
    assert_eq!(sent[0].headers["X-Trace"], "t1");
}

#[tokio::test]
async fn hook_compile_error_fails_leaf_at_pre_hook() {
    let h = Harness::new(MockHttpClient::default());
    let report = h.run("a(after{ request.url = \"x\" })").await;

    let a = &report.records[0];
    assert_eq!(a.stage, LeafStage::PreHook);
    assert_eq!(a.error.as_ref().unwrap().kind, "hook_compile");
}

#[tokio::test]
async fn transport_and_finalize_failures_fail_at_dispatch() {
    let h = Harness::new(
        MockHttpClient::default().fail("/down", HttpError::Network("connection refused".into())),
    );
    let report = h
        .run("a(do{GET https://api.test/down})\nb(do{GET not-a-url})\nc(do{GET https://api.test/missing})")
        .await;

    for r in &report.records[..2] {
        assert_eq!(r.stage, LeafStage::Dispatch, "{}", r.name);
        assert_eq!(r.error.as_ref().unwrap().kind, "transport");
    }
    assert_eq!(h.http.sent().len(), 2);

    // No post-hook: an error status still passes.
    let c = &report.records[2];
    assert_eq!(c.status, LeafStatus::Pass);
    assert_eq!(c.http_status, Some(404));
}

#[tokio::test]
async fn leaf_without_request_or_hooks_passes() {
    let h = Harness::new(MockHttpClient::default());
    let report = h.run("noop()").await;
    assert_eq!(report.records[0].status, LeafStatus::Pass);
    assert_eq!(report.records[0].stage, LeafStage::Completed);
    assert_eq!(report.records[0].http_status, None);
}

#[tokio::test]
async fn cancelled_token_runs_nothing() {
    let h = Harness::new(MockHttpClient::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = h.run_with("a()\nb()", &cancel).await;

    assert!(report.records.is_empty());
    assert!(report.cancelled);
    assert_eq!(report.not_run, vec!["a", "b"]);
    assert!(h.events.types().contains(&"run.cancelled"));
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_dispatch() {
    let http = MockHttpClient {
        delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let h = Harness::new(http);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = h
        .run_with("slow(do{GET https://api.test/slow})\nnext(do{GET https://api.test/next})", &cancel)
        .await;

    assert!(report.cancelled);
    assert_eq!(names(&report), vec!["slow"]);
    assert_eq!(report.records[0].stage, LeafStage::Dispatch);
    assert_eq!(report.records[0].error.as_ref().unwrap().kind, "cancelled");
    assert_eq!(report.not_run, vec!["next"]);
}

#[tokio::test]
async fn hook_waiting_on_globals_times_out() {
    let mut h = Harness::new(MockHttpClient::default());
    h.config.hook_timeout = Duration::from_millis(50);

    let held = h.globals.clone();
    let guard = held.lock().await;
    let report = h.run("a(before{ locals.x = 1 })").await;
    drop(guard);

    let a = &report.records[0];
    assert_eq!(a.stage, LeafStage::PreHook);
    assert_eq!(a.error.as_ref().unwrap().kind, "hook_timeout");
}

#[tokio::test]
async fn template_expansion_waiting_on_globals_times_out() {
    let mut h = Harness::new(MockHttpClient::default().respond("/x", 200, "{}"));
    h.config.hook_timeout = Duration::from_millis(50);

    let held = h.globals.clone();
    let guard = held.lock().await;
    let report = h.run("a(do{GET https://api.test/x})").await;
    drop(guard);

    let a = &report.records[0];
    assert_eq!(a.stage, LeafStage::TemplateExpand);
    assert_eq!(a.error.as_ref().unwrap().kind, "globals_timeout");
    assert!(h.http.sent().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_template_expansion_waiting_on_globals() {
    let h = Harness::new(MockHttpClient::default().respond("/x", 200, "{}"));
    let held = h.globals.clone();
    let guard = held.lock().await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let report = h.run_with("a(do{GET https://api.test/x})", &cancel).await;
    drop(guard);

    assert!(report.cancelled);
    assert_eq!(report.records[0].stage, LeafStage::TemplateExpand);
    assert_eq!(report.records[0].error.as_ref().unwrap().kind, "cancelled");
}

#[tokio::test]
async fn unknown_leaf_in_plan_is_an_error() {
    let (doc, mut plan) = load_plan(b"a()").unwrap();
    plan.order.push("ghost".into());
    let runner = Runner::new(
        RunnerConfig::default(),
        Arc::new(MockHttpClient::default()),
        Arc::new(ScriptEngine),
        Arc::new(MemoryEventSink::default()),
    );
    let err = runner
        .run(&doc, &plan, &Globals::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}
