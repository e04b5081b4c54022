// Integration tests for `Gateway` using wiremock.
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashwire_api::gateway::{RequestContext, ResponseKind};
use dashwire_api::{
    ApiBase, Error, ErrorBody, Gateway, MemoryNavigator, Payload, Query, RequestBody,
    RequestOptions, ResponseInterceptor, SessionContext, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    gateway: Gateway,
    navigator: Arc<MemoryNavigator>,
    session: Arc<SessionContext>,
}

async fn setup() -> Harness {
    let server = MockServer::start().await;
    let navigator = Arc::new(MemoryNavigator::new("/dashboard"));
    let session = Arc::new(SessionContext::new(navigator.clone()));
    let origin = Url::parse(&server.uri()).unwrap();
    let gateway = Gateway::new(origin, None, &TransportConfig::default(), Arc::clone(&session))
        .unwrap();
    Harness {
        server,
        gateway,
        navigator,
        session,
    }
}

fn counting_handler(session: &SessionContext, delay: Duration) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    session.set_unauthorized_handler(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
        }
    });
    calls
}

struct Recorder {
    name: &'static str,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl ResponseInterceptor for Recorder {
    async fn intercept(&self, response: Response, _context: &RequestContext) -> Response {
        self.seen.lock().unwrap().push(self.name);
        response
    }
}

// ── URL building ────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_values_in_order() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .and(query_param("level", "warn"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "logs": [], "count": 0 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let query = Query::new()
        .set_all("level", [Some("warn"), None])
        .set("limit", 50)
        .set("cursor", None::<String>);
    let url = h.gateway.build_url("/logs/history", Some(&query)).unwrap();
    assert_eq!(url.query(), Some("level=warn&limit=50"));

    let body: Option<Value> = h
        .gateway
        .json("/logs/history", RequestOptions::get().query(query))
        .await
        .unwrap();
    assert_eq!(body.unwrap()["count"], 0);
}

#[tokio::test]
async fn test_absolute_api_base() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionContext::new(Arc::new(MemoryNavigator::default())));
    let base = ApiBase::parse(Some(&format!("{}/v2/api/", server.uri()))).unwrap();
    let gateway = Gateway::with_client(
        reqwest::Client::new(),
        Url::parse("http://unused.invalid").unwrap(),
        base,
        session,
    );

    Mock::given(method("GET"))
        .and(path("/v2/api/dashboard/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "memory_used": 1024,
            "memory_total": 4096,
            "memory_percent": 25.0,
            "start_time": 1_700_000_000,
        })))
        .mount(&server)
        .await;

    let resolved = gateway.resolve("/dashboard/stats").unwrap();
    assert_eq!(resolved, format!("{}/v2/api/dashboard/stats", server.uri()));
    assert_eq!(gateway.resolve(&resolved).unwrap(), resolved);

    let stats = gateway.dashboard_stats().await.unwrap();
    assert_eq!(stats.memory_total, 4096);
}

#[tokio::test]
async fn test_blank_endpoint_rejected() {
    let h = setup().await;
    let err = h.gateway.send("  ", RequestOptions::get()).await.unwrap_err();
    assert!(matches!(err, Error::EmptyEndpoint));
}

// ── Bodies and payloads ─────────────────────────────────────────────

#[tokio::test]
async fn test_json_body_sets_content_type() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "auth_key": "s3cret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Login successful",
            "session_id": "abc123",
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h
        .gateway
        .login(&SecretString::from("s3cret".to_owned()))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.session_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_caller_content_type_is_kept() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/import"))
        .and(header("content-type", "text/csv"))
        .and(body_string("a=1&b=x+y"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let options = RequestOptions::post()
        .header(CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .body(RequestBody::Form(vec![
            ("a".into(), "1".into()),
            ("b".into(), "x y".into()),
        ]));
    let payload = h.gateway.send("/import", options).await.unwrap();
    assert!(payload.is_empty());
}

#[tokio::test]
async fn test_form_body_default_content_type() {
    let h = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/form"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&h.server)
        .await;

    let options = RequestOptions::post()
        .body(RequestBody::Form(vec![("k".into(), "v".into())]))
        .response(ResponseKind::Text);
    let payload = h.gateway.send("/form", options).await.unwrap();
    assert_eq!(payload.into_text().as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_no_content_yields_nothing() {
    let h = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/thing"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let deleted: Option<Value> = h
        .gateway
        .json("/thing", RequestOptions::get().method(reqwest::Method::DELETE))
        .await
        .unwrap();
    assert!(deleted.is_none());

    let empty: Option<Value> = h.gateway.json("/empty", RequestOptions::get()).await.unwrap();
    assert!(empty.is_none());
}

#[tokio::test]
async fn test_raw_response_is_unread() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .mount(&h.server)
        .await;

    let payload = h
        .gateway
        .send("/raw", RequestOptions::get().response(ResponseKind::Raw))
        .await
        .unwrap();
    let Payload::Raw(response) = payload else {
        panic!("expected raw response");
    };
    assert_eq!(response.text().await.unwrap(), "payload");
}

#[tokio::test]
async fn test_invalid_json_is_a_deserialization_error() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .json::<Value>("/broken", RequestOptions::get())
        .await
        .unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization, got: {other:?}"),
    }
}

// ── Typed failures ──────────────────────────────────────────────────

#[tokio::test]
async fn test_error_payload_json() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "disk on fire" })),
        )
        .mount(&h.server)
        .await;

    let err = h.gateway.dashboard_stats().await.unwrap_err();
    let http = err.as_http().unwrap();
    assert_eq!(http.status.as_u16(), 500);
    assert_eq!(http.url.path(), "/api/dashboard/stats");
    assert_eq!(
        http.data,
        Some(ErrorBody::Json(json!({ "error": "disk on fire" })))
    );
    assert_eq!(
        err.to_string(),
        "HTTP 500 Internal Server Error: disk on fire"
    );
}

#[tokio::test]
async fn test_error_payload_text_and_empty() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/text"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bare"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let err = h.gateway.send("/text", RequestOptions::get()).await.unwrap_err();
    assert_eq!(
        err.as_http().unwrap().data,
        Some(ErrorBody::Text("no such thing".into()))
    );

    let err = h.gateway.send("/bare", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert!(err.as_http().unwrap().data.is_none());
}

#[tokio::test]
async fn test_transport_error_propagates() {
    let session = Arc::new(SessionContext::new(Arc::new(MemoryNavigator::default())));
    // Port 9 (discard) on localhost is not listening in test environments.
    let gateway = Gateway::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:9").unwrap(),
        ApiBase::default(),
        session,
    );
    let err = gateway.send("/x", RequestOptions::get()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

// ── 401 handling ────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_unauthorized_share_one_handler_run() {
    let h = setup().await;
    let calls = counting_handler(&h.session, Duration::from_millis(300));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Unauthorized" })))
        .mount(&h.server)
        .await;

    let (a, b) = tokio::join!(
        h.gateway.send("/dashboard/stats", RequestOptions::get()),
        h.gateway.send("/logs/history", RequestOptions::get()),
    );

    assert!(a.unwrap_err().is_unauthorized());
    assert!(b.unwrap_err().is_unauthorized());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.navigator.redirects(), vec!["/login?redirect=%2Fdashboard"]);

    // A later 401 starts a new episode; the redirect guard stays armed.
    h.gateway
        .send("/dashboard/stats", RequestOptions::get())
        .await
        .unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.navigator.redirects().len(), 1);
}

#[tokio::test]
async fn test_skip_unauthorized_handler() {
    let h = setup().await;
    let calls = counting_handler(&h.session, Duration::ZERO);

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Invalid authentication key",
        })))
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .login(&SecretString::from("wrong".to_owned()))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(
        err.as_http().unwrap().data.as_ref().and_then(ErrorBody::message),
        Some("Invalid authentication key")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(h.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_interceptors_run_in_order_and_can_be_removed() {
    let h = setup().await;
    let seen = Arc::new(Mutex::new(Vec::new()));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;

    let first = h.gateway.add_interceptor(Arc::new(Recorder {
        name: "first",
        seen: Arc::clone(&seen),
    }));
    h.gateway.add_interceptor(Arc::new(Recorder {
        name: "second",
        seen: Arc::clone(&seen),
    }));

    h.gateway.send("/a", RequestOptions::get()).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);

    assert!(h.gateway.remove_interceptor(first));
    assert!(!h.gateway.remove_interceptor(first));
    h.gateway.send("/a", RequestOptions::get()).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "second"]);
}

// ── Session endpoints ───────────────────────────────────────────────

#[tokio::test]
async fn test_session_cookie_is_sent() {
    let h = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .and(header("cookie", "session_id=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "memory_used": 1,
            "memory_total": 2,
            "memory_percent": 50.0,
            "start_time": 0,
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.gateway.set_session_cookie("abc123");
    let stats = h.gateway.dashboard_stats().await.unwrap();
    assert!((stats.memory_percent - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_validate_session_and_logout() {
    let h = setup().await;
    let calls = counting_handler(&h.session, Duration::ZERO);

    Mock::given(method("POST"))
        .and(path("/api/validate-session"))
        .and(body_json(json!({ "session_id": "abc123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    assert!(h.gateway.validate_session("abc123").await.unwrap());
    assert!(h.gateway.logout().await.unwrap_err().is_unauthorized());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_log_stream_url() {
    let h = setup().await;
    let url = h.gateway.log_stream_url().unwrap();
    assert_eq!(url.as_str(), format!("{}/api/logs/stream", h.server.uri()));
}

#[tokio::test]
async fn test_log_history() {
    let h = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [
                {"time": "10:00:00", "level": "INFO", "msg": "started"},
                {"time": "10:00:01", "level": "WARN", "msg": "slow", "attrs": {"ms": 900}}
            ],
            "count": 2
        })))
        .mount(&h.server)
        .await;

    let history = h.gateway.log_history().await.unwrap();
    assert_eq!(history.count, 2);
    assert_eq!(history.logs[0].msg, "started");
    assert_eq!(history.logs[1].display_message(), "slow ms=900");
}
