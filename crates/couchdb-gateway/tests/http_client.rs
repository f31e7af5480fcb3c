//! HttpDbClient against a fake CouchDB served by axum on localhost.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use couchdb_gateway::{
    CouchConfig, Credentials, DatabaseRef, DbClient, DbPath, DocumentRef, FindPath, GatewayError,
    GatewayLimits, HttpDbClient, QueryParams, ToolGateway,
};
use agent_core::{ToolCall, ToolErrorKind};
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
struct CapturedRequest {
    method: Method,
    /// Path exactly as sent, still percent-encoded
    path: String,
    headers: HeaderMap,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Seen = Arc<Mutex<Vec<CapturedRequest>>>;

#[derive(Clone)]
struct FakeCouch {
    status: StatusCode,
    body: &'static str,
    seen: Seen,
}

async fn record(
    State(couch): State<FakeCouch>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    couch.seen.lock().unwrap().push(CapturedRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });
    (
        couch.status,
        [(header::CONTENT_TYPE, "application/json")],
        couch.body,
    )
}

/// Answer every request with `status` and `body`, recording what arrived.
async fn serve(status: u16, body: &'static str) -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new().fallback(record).with_state(FakeCouch {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        seen: seen.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base, seen)
}

fn only_request(seen: &Seen) -> CapturedRequest {
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "expected exactly one request, got {seen:?}");
    seen[0].clone()
}

fn client(base: &str, credentials: Option<Credentials>) -> HttpDbClient {
    HttpDbClient::new(&CouchConfig::new(base, credentials)).unwrap()
}

#[tokio::test]
async fn test_get_all_dbs_with_basic_auth() {
    let (base, seen) = serve(200, r#"["users","orders"]"#).await;
    let creds = Credentials::from_parts(Some("admin".into()), Some("secret".into()));

    let body = client(&base, creds)
        .get(&DbPath::AllDbs, &QueryParams::new())
        .await
        .unwrap();
    assert_eq!(body, json!(["users", "orders"]));

    let captured = only_request(&seen);
    assert_eq!(captured.method, Method::GET);
    assert_eq!(captured.path, "/_all_dbs");
    // base64("admin:secret")
    assert_eq!(captured.header("authorization"), Some("Basic YWRtaW46c2VjcmV0"));
}

#[tokio::test]
async fn test_anonymous_without_credentials() {
    let (base, seen) = serve(200, r#"{"db_name":"users"}"#).await;

    client(&base, None)
        .get(&DbPath::Database(DatabaseRef::new("users").unwrap()), &QueryParams::new())
        .await
        .unwrap();

    let captured = only_request(&seen);
    assert!(captured.header("authorization").is_none());
}

#[tokio::test]
async fn test_escaped_path_is_one_segment_each() {
    let (base, seen) = serve(200, r#"{"_id":"a/b?c"}"#).await;
    let path = DbPath::Document(
        DatabaseRef::new("tenant/users").unwrap(),
        DocumentRef::new("a/b?c#d e").unwrap(),
    );

    client(&base, None).get(&path, &QueryParams::new()).await.unwrap();

    let captured = only_request(&seen);
    assert_eq!(captured.method, Method::GET);
    assert_eq!(captured.path, "/tenant%2Fusers/a%2Fb%3Fc%23d%20e");
}

#[tokio::test]
async fn test_non_success_is_upstream_error() {
    let (base, seen) = serve(404, r#"{"error":"not_found","reason":"missing"}"#).await;
    let path = DbPath::Document(
        DatabaseRef::new("users").unwrap(),
        DocumentRef::new("user:alice").unwrap(),
    );

    let err = client(&base, None)
        .get(&path, &QueryParams::new())
        .await
        .unwrap_err();
    only_request(&seen);

    match err {
        GatewayError::Upstream { status, body, .. } => {
            assert_eq!(status, 404);
            assert!(body.contains("not_found"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_find_posts_json_body() {
    let (base, seen) = serve(200, r#"{"docs":[]}"#).await;
    let body = json!({"selector": {"customer": "alice"}, "limit": 100, "skip": 0});

    client(&base, None)
        .post_read(&FindPath(DatabaseRef::new("orders").unwrap()), &body)
        .await
        .unwrap();

    let captured = only_request(&seen);
    assert_eq!(captured.method, Method::POST);
    assert_eq!(captured.path, "/orders/_find");
    assert!(
        captured
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/json"))
    );
    let sent: Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent, body);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base, None)
        .get(&DbPath::AllDbs, &QueryParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
}

#[tokio::test]
async fn test_gateway_over_http_reports_404() {
    let (base, seen) = serve(404, r#"{"error":"not_found","reason":"missing"}"#).await;
    let gateway = ToolGateway::new(Arc::new(client(&base, None)), GatewayLimits::default());

    let mut args = serde_json::Map::new();
    args.insert("db".into(), json!("users"));
    args.insert("doc_id".into(), json!("user:alice"));
    let result = gateway.call(&ToolCall::new("get_document", args)).await;

    let captured = only_request(&seen);
    assert_eq!(captured.method, Method::GET);
    assert_eq!(captured.path, "/users/user%3Aalice");
    assert_eq!(result.error_kind(), Some(ToolErrorKind::GatewayError));
    assert!(result.error_message().unwrap().starts_with("404 Not Found"));
}
