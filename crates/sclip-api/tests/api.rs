//! End-to-end tests through the router with an in-memory store and scripted tools.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use sclip_api::auth::{sign_token, Claims};
use sclip_api::{create_router, ApiConfig, AppState};
use sclip_media::testing::FakeMediaTools;
use sclip_models::{Account, AccountId, PlanTier, Role};
use sclip_store::{JobStore, MemoryStore};
use sclip_worker::WorkerConfig;

const SECRET: &str = "test-secret";
const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    _dir: tempfile::TempDir,
}

fn app(tools: FakeMediaTools) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        admin_account_ids: vec!["root".to_string()],
        ..Default::default()
    };
    let state = AppState::from_parts(
        config,
        WorkerConfig::with_work_dir(dir.path()),
        store.clone(),
        Arc::new(tools),
    );
    TestApp {
        router: create_router(state, None),
        store,
        _dir: dir,
    }
}

fn token(sub: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{sub}@example.com")),
        exp: Utc::now().timestamp() + 3600,
        iat: None,
    };
    sign_token(SECRET, &claims).unwrap()
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, sub: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sub) = sub {
            builder = builder.header("Authorization", format!("Bearer {}", token(sub)));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn submit(&self, sub: &str, locator: &str) -> (StatusCode, Value) {
        self.call(Method::POST, "/api/jobs", Some(sub), Some(json!({ "source_locator": locator })))
            .await
    }

    /// Poll the status endpoint until the job is terminal.
    async fn wait_terminal(&self, sub: &str, job_id: &str) -> Value {
        let uri = format!("/api/jobs/{job_id}/status");
        for _ in 0..500 {
            let (status, body) = self.call(Method::GET, &uri, Some(sub), None).await;
            assert_eq!(status, StatusCode::OK);
            if matches!(body["status"].as_str(), Some("completed" | "failed")) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never finished");
    }
}

#[tokio::test]
async fn test_health() {
    let app = app(FakeMediaTools::new("Talk", 90.0));

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"]["status"], "ok");
}

#[tokio::test]
async fn test_ninety_second_source_end_to_end() {
    let app = app(FakeMediaTools::new("Talk", 90.0));

    let (status, body) = app.submit("alice", URL).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let done = app.wait_terminal("alice", &job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["title"], "Talk");
    assert_eq!(done["clips_count"], 3);

    let clips = done["clips"].as_array().unwrap();
    assert_eq!(clips.len(), 3);
    for clip in clips {
        assert_eq!(clip["duration"].as_f64(), Some(30.0));
    }

    let (status, body) = app.call(Method::GET, "/api/jobs", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["jobs"][0]["clips_count"], 3);

    let (status, body) = app.call(Method::GET, "/api/clips", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_failed_job_reports_reason() {
    let app = app(FakeMediaTools::new("Talk", 90.0).failing_acquire());

    let (status, body) = app.submit("alice", URL).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let done = app.wait_terminal("alice", body["job_id"].as_str().unwrap()).await;
    assert_eq!(done["status"], "failed");
    assert_eq!(done["clips_count"], 0);
    assert!(done["error_message"].as_str().unwrap().contains("scripted download failure"));
}

#[tokio::test]
async fn test_free_quota_returns_429() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    for _ in 0..2 {
        let (status, _) = app.submit("alice", URL).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let (status, body) = app.submit("alice", URL).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "quota_exceeded");
    assert!(body["detail"].as_str().unwrap().contains("2 jobs"));

    // Another account has its own window.
    let (status, _) = app.submit("bob", URL).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_invalid_locator_returns_400() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    let (status, body) = app.submit("alice", "https://vimeo.com/12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = app.call(Method::POST, "/api/jobs", Some("alice"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.submit("alice", &format!("{URL}&{}", "x".repeat(600))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (_, body) = app.call(Method::GET, "/api/jobs", Some("alice"), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_unreadable_body_uses_error_shape() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    let cases = [
        (Some("application/json"), "{not json"),
        (Some("application/json"), r#"{"source_locator": 5}"#),
        (None, r#"{"source_locator": "youtu.be/abc123"}"#),
    ];
    for (content_type, raw) in cases {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/jobs")
            .header("Authorization", format!("Bearer {}", token("alice")));
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }
        let response = app
            .router
            .clone()
            .oneshot(builder.body(Body::from(raw)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {raw:?}");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "bad_request");
        assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
    }

    let (_, body) = app.call(Method::GET, "/api/jobs", Some("alice"), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_video_url_alias() {
    let app = app(FakeMediaTools::new("Talk", 45.0));
    let (status, _) = app
        .call(Method::POST, "/api/jobs", Some("alice"), Some(json!({ "video_url": "youtu.be/abc123" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_missing_or_bad_token_returns_401() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    let (status, body) = app.call(Method::GET, "/api/jobs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/jobs")
        .header("Authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let app = app(FakeMediaTools::new("Talk", 90.0));

    let (_, body) = app.submit("alice", URL).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    app.wait_terminal("alice", &job_id).await;

    let uri = format!("/api/jobs/{job_id}");
    let (status, body) = app.call(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = app.call(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);

    let (status, _) = app.call(Method::GET, &format!("{uri}/status"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.call(Method::GET, "/api/clips", Some("alice"), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_other_accounts_job_is_hidden() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    let (_, body) = app.submit("alice", URL).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    app.wait_terminal("alice", &job_id).await;

    let (status, _) = app
        .call(Method::GET, &format!("/api/jobs/{job_id}/status"), Some("mallory"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::DELETE, &format!("/api/jobs/{job_id}"), Some("mallory"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);

    let (_, body) = app.call(Method::GET, "/api/clips", Some("alice"), None).await;
    let clip_id = body["clips"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = app.call(Method::GET, &format!("/api/clips/{clip_id}"), Some("mallory"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_single_clip() {
    let app = app(FakeMediaTools::new("Talk", 90.0));

    let (_, body) = app.submit("alice", URL).await;
    app.wait_terminal("alice", body["job_id"].as_str().unwrap()).await;

    let (_, body) = app.call(Method::GET, "/api/clips", Some("alice"), None).await;
    let clip = body["clips"][0].clone();
    let clip_id = clip["id"].as_str().unwrap();
    let file = std::path::PathBuf::from(clip["file_path"].as_str().unwrap());
    assert!(file.exists());

    let (status, body) = app.call(Method::DELETE, &format!("/api/clips/{clip_id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert!(!file.exists());

    let (_, body) = app.call(Method::GET, "/api/clips", Some("alice"), None).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_account_usage() {
    let app = app(FakeMediaTools::new("Talk", 45.0));
    app.submit("alice", URL).await;

    let (status, body) = app.call(Method::GET, "/api/account", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["role"], "user");
    assert_eq!(body["jobs_this_week"], 1);
    assert_eq!(body["weekly_limit"], 2);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_role() {
    let app = app(FakeMediaTools::new("Talk", 45.0));

    let (status, body) = app.call(Method::GET, "/api/admin/stats", Some("alice"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = app.call(Method::GET, "/api/admin/stats", Some("root"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts_by_plan"]["free"], 2);
}

#[tokio::test]
async fn test_admin_plan_upgrade_lifts_quota() {
    let app = app(FakeMediaTools::new("Talk", 45.0));
    app.store
        .upsert_account(&Account::new("alice", "alice@example.com"))
        .await
        .unwrap();

    let plan_uri = "/api/admin/accounts/alice/plan";
    let (status, _) = app.call(Method::PUT, plan_uri, Some("alice"), Some(json!({ "plan": "lifetime" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::PUT, plan_uri, Some("root"), Some(json!({ "plan": "premium" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::PUT, "/api/admin/accounts/ghost/plan", Some("root"), Some(json!({ "plan": "weekly" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::PUT, plan_uri, Some("root"), Some(json!({ "plan": "lifetime" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["plan"], "lifetime");

    for _ in 0..4 {
        let (status, _) = app.submit("alice", URL).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let stored = app.store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
    assert_eq!(stored.plan, PlanTier::Lifetime);
    assert_eq!(stored.role, Role::User);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = app(FakeMediaTools::new("Talk", 45.0));
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["X-Request-ID"], "req-123");
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
    assert_eq!(response.headers()["X-Frame-Options"], "DENY");
}
