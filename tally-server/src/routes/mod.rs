//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document endpoint (disable with `TALLY_ENABLE_DOCS=false`)
//! - Health / heartbeat route
//! - `/v1` account and task routes

pub mod doc;
mod health;
mod v1;

use crate::middleware::{cors, trace};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/v1", v1::router());

    if state.config.enable_docs {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tally_core::{ExecutionConfig, ExecutionEngine, LedgerStore, Shutdown};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Harness {
        app: Router,
        state: Arc<AppState>,
        _shutdown: Shutdown,
    }

    async fn harness_with(config: Config) -> Harness {
        let store = LedgerStore::connect("sqlite::memory:").await.unwrap();
        let shutdown = Shutdown::new();
        let exec = ExecutionConfig {
            cost_range: 1..=14,
            work_duration: Duration::from_millis(1)..Duration::from_millis(5),
        };
        let engine = ExecutionEngine::new(store.clone(), exec, shutdown.signal());
        let state = Arc::new(AppState::new(config, store, engine));
        Harness {
            app: build(state.clone()),
            state,
            _shutdown: shutdown,
        }
    }

    async fn harness() -> Harness {
        harness_with(Config::from_lookup(|_| None)).await
    }

    impl Harness {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            caller: Option<Uuid>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(id) = caller {
                builder = builder.header("x-user-id", id.to_string());
            }
            let body = match body {
                Some(v) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            let resp = self
                .app
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }

        async fn register(&self, credits: i64) -> Uuid {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/v1/users",
                    None,
                    Some(json!({ "initial_credits": credits })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
        }

        async fn create_task(&self, owner: Uuid) -> Uuid {
            let (status, body) = self.send(Method::POST, "/v1/tasks", Some(owner), None).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["status"], "created");
            assert_eq!(body["cost"], Value::Null);
            Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
        }

        async fn credits(&self, user: Uuid) -> i64 {
            let (_, body) = self.send(Method::GET, "/v1/profile", Some(user), None).await;
            body["credits"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness().await;
        let (status, body) = h.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn caller_header_is_required() {
        let h = harness().await;
        let (status, body) = h.send(Method::GET, "/v1/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("x-user-id"));

        let req = Request::builder()
            .uri("/v1/tasks")
            .header("x-user-id", "nope")
            .body(Body::empty())
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_rejects_negative_balance() {
        let h = harness().await;
        let (status, _) = h
            .send(
                Method::POST,
                "/v1/users",
                None,
                Some(json!({ "initial_credits": -5 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn profile_of_unknown_user_is_not_found() {
        let h = harness().await;
        let (status, _) = h
            .send(Method::GET, "/v1/profile", Some(Uuid::new_v4()), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tasks_are_listed_newest_first_and_private() {
        let h = harness().await;
        let alice = h.register(5).await;
        let bob = h.register(5).await;
        let first = h.create_task(alice).await;
        let second = h.create_task(alice).await;

        let (status, body) = h.send(Method::GET, "/v1/tasks", Some(alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, vec![second.to_string(), first.to_string()]);

        let (status, body) = h.send(Method::GET, "/v1/tasks", Some(bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());

        let uri = format!("/v1/tasks/{first}");
        let (status, _) = h.send(Method::GET, &uri, Some(bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = h.send(Method::POST, &format!("{uri}/execute"), Some(bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Creating tasks is free.
        assert_eq!(h.credits(alice).await, 5);
    }

    #[tokio::test]
    async fn unknown_and_malformed_task_ids() {
        let h = harness().await;
        let alice = h.register(5).await;
        let (status, _) = h
            .send(
                Method::POST,
                &format!("/v1/tasks/{}/execute", Uuid::new_v4()),
                Some(alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = h.send(Method::GET, "/v1/tasks/abc", Some(alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn execute_without_funds_is_rejected() {
        let h = harness().await;
        let broke = h.register(0).await;
        let task = h.create_task(broke).await;
        let uri = format!("/v1/tasks/{task}/execute");

        let (status, body) = h.send(Method::POST, &uri, Some(broke), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["already_processed"], false);
        let cost = body["cost"].as_i64().unwrap();
        assert!((1..=14).contains(&cost));

        let (_, again) = h.send(Method::POST, &uri, Some(broke), None).await;
        assert_eq!(again["status"], "rejected");
        assert_eq!(again["cost"].as_i64(), Some(cost));
        assert_eq!(again["already_processed"], true);

        assert_eq!(h.credits(broke).await, 0);
        let (_, ledger) = h.send(Method::GET, "/v1/ledger", Some(broke), None).await;
        assert!(ledger.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn execute_charges_once_and_completes() {
        let h = harness().await;
        let alice = h.register(100).await;
        let task = h.create_task(alice).await;
        let uri = format!("/v1/tasks/{task}/execute");

        let (status, body) = h.send(Method::POST, &uri, Some(alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        let cost = body["cost"].as_i64().unwrap();
        assert_eq!(h.credits(alice).await, 100 - cost);

        let (_, again) = h.send(Method::POST, &uri, Some(alice), None).await;
        assert_eq!(again["already_processed"], true);
        assert_eq!(again["cost"].as_i64(), Some(cost));

        h.state.engine.wait_for_completion(task).await;
        let (_, view) = h
            .send(Method::GET, &format!("/v1/tasks/{task}"), Some(alice), None)
            .await;
        let status = view["status"].as_str().unwrap();
        assert!(status == "succeeded" || status == "failed", "{status}");
        assert!(view["completed_at"].is_string());
        assert_eq!(view["cost"].as_i64(), Some(cost));

        // Completion never touches the balance.
        assert_eq!(h.credits(alice).await, 100 - cost);
        let (_, ledger) = h.send(Method::GET, "/v1/ledger", Some(alice), None).await;
        let entries = ledger.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["kind"], "debit");
        assert_eq!(entries[0]["amount"].as_i64(), Some(-cost));
        assert_eq!(entries[0]["task_id"], task.to_string());
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let h = harness().await;
        let (status, body) = h.send(Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().unwrap();
        for path in ["/health", "/v1/users", "/v1/profile", "/v1/tasks/{id}/execute"] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn openapi_document_can_be_disabled() {
        let h = harness_with(Config::from_lookup(|key| {
            (key == "TALLY_ENABLE_DOCS").then(|| "false".to_owned())
        }))
        .await;
        let (status, _) = h.send(Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn trace_id_is_echoed() {
        let h = harness().await;
        let trace_id = Uuid::new_v4().to_string();
        let req = Request::builder()
            .uri("/health")
            .header(trace::X_TRACE_ID, &trace_id)
            .body(Body::empty())
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[trace::X_TRACE_ID], trace_id.as_str());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        let generated = resp.headers()[trace::X_TRACE_ID].to_str().unwrap();
        assert!(Uuid::parse_str(generated).is_ok());
    }
}
