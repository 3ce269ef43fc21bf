//! Shoppingify shop library.
//!
//! The API server's building blocks, exposed as a library so the CLI and the
//! integration tests can reuse them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod claude;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::test_config;

    /// App over a pool that never connects. Only routes that fail before
    /// touching the database are exercised.
    fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shoppingify_test")
            .unwrap();
        app(AppState::new(test_config(), pool).unwrap())
    }

    fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("203.0.113.9:40000".parse::<SocketAddr>().unwrap()));
        request
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request("GET", "/health", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_session_status_requires_login() {
        let (status, body) = send(request("GET", "/api/auth/session", Body::empty())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["detail"],
            "Authentication credentials were not provided."
        );
    }

    #[tokio::test]
    async fn test_logout_without_login_is_rejected() {
        let (status, body) = send(request("POST", "/api/auth/logout", Body::empty())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Not logged in.");
    }

    #[tokio::test]
    async fn test_admin_routes_require_login() {
        let (status, _) = send(request("GET", "/api/admin/chats", Body::empty())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(request(
            "POST",
            "/api/admin/search-index/rebuild",
            Body::empty(),
        ))
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_checkout_requires_login() {
        let (status, _) = send(request("POST", "/api/cart/checkout", Body::from("{}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_login_body() {
        let (status, body) = send(request("POST", "/api/auth/login", Body::from("{not json"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_without_secret_is_unavailable() {
        let (status, _) = send(request(
            "POST",
            "/api/payments/stripe/webhook",
            Body::from("{}"),
        ))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = send(request("GET", "/api/nope", Body::empty())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
