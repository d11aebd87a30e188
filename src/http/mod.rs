//! HTTP surface: request gate, diagnostics and server.

mod client_ip;
mod gate;
mod routes;
mod server;

pub use client_ip::{client_ip, request_client_ip, UNKNOWN_CLIENT};
pub use gate::rate_limit_gate;
pub use routes::ProcedureAdmission;
pub use server::HttpServer;

use axum::http::{HeaderValue, Method};
use axum::routing::{any, get};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tracing::warn;

use crate::config::Environment;
use crate::ratelimit::RateLimiterRegistry;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Tier limiters and their shared cache
    pub registry: Arc<RateLimiterRegistry>,
    /// Deployment mode
    pub environment: Environment,
    /// Origin allowed by the CORS layer
    pub cors_origin: String,
}

impl AppState {
    pub fn new(
        registry: Arc<RateLimiterRegistry>,
        environment: Environment,
        cors_origin: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            environment,
            cors_origin: cors_origin.into(),
        }
    }
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            warn!(origin = %origin, error = %e, "Invalid CORS origin, cross-origin calls disabled");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(AllowHeaders::mirror_request()),
    )
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let procedures = Router::new()
        .route("/trpc/{procedure}", any(routes::procedure_call))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_gate,
        ));

    let cors = cors_layer(&state.cors_origin);

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/debug/rate-limit-stats", get(routes::rate_limit_stats))
        .merge(procedures)
        .fallback(routes::not_found)
        .with_state(state);

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ManualClock, TtlCache};
    use crate::ratelimit::{TierConfig, TierLimits};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    const START: u64 = 1_700_000_000_000;
    const FRONTEND: &str = "http://localhost:5173";

    fn app(environment: Environment) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let cache = Arc::new(TtlCache::with_clock(CacheConfig::default(), clock.clone()));
        let limits = TierLimits {
            strict: TierConfig::new(60_000, 2),
            ..TierLimits::default()
        };
        let registry = Arc::new(RateLimiterRegistry::new(cache, limits));
        (router(AppState::new(registry, environment, FRONTEND)), clock)
    }

    fn call(uri: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(Environment::Development);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_admitted_call_reports_quota() {
        let (app, _) = app(Environment::Development);
        let response = app
            .oneshot(call("/trpc/user.getAll", "203.0.113.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["procedure"], "user.getAll");
        assert_eq!(json["tier"], "lenient");
        assert_eq!(json["limit"], 100);
        assert_eq!(json["remaining"], 99);
        assert_eq!(json["reset"], START + 60_000);
    }

    #[tokio::test]
    async fn test_strict_tier_rejects_third_call() {
        let (app, clock) = app(Environment::Development);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(call("/trpc/user.create", "203.0.113.1"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            clock.advance_ms(1_000);
        }

        let response = app
            .clone()
            .oneshot(call("/trpc/user.create", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "58");
        let json = json_body(response).await;
        assert_eq!(
            json["error"]["message"],
            "Too many requests. Please try again in 58 seconds."
        );

        // Another caller has its own window.
        let response = app
            .oneshot(call("/trpc/user.create", "203.0.113.2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint_in_development() {
        let (app, _) = app(Environment::Development);
        app.clone()
            .oneshot(call("/trpc/hobby.delete", "203.0.113.1"))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/debug/rate-limit-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["totalTrackedIdentifiers"], 1);
        assert_eq!(json["cacheStats"]["keys"], 1);
    }

    #[tokio::test]
    async fn test_stats_endpoint_hidden_in_production() {
        let (app, _) = app(Environment::Production);
        let response = app
            .oneshot(
                Request::get("/debug/rate-limit-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Not found");
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_frontend() {
        let (app, _) = app(Environment::Development);
        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/trpc/user.create")
            .header("origin", FRONTEND)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(preflight).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], FRONTEND);
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert!(headers["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("POST"));
        assert_eq!(headers["access-control-allow-headers"], "content-type");
    }

    #[tokio::test]
    async fn test_cors_preflight_does_not_consume_quota() {
        let (app, _) = app(Environment::Development);
        for _ in 0..3 {
            let preflight = Request::builder()
                .method("OPTIONS")
                .uri("/trpc/user.create")
                .header("origin", FRONTEND)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap();
            app.clone().oneshot(preflight).await.unwrap();
        }

        let response = app
            .oneshot(call("/trpc/user.create", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["remaining"], 1);
    }

    #[tokio::test]
    async fn test_cors_rejects_other_origins() {
        let (app, _) = app(Environment::Development);
        let response = app
            .oneshot(
                Request::get("/health")
                    .header("origin", "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn test_invalid_cors_origin_skips_layer() {
        let cache = Arc::new(TtlCache::new(CacheConfig::default()));
        let registry = Arc::new(RateLimiterRegistry::new(cache, TierLimits::default()));
        let app = router(AppState::new(registry, Environment::Test, "bad\norigin"));

        let response = app
            .oneshot(
                Request::get("/health")
                    .header("origin", FRONTEND)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn test_rpc_prefix_is_not_routed() {
        let (app, _) = app(Environment::Development);
        let response = app
            .oneshot(call("/rpc/user.getAll", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app(Environment::Development);
        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
