//! Request gate: rate limit admission in front of RPC procedures.

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::client_ip::request_client_ip;
use super::AppState;
use crate::error::RateLimitExceeded;
use crate::ratelimit::Tier;

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'static str,
    message: String,
    data: &'a RateLimitExceeded,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope {
            error: ErrorDetail {
                code: "TOO_MANY_REQUESTS",
                message: self.to_string(),
                data: &self,
            },
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(self.retry_after_seconds),
        );
        response
    }
}

/// Middleware admitting calls to `/trpc/{procedure}` under the procedure's tier.
///
/// Admitted requests carry their [`RateLimitResult`] as a request extension.
///
/// [`RateLimitResult`]: crate::ratelimit::RateLimitResult
pub async fn rate_limit_gate(
    State(state): State<AppState>,
    Path(procedure): Path<String>,
    mut req: Request,
    next: Next,
) -> Response {
    let tier = Tier::for_procedure(&procedure);
    let ip = request_client_ip(&req);

    let span = info_span!(
        "procedure_call",
        request_id = %Uuid::new_v4(),
        procedure = %procedure,
        tier = %tier,
        client_ip = %ip
    );

    let admission = span.in_scope(|| state.registry.check(tier, &ip));
    match admission {
        Ok(result) => {
            span.in_scope(|| {
                debug!(
                    remaining = result.remaining,
                    limit = result.limit,
                    "Call admitted"
                )
            });
            req.extensions_mut().insert(result);
            next.run(req).instrument(span).await
        }
        Err(exceeded) => exceeded.into_response(),
    }
}
