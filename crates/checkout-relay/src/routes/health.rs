use actix_web::{web, HttpRequest, HttpResponse};

use crate::metrics::metrics_output;
use crate::state::AppState;

/// GET /health - Health check endpoint
///
/// Degraded when credentials are missing, since every relay would fail.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let credentials_ok = state.config.credentials.is_complete();
    let response = serde_json::json!({
        "status": if credentials_ok { "ok" } else { "degraded" },
        "service": "checkout-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "credentials": if credentials_ok { "configured" } else { "missing" },
    });

    if credentials_ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Constant-time byte comparison that does not leak input lengths.
/// Both inputs are hashed to fixed-length digests before comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use sha2::{Digest, Sha256};
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    let mut result = 0u8;
    for (x, y) in ha.iter().zip(hb.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(ref expected_token) = state.config.metrics_token {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| constant_time_eq(token.as_bytes(), expected_token.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Valid Bearer token required for /metrics"
            }));
        }
    }

    match metrics_output() {
        Ok(output) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(output),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().body("Failed to encode metrics")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}
