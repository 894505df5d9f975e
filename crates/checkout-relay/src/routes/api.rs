use actix_web::{error::InternalError, http::StatusCode, web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;
use crate::metrics::RELAY_FAILURES_TOTAL;
use crate::normalize::GatewayResult;
use crate::state::AppState;

const JSON_BODY_LIMIT: usize = 64 * 1024;

const CREATE_SUBSCRIPTION_FAILED: &str = "Failed to create subscription.";
const GET_SUBSCRIPTION_FAILED: &str = "Failed to get subscription.";
const CREATE_ORDER_FAILED: &str = "Failed to create order.";
const CAPTURE_ORDER_FAILED: &str = "Failed to capture order.";

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub cart: Option<Value>,
}

/// Turn a gateway outcome into the browser response.
///
/// Upstream answers go back with their own status and body. Anything that
/// prevented an answer is logged and replaced by `failure_message`.
fn relay(
    endpoint: &'static str,
    failure_message: &'static str,
    outcome: Result<GatewayResult, RelayError>,
) -> HttpResponse {
    match outcome {
        Ok(result) => HttpResponse::build(
            StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY),
        )
        .json(result.body),
        Err(e) => {
            tracing::error!(endpoint, kind = e.kind(), error = %e, "{}", failure_message);
            RELAY_FAILURES_TOTAL
                .with_label_values(&[endpoint, e.kind()])
                .inc();
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": failure_message
            }))
        }
    }
}

/// POST /api/subscriptions - Create a subscription from the widget's payload
pub async fn create_subscription(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> HttpResponse {
    let payload = body.into_inner();
    tracing::info!(plan_id = ?payload.get("plan_id"), "create subscription requested");
    let outcome = state.gateway.create_subscription(&payload).await;
    relay("create_subscription", CREATE_SUBSCRIPTION_FAILED, outcome)
}

/// POST /api/subscriptions/{subscriptionID} - Fetch a subscription after approval
pub async fn get_subscription(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let subscription_id = path.into_inner();
    tracing::info!(subscription_id = %subscription_id, "get subscription requested");
    let outcome = state.gateway.get_subscription(&subscription_id).await;
    relay("get_subscription", GET_SUBSCRIPTION_FAILED, outcome)
}

/// POST /api/orders - Create an order (the body may be missing entirely)
pub async fn create_order(
    state: web::Data<AppState>,
    body: Option<web::Json<CreateOrderRequest>>,
) -> HttpResponse {
    let cart = body.and_then(|b| b.into_inner().cart);
    tracing::info!(has_cart = cart.is_some(), "create order requested");
    let outcome = state.gateway.create_order(cart.as_ref()).await;
    relay("create_order", CREATE_ORDER_FAILED, outcome)
}

/// POST /api/orders/{orderID}/capture - Capture an approved order
pub async fn capture_order(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let order_id = path.into_inner();
    tracing::info!(order_id = %order_id, "capture order requested");
    let outcome = state.gateway.capture_order(&order_id).await;
    relay("capture_order", CAPTURE_ORDER_FAILED, outcome)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            tracing::warn!(error = %err, "rejected request body");
            InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid JSON body"
                })),
            )
            .into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .route("/subscriptions", web::post().to(create_subscription))
            .route(
                "/subscriptions/{subscriptionID}",
                web::post().to(get_subscription),
            )
            .route("/orders", web::post().to(create_order))
            .route("/orders/{orderID}/capture", web::post().to(capture_order)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_passes_upstream_status_through() {
        let response = relay(
            "get_subscription",
            GET_SUBSCRIPTION_FAILED,
            Ok(GatewayResult {
                body: serde_json::json!({"name": "RESOURCE_NOT_FOUND"}),
                status: 404,
            }),
        );
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_relay_hides_failure_detail() {
        let response = relay(
            "create_order",
            CREATE_ORDER_FAILED,
            Err(RelayError::UpstreamAuth {
                status: 401,
                body: "invalid_client".to_string(),
            }),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_relay_rejects_unrepresentable_status() {
        let response = relay(
            "create_order",
            CREATE_ORDER_FAILED,
            Ok(GatewayResult {
                body: serde_json::json!({}),
                status: 42,
            }),
        );
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
