//! Authenticated calls to the Orders v2 and Subscriptions v1 APIs.

use reqwest::Method;
use serde_json::{json, Value};
use std::time::Instant;

use crate::error::RelayError;
use crate::metrics::{UPSTREAM_LATENCY, UPSTREAM_REQUESTS_TOTAL};
use crate::normalize::{normalize, GatewayResult};
use crate::token::TokenProvider;

/// Amount charged for every order until pricing is derived from the cart.
const ORDER_CURRENCY: &str = "USD";
const ORDER_VALUE: &str = "110.00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateOrder,
    CaptureOrder,
    CreateSubscription,
    GetSubscription,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateOrder => "create_order",
            Operation::CaptureOrder => "capture_order",
            Operation::CreateSubscription => "create_subscription",
            Operation::GetSubscription => "get_subscription",
        }
    }
}

/// Order body sent to `/v2/checkout/orders`.
pub fn order_payload() -> Value {
    json!({
        "intent": "CAPTURE",
        "purchase_units": [
            {
                "amount": {
                    "currency_code": ORDER_CURRENCY,
                    "value": ORDER_VALUE,
                },
            },
        ],
    })
}

pub struct PaymentGateway {
    http: reqwest::Client,
    api_base: String,
    tokens: TokenProvider,
}

impl PaymentGateway {
    pub fn new(http: reqwest::Client, api_base: &str, tokens: TokenProvider) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// POST /v2/checkout/orders
    ///
    /// The cart is logged but does not shape the order; every order is for the
    /// fixed amount in [`order_payload`].
    pub async fn create_order(&self, cart: Option<&Value>) -> Result<GatewayResult, RelayError> {
        tracing::debug!(cart = ?cart, "creating order from cart");
        let payload = order_payload();
        self.send(
            Operation::CreateOrder,
            Method::POST,
            "/v2/checkout/orders".to_string(),
            Some(&payload),
        )
        .await
    }

    /// POST /v1/billing/subscriptions with the caller's payload as-is.
    pub async fn create_subscription(&self, payload: &Value) -> Result<GatewayResult, RelayError> {
        self.send(
            Operation::CreateSubscription,
            Method::POST,
            "/v1/billing/subscriptions".to_string(),
            Some(payload),
        )
        .await
    }

    /// GET /v1/billing/subscriptions/{id}
    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewayResult, RelayError> {
        self.send(
            Operation::GetSubscription,
            Method::GET,
            format!(
                "/v1/billing/subscriptions/{}",
                urlencoding::encode(subscription_id)
            ),
            None,
        )
        .await
    }

    /// POST /v2/checkout/orders/{id}/capture
    ///
    /// Not safe to retry: a second capture of the same order is a second
    /// request to the platform.
    pub async fn capture_order(&self, order_id: &str) -> Result<GatewayResult, RelayError> {
        self.send(
            Operation::CaptureOrder,
            Method::POST,
            format!(
                "/v2/checkout/orders/{}/capture",
                urlencoding::encode(order_id)
            ),
            None,
        )
        .await
    }

    async fn send(
        &self,
        operation: Operation,
        method: Method,
        path: String,
        body: Option<&Value>,
    ) -> Result<GatewayResult, RelayError> {
        let access_token = self.tokens.access_token().await?;
        let url = format!("{}{}", self.api_base, path);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&access_token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            UPSTREAM_REQUESTS_TOTAL
                .with_label_values(&[operation.as_str(), "error"])
                .inc();
            tracing::error!(operation = operation.as_str(), error = %e, "upstream request failed");
            RelayError::from(e)
        })?;

        let status = response.status();
        UPSTREAM_LATENCY
            .with_label_values(&[operation.as_str()])
            .observe(started.elapsed().as_secs_f64());
        UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&[operation.as_str(), status.as_str()])
            .inc();
        tracing::info!(
            operation = operation.as_str(),
            status = status.as_u16(),
            "upstream call completed"
        );

        // A revoked token would otherwise keep failing until it expires.
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate_if(&access_token).await;
        }

        normalize(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::time::Duration;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AAtoken",
                "token_type": "Bearer",
                "expires_in": 32400,
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn gateway_with(server: &MockServer, http: reqwest::Client, cache: bool) -> PaymentGateway {
        let credentials = Credentials::new(Some("client-id".into()), Some("client-secret".into()));
        let tokens = TokenProvider::new(http.clone(), &server.uri(), credentials, cache);
        PaymentGateway::new(http, &server.uri(), tokens)
    }

    fn gateway(server: &MockServer) -> PaymentGateway {
        gateway_with(server, reqwest::Client::new(), true)
    }

    #[tokio::test]
    async fn test_create_order_sends_fixed_payload() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(bearer_token("A21AAtoken"))
            .and(body_json(order_payload()))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "ORDER1", "status": "CREATED"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cart = json!([{"id": "X", "qty": 2}]);
        let result = gateway(&server).create_order(Some(&cart)).await.unwrap();
        assert_eq!(result.status, 201);
        assert_eq!(result.body, json!({"id": "ORDER1", "status": "CREATED"}));
    }

    #[tokio::test]
    async fn test_create_subscription_forwards_payload_verbatim() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        let payload = json!({
            "plan_id": "P-18N054251K828063VM4MCFZQ",
            "quantity": "20",
            "subscriber": {"email_address": "customer@example.com"},
        });
        Mock::given(method("POST"))
            .and(path("/v1/billing/subscriptions"))
            .and(body_json(payload.clone()))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "I-SUB1", "status": "APPROVAL_PENDING"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server)
            .create_subscription(&payload)
            .await
            .unwrap();
        assert_eq!(result.status, 201);
        assert_eq!(result.body["id"], "I-SUB1");
    }

    #[tokio::test]
    async fn test_get_subscription_is_repeatable_and_reuses_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/billing/subscriptions/I-SUB1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "I-SUB1", "status": "ACTIVE"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let first = gateway.get_subscription("I-SUB1").await.unwrap();
        let second = gateway.get_subscription("I-SUB1").await.unwrap();
        assert_eq!(
            serde_json::to_vec(&first.body).unwrap(),
            serde_json::to_vec(&second.body).unwrap()
        );
    }

    #[tokio::test]
    async fn test_identifier_is_encoded_as_one_segment() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/a%2Fb/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a/b"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server).capture_order("a/b").await.unwrap();
        assert_eq!(result.status, 201);
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_passed_through() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER1/capture"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{"issue": "INSTRUMENT_DECLINED"}],
            })))
            .mount(&server)
            .await;

        let result = gateway(&server).capture_order("ORDER1").await.unwrap();
        assert_eq!(result.status, 422);
        assert_eq!(result.body["details"][0]["issue"], "INSTRUMENT_DECLINED");
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed_for_every_operation() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let results = vec![
            gateway.create_order(None).await,
            gateway.create_subscription(&json!({"plan_id": "P-1"})).await,
            gateway.get_subscription("I-SUB1").await,
            gateway.capture_order("ORDER1").await,
        ];
        for result in results {
            match result {
                Err(RelayError::MalformedUpstreamResponse { status, body }) => {
                    assert_eq!(status, 500);
                    assert_eq!(body, "upstream exploded");
                }
                other => panic!("expected malformed response, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_token_stops_before_api_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "ORDER1"})))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(
            gateway(&server).create_order(None).await,
            Err(RelayError::UpstreamAuth { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_api_call_drops_cached_token() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/v1/billing/subscriptions/I-SUB1"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        assert_eq!(gateway.get_subscription("I-SUB1").await.unwrap().status, 401);
        assert_eq!(gateway.get_subscription("I-SUB1").await.unwrap().status, 401);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/billing/subscriptions/I-SUB1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "I-SUB1"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        assert!(matches!(
            gateway_with(&server, http, true)
                .get_subscription("I-SUB1")
                .await,
            Err(RelayError::UpstreamCall(_))
        ));
    }
}
