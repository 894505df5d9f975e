//! OAuth 2.0 client-credentials exchange against `/v1/oauth2/token`.

use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::Credentials;
use crate::error::RelayError;
use crate::metrics::TOKEN_REQUESTS_TOTAL;

const TOKEN_PATH: &str = "/v1/oauth2/token";

/// Cached tokens are dropped this long before the platform expires them.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Body of a successful token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Present when the grant asked for a customer-scoped identity token.
    #[serde(default)]
    pub id_token: Option<String>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    credentials: Credentials,
    /// `None` when caching is disabled.
    cache: Option<Mutex<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        credentials: Credentials,
        cache_tokens: bool,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}{}", api_base.trim_end_matches('/'), TOKEN_PATH),
            credentials,
            cache: cache_tokens.then(|| Mutex::new(None)),
        }
    }

    /// Run one client-credentials grant, with `extra_params` appended to the
    /// form body. Always a fresh exchange.
    pub async fn authenticate(
        &self,
        extra_params: &[(&str, &str)],
    ) -> Result<TokenResponse, RelayError> {
        let client_id = self
            .credentials
            .client_id()
            .ok_or(RelayError::Configuration("PAYPAL_CLIENT_ID"))?;
        let client_secret = self
            .credentials
            .client_secret()
            .ok_or(RelayError::Configuration("PAYPAL_CLIENT_SECRET"))?;

        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{client_id}:{client_secret}"));

        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("response_type", "id_token"),
        ];
        params.extend_from_slice(extra_params);

        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .inspect_err(|_| TOKEN_REQUESTS_TOTAL.with_label_values(&["failed"]).inc())?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .inspect_err(|_| TOKEN_REQUESTS_TOTAL.with_label_values(&["failed"]).inc())?;

        if !status.is_success() {
            TOKEN_REQUESTS_TOTAL.with_label_values(&["failed"]).inc();
            let body = String::from_utf8_lossy(&body).into_owned();
            tracing::warn!(status = %status, "token endpoint rejected client credentials");
            return Err(RelayError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice::<TokenResponse>(&body).map_err(|_| {
            TOKEN_REQUESTS_TOTAL.with_label_values(&["failed"]).inc();
            RelayError::MalformedUpstreamResponse {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
        })
    }

    /// Bearer token for API calls, served from cache while it is still valid.
    pub async fn access_token(&self) -> Result<String, RelayError> {
        let Some(cache) = &self.cache else {
            let token = self.authenticate(&[]).await?;
            TOKEN_REQUESTS_TOTAL.with_label_values(&["issued"]).inc();
            return Ok(token.access_token);
        };

        // Held across the refresh so concurrent callers wait for one exchange.
        let mut slot = cache.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                TOKEN_REQUESTS_TOTAL.with_label_values(&["cached"]).inc();
                return Ok(cached.access_token.clone());
            }
        }

        let token = self.authenticate(&[]).await?;
        TOKEN_REQUESTS_TOTAL.with_label_values(&["issued"]).inc();

        // expires_in comes off the wire; an unrepresentable expiry is not cached.
        *slot = token
            .expires_in
            .map(Duration::from_secs)
            .filter(|ttl| *ttl > EXPIRY_SKEW)
            .and_then(|ttl| Instant::now().checked_add(ttl - EXPIRY_SKEW))
            .map(|expires_at| CachedToken {
                access_token: token.access_token.clone(),
                expires_at,
            });
        if slot.is_none() {
            tracing::debug!(
                expires_in = ?token.expires_in,
                "access token too short-lived to cache"
            );
        }

        Ok(token.access_token)
    }

    /// Mint an identity token scoped to a vaulted customer. Never cached.
    pub async fn identity_token(&self, target_customer_id: &str) -> Result<String, RelayError> {
        let token = self
            .authenticate(&[("target_customer_id", target_customer_id)])
            .await?;
        TOKEN_REQUESTS_TOTAL.with_label_values(&["identity"]).inc();

        token.id_token.ok_or_else(|| RelayError::MalformedUpstreamResponse {
            status: 200,
            body: "token response has no id_token".to_string(),
        })
    }

    /// Drop the cached access token if it is still `rejected`.
    ///
    /// A token refreshed by another caller in the meantime is kept.
    pub async fn invalidate_if(&self, rejected: &str) {
        if let Some(cache) = &self.cache {
            let mut slot = cache.lock().await;
            if slot
                .as_ref()
                .is_some_and(|cached| cached.access_token == rejected)
            {
                *slot = None;
            }
        }
    }
}
