use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::gateway::PaymentGateway;
use crate::token::TokenProvider;
use crate::views::Views;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub gateway: Arc<PaymentGateway>,
    pub views: Arc<Views>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        // One pooled client for token and API calls; the timeout bounds each call.
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RelayError::UpstreamCall(format!("failed to create HTTP client: {e}")))?;

        let tokens = TokenProvider::new(
            http_client.clone(),
            &config.api_base,
            config.credentials.clone(),
            config.token_cache,
        );
        let gateway = PaymentGateway::new(http_client, &config.api_base, tokens);

        Ok(Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            views: Arc::new(Views::new()?),
        })
    }
}
