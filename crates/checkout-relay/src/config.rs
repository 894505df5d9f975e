use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_API_BASE: &str = "https://api-m.sandbox.paypal.com";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Client credentials for the payment platform.
///
/// Either half may be missing at startup; the token provider refuses to
/// exchange them until both are present.
#[derive(Clone, Default)]
pub struct Credentials {
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl Credentials {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.filter(|s| !s.is_empty()),
            client_secret: client_secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Client id with everything past the first four characters hidden.
    pub fn masked_client_id(&self) -> String {
        match self.client_id.as_deref() {
            Some(id) => {
                let prefix: String = id.chars().take(4).collect();
                format!("{prefix}…")
            }
            None => "<unset>".to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.masked_client_id())
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Clone)]
pub struct RelayConfig {
    /// PayPal client id/secret
    pub credentials: Credentials,
    /// Base URL of the payment platform REST API
    pub api_base: String,
    /// Server port
    pub port: u16,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Timeout applied to every outbound call
    pub upstream_timeout: Duration,
    /// Reuse access tokens until shortly before they expire
    pub token_cache: bool,
    /// Directory to serve the browser client from (None = don't serve)
    pub static_dir: Option<String>,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("credentials", &self.credentials)
            .field("api_base", &self.api_base)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("token_cache", &self.token_cache)
            .field("static_dir", &self.static_dir)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::new(
            lookup("PAYPAL_CLIENT_ID"),
            lookup("PAYPAL_CLIENT_SECRET"),
        );

        let api_base = lookup("PAYPAL_API_BASE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let parsed =
            Url::parse(&api_base).map_err(|_| ConfigError::InvalidUrl(api_base.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(api_base));
        }
        let api_base = api_base.trim_end_matches('/').to_string();

        let port = match lookup("PORT") {
            Some(s) => s
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("PORT", s))?,
            None => DEFAULT_PORT,
        };

        let allowed_origins: Vec<String> = lookup("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![format!("http://localhost:{port}")]);

        let rate_limit_rpm = match lookup("RATE_LIMIT_RPM") {
            Some(s) => s
                .parse()
                .ok()
                .filter(|rpm: &u32| *rpm > 0)
                .ok_or(ConfigError::InvalidNumber("RATE_LIMIT_RPM", s))?,
            None => DEFAULT_RATE_LIMIT_RPM,
        };

        let upstream_timeout_secs = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(s) => s
                .parse()
                .ok()
                .filter(|secs: &u64| *secs > 0)
                .ok_or(ConfigError::InvalidNumber("UPSTREAM_TIMEOUT_SECS", s))?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };

        let token_cache = lookup("TOKEN_CACHE")
            .map(|v| !matches!(v.as_str(), "false" | "0" | "off"))
            .unwrap_or(true);

        let static_dir = lookup("STATIC_DIR").filter(|s| !s.is_empty());
        let metrics_token = lookup("METRICS_TOKEN").filter(|s| !s.is_empty());

        if !credentials.is_complete() {
            tracing::warn!(
                "PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET not fully set; \
                 every upstream call will fail until both are configured"
            );
        }

        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set; /metrics endpoint is publicly accessible");
        }

        Ok(Self {
            credentials,
            api_base,
            port,
            allowed_origins,
            rate_limit_rpm,
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
            token_cache,
            static_dir,
            metrics_token,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {0}: {1}")]
    InvalidNumber(&'static str, String),
}
