use thiserror::Error;

/// Failures of the token exchange and upstream relay.
///
/// None of these are shown to browser callers; the router logs them and
/// answers with a fixed per-endpoint message.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A credential is missing. Raised before any network call.
    #[error("missing API credentials: {0}")]
    Configuration(&'static str),

    /// The token endpoint rejected the grant.
    #[error("token endpoint rejected the grant with HTTP {status}: {body}")]
    UpstreamAuth { status: u16, body: String },

    /// The upstream body could not be parsed as JSON.
    #[error("malformed upstream response (HTTP {status}): {body}")]
    MalformedUpstreamResponse { status: u16, body: String },

    /// Transport failure, timeout, or an unreadable upstream body.
    #[error("upstream call failed: {0}")]
    UpstreamCall(String),

    #[error("failed to render view: {0}")]
    Render(String),
}

impl RelayError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Configuration(_) => "configuration",
            RelayError::UpstreamAuth { .. } => "upstream_auth",
            RelayError::MalformedUpstreamResponse { .. } => "malformed_response",
            RelayError::UpstreamCall(_) => "upstream_call",
            RelayError::Render(_) => "render",
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::UpstreamCall(format!("timed out: {e}"))
        } else {
            RelayError::UpstreamCall(e.to_string())
        }
    }
}

impl From<tera::Error> for RelayError {
    fn from(e: tera::Error) -> Self {
        // tera nests the useful part in the source chain
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = std::error::Error::source(inner);
        }
        RelayError::Render(message)
    }
}
