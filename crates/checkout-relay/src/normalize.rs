//! Uniform shape for every upstream response.

use serde_json::Value;

use crate::error::RelayError;

/// Maximum upstream response body size (10 MB).
const MAX_RESPONSE_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Parsed upstream response: the JSON body and the status it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResult {
    pub body: Value,
    pub status: u16,
}

/// Read an upstream response and parse its body as JSON.
///
/// Non-2xx statuses are not errors here; they travel back to the caller
/// inside the result.
pub async fn normalize(mut response: reqwest::Response) -> Result<GatewayResult, RelayError> {
    let status = response.status().as_u16();

    if let Some(cl) = response.content_length() {
        if cl > MAX_RESPONSE_BODY_SIZE as u64 {
            return Err(RelayError::UpstreamCall(format!(
                "upstream response too large: {} bytes (max {})",
                cl, MAX_RESPONSE_BODY_SIZE
            )));
        }
    }

    // Enforce the limit while streaming so chunked bodies can't exhaust memory.
    let mut body_buf = Vec::with_capacity(
        response
            .content_length()
            .map(|cl| cl as usize)
            .unwrap_or(8192)
            .min(MAX_RESPONSE_BODY_SIZE),
    );
    while let Some(chunk) = response.chunk().await? {
        if body_buf.len() + chunk.len() > MAX_RESPONSE_BODY_SIZE {
            return Err(RelayError::UpstreamCall(format!(
                "upstream response too large (max {} bytes)",
                MAX_RESPONSE_BODY_SIZE
            )));
        }
        body_buf.extend_from_slice(&chunk);
    }

    normalize_parts(status, &body_buf)
}

/// Status + raw body variant of [`normalize`].
pub fn normalize_parts(status: u16, body: &[u8]) -> Result<GatewayResult, RelayError> {
    match serde_json::from_slice(body) {
        Ok(body) => Ok(GatewayResult { body, status }),
        Err(_) => Err(RelayError::MalformedUpstreamResponse {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}
