//! Errors from the gateway layer.

/// Failure of a single gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, decode, etc.).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The request exceeded the client timeout.
    #[error("Request timed out")]
    Timeout,

    /// A caller-supplied name cannot be sent as a path segment, or the
    /// base URL cannot carry one.
    #[error("Invalid request path: {0:?}")]
    InvalidPath(String),

    /// The service returned a non-2xx status code.
    #[error("Flux API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(e)
        }
    }
}

impl GatewayError {
    /// Human-readable message supplied by the service, if any.
    ///
    /// The service reports failures as `{"detail": "..."}`; request
    /// validation failures carry a list of `{"msg": "..."}` objects
    /// instead, which are joined with `"; "`.
    pub fn detail(&self) -> Option<String> {
        let GatewayError::Api { body, .. } = self else {
            return None;
        };

        let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
        match parsed.get("detail")? {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
            serde_json::Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        }
    }

    /// HTTP status for [`GatewayError::Api`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
