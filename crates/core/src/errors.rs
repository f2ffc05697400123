use thiserror::Error;

/// Unified error type for the entire portfolio-insight-core library.
/// Every fallible function returns `Result<T, CoreError>`.
///
/// Most of these never reach the caller of the high-level services:
/// transport and malformed-data failures are recovered locally with
/// fixed fallback content. They surface only from the raw `DataService`
/// seam and from explicit validation helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport ───────────────────────────────────────────────────
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} s: {1}")]
    Timeout(u64, String),

    #[error("Service error ({service}): {message}")]
    Api {
        service: String,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("No data available: {0}")]
    EmptyData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ── Validation ──────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// True for failures of the transport layer (network, timeout, non-2xx).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::Timeout(..) | CoreError::Api { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::MalformedData(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; strip the query string so ids and
        // cache-busting parameters do not end up in logs.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        if e.is_timeout() {
            CoreError::Timeout(0, sanitized)
        } else {
            CoreError::Network(sanitized)
        }
    }
}
