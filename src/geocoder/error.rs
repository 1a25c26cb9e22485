use thiserror::Error;

/// Failure of a single geocoding request
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request timed out")]
    Timeout,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("client error: {0}")]
    Client(String),
}

impl GeocodeError {
    /// Errors worth retrying against the same provider
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Timeout | GeocodeError::Unavailable(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodeError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            // dropped connections and truncated or corrupt bodies
            GeocodeError::Unavailable(e.to_string())
        } else {
            GeocodeError::Client(e.to_string())
        }
    }

    /// Map a non-success HTTP status to an error
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        match status {
            408 | 429 | 500..=599 => GeocodeError::Unavailable(format!("HTTP {}", status)),
            _ => GeocodeError::Rejected {
                status,
                message: truncate(body, 200),
            },
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
