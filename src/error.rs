use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("reddit client id and secret are not configured")]
    CredentialsMissing,
    #[error("authorization rejected (status {status}): {detail}")]
    AuthRejected { status: u16, detail: String },
    #[error("not a community url: {0:?}")]
    InvalidSource(String),
    #[error("community r/{0} not found")]
    SourceNotFound(String),
    #[error("access to r/{0} denied")]
    AccessDenied(String),
    #[error("rate limited by reddit{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },
    #[error("unexpected reddit response{}: {detail}", status_hint(.status))]
    Upstream { status: Option<u16>, detail: String },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl FetchError {
    pub(crate) fn upstream(detail: impl Into<String>) -> Self {
        FetchError::Upstream {
            status: None,
            detail: detail.into(),
        }
    }

    /// HTTP status behind the error, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::AuthRejected { status, .. } => Some(*status),
            FetchError::SourceNotFound(_) => Some(404),
            FetchError::AccessDenied(_) => Some(403),
            FetchError::RateLimited { .. } => Some(429),
            FetchError::Upstream { status, .. } => *status,
            FetchError::Network(err) => err.status().map(|s| s.as_u16()),
            FetchError::CredentialsMissing | FetchError::InvalidSource(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::CredentialsMissing => "credentials_missing",
            FetchError::AuthRejected { .. } => "auth_rejected",
            FetchError::InvalidSource(_) => "invalid_source",
            FetchError::SourceNotFound(_) => "source_not_found",
            FetchError::AccessDenied(_) => "access_denied",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::Upstream { .. } => "upstream_error",
            FetchError::Network(_) => "network_error",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // strip the url so query strings never end up in messages
        FetchError::Network(err.without_url())
    }
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry in {}s", secs),
        None => String::new(),
    }
}

fn status_hint(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}
