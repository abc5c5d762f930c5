use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::FetchError;

/// Subtracted from `expires_in` so a cached token is never used right at its real expiry.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(300);

pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<AccessToken, FetchError>;
    fn invalidate(&self);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub token_url: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: crate::config::DEFAULT_USER_AGENT.into(),
            token_url: "https://www.reddit.com/api/v1/access_token".into(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Application-only OAuth token source using the client-credentials grant.
///
/// Holds at most one token. Concurrent callers that both find the slot
/// empty will both hit the grant endpoint; the last response wins.
pub struct TokenManager {
    cfg: Config,
    client: Client,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(cfg: Config) -> Result<Self, FetchError> {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: Config, clock: Arc<dyn Clock>) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            cfg,
            client,
            clock,
            cached: RwLock::new(None),
        })
    }

    pub fn cached(&self) -> Option<AccessToken> {
        self.cached.read().clone()
    }

    fn request_token(&self) -> Result<AccessToken, FetchError> {
        let id = self.cfg.client_id.trim();
        let secret = self.cfg.client_secret.trim();
        if id.is_empty() || secret.is_empty() {
            return Err(FetchError::CredentialsMissing);
        }

        debug!(token_url = %self.cfg.token_url, "requesting client-credentials token");
        let form = [("grant_type", "client_credentials")];
        let resp = self
            .client
            .post(&self.cfg.token_url)
            .header(USER_AGENT, self.cfg.user_agent.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CACHE_CONTROL, "no-store")
            .basic_auth(id, Some(secret))
            .form(&form)
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            if status.as_u16() == 401 {
                self.invalidate();
            }
            let detail = match serde_json::from_str::<TokenError>(&body) {
                Ok(err) => err.to_string(),
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("token request failed")
                    .to_string(),
            };
            return Err(FetchError::AuthRejected {
                status: status.as_u16(),
                detail,
            });
        }

        let payload: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            FetchError::Upstream {
                status: Some(status.as_u16()),
                detail: format!("decode token response: {}", err),
            }
        })?;
        if payload.access_token.is_empty() {
            return Err(FetchError::upstream("token response missing access_token"));
        }
        if !payload.token_type.eq_ignore_ascii_case("bearer") {
            return Err(FetchError::upstream(format!(
                "unexpected token type {:?}",
                payload.token_type
            )));
        }

        let expires_in = payload.expires_in.clamp(0, i64::from(u32::MAX));
        let margin = chrono::Duration::from_std(SAFETY_MARGIN)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let lifetime = chrono::Duration::seconds(expires_in) - margin;
        let token = AccessToken {
            value: payload.access_token,
            expires_at: self.clock.now() + lifetime,
        };
        info!(expires_at = %token.expires_at, scope = %payload.scope, "obtained access token");
        Ok(token)
    }
}

impl TokenProvider for TokenManager {
    fn token(&self) -> Result<AccessToken, FetchError> {
        let now = self.clock.now();
        if let Some(token) = self.cached.read().as_ref() {
            if token.is_valid_at(now) {
                return Ok(token.clone());
            }
        }

        let token = self.request_token()?;
        *self.cached.write() = Some(token.clone());
        Ok(token)
    }

    fn invalidate(&self) {
        if self.cached.write().take().is_some() {
            debug!("cached access token invalidated");
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: serde_json::Value,
    #[serde(default, alias = "error_description")]
    message: String,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error = match &self.error {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        match (error.is_empty(), self.message.is_empty()) {
            (true, true) => write!(f, "unknown token error"),
            (false, true) => write!(f, "{}", error),
            (true, false) => write!(f, "{}", self.message),
            (false, false) => write!(f, "{} ({})", error, self.message),
        }
    }
}
