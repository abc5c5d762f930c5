use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{auth, reddit};

const DEFAULT_ENV_PREFIX: &str = "HOT_MEDIA";
const CLIENT_ID_ENV: &str = "REDDIT_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "REDDIT_CLIENT_SECRET";

pub const DEFAULT_USER_AGENT: &str = "hot-media/0.1 (image collector; client-credentials)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: default_user_agent(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            site_url: default_site_url(),
            timeout: default_timeout(),
        }
    }
}

impl std::fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("site_url", &self.site_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedditConfig {
    pub fn auth_config(&self) -> auth::Config {
        auth::Config {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            user_agent: self.user_agent.clone(),
            token_url: self.token_url.clone(),
            timeout: self.timeout,
        }
    }

    pub fn client_config(&self) -> reddit::ClientConfig {
        reddit::ClientConfig {
            user_agent: self.user_agent.clone(),
            base_url: Some(self.api_base_url.clone()),
            site_url: Some(self.site_url.clone()),
            timeout: Some(self.timeout),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_token_url() -> String {
    "https://www.reddit.com/api/v1/access_token".into()
}

fn default_api_base_url() -> String {
    reddit::DEFAULT_BASE_URL.into()
}

fn default_site_url() -> String {
    reddit::DEFAULT_SITE_URL.into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    /// Extra hostnames images may be served from, on top of the built-in ones.
    #[serde(default)]
    pub image_hosts: Vec<String>,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_hosts: Vec::new(),
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> u32 {
    25
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    for (key, value) in env_values(prefix) {
        apply_env_value(&mut cfg, &key, value);
    }

    if cfg.reddit.client_id.is_empty() {
        if let Ok(id) = env::var(CLIENT_ID_ENV) {
            cfg.reddit.client_id = id.trim().to_string();
        }
    }
    if cfg.reddit.client_secret.is_empty() {
        if let Ok(secret) = env::var(CLIENT_SECRET_ENV) {
            cfg.reddit.client_secret = secret.trim().to_string();
        }
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.reddit.client_id.is_empty() {
        base.reddit.client_id = other.reddit.client_id;
    }
    if !other.reddit.client_secret.is_empty() {
        base.reddit.client_secret = other.reddit.client_secret;
    }
    if !other.reddit.user_agent.is_empty() {
        base.reddit.user_agent = other.reddit.user_agent;
    }
    if !other.reddit.token_url.is_empty() {
        base.reddit.token_url = other.reddit.token_url;
    }
    if !other.reddit.api_base_url.is_empty() {
        base.reddit.api_base_url = other.reddit.api_base_url;
    }
    if !other.reddit.site_url.is_empty() {
        base.reddit.site_url = other.reddit.site_url;
    }
    if !other.reddit.timeout.is_zero() {
        base.reddit.timeout = other.reddit.timeout;
    }

    if !other.media.image_hosts.is_empty() {
        base.media.image_hosts = other.media.image_hosts;
    }
    if other.media.default_limit != 0 {
        base.media.default_limit = other.media.default_limit;
    }

    base
}

/// `section.field` keys of every prefixed variable that is actually set.
fn env_values(prefix: &str) -> Vec<(String, String)> {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let mut overrides: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&upper_prefix)
                .map(|stripped| (stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();
    overrides.sort();
    overrides
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "reddit.client_id" => cfg.reddit.client_id = value,
        "reddit.client_secret" => cfg.reddit.client_secret = value,
        "reddit.user_agent" => cfg.reddit.user_agent = value,
        "reddit.token_url" => cfg.reddit.token_url = value,
        "reddit.api_base_url" => cfg.reddit.api_base_url = value,
        "reddit.site_url" => cfg.reddit.site_url = value,
        "reddit.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.reddit.timeout = duration;
            }
        }
        "media.image_hosts" => {
            cfg.media.image_hosts = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "media.default_limit" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.media.default_limit = parsed;
            }
        }
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hot-media").join("config.yaml"))
}
