use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, AUTHORIZATION, CACHE_CONTROL, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::TokenProvider;
use crate::classify;
use crate::error::FetchError;
use crate::media::MediaPost;

pub const DEFAULT_BASE_URL: &str = "https://oauth.reddit.com/";
pub const DEFAULT_SITE_URL: &str = "https://www.reddit.com";
pub const MAX_LIMIT: u32 = 100;

const LISTING_KIND: &str = "Listing";
const POST_KIND: &str = "t3";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub site_url: Option<String>,
    pub timeout: Option<Duration>,
}

pub struct Client {
    token_provider: Arc<dyn TokenProvider>,
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    site_url: String,
}

impl Client {
    pub fn new(
        token_provider: Arc<dyn TokenProvider>,
        config: ClientConfig,
    ) -> Result<Self, FetchError> {
        if config.user_agent.trim().is_empty() {
            return Err(FetchError::upstream("reddit client user agent required"));
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)
            .map_err(|err| FetchError::upstream(format!("invalid api base url: {}", err)))?;
        let http = HttpClient::builder()
            .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
            .build()?;
        let site_url = config
            .site_url
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Client {
            token_provider,
            http,
            user_agent: config.user_agent,
            base_url,
            site_url,
        })
    }

    /// Fetches the hot listing of the community named in `community_url`
    /// and returns every classifiable entry, de-duplicated by media url.
    ///
    /// An empty vector is a successful result: the listing had no entry
    /// that any classifier rule accepted.
    pub fn hot_media(&self, community_url: &str, limit: u32) -> Result<Vec<MediaPost>, FetchError> {
        let community = community_name(community_url)?;
        let limit = limit.clamp(1, MAX_LIMIT);
        let listing = self.hot_listing(&community, limit)?;

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        let mut duplicates = 0usize;
        let mut unclassified = 0usize;
        let total = listing.children.len();

        for thing in listing.children {
            if thing.kind != POST_KIND {
                debug!(kind = %thing.kind, "skipping non-post listing entry");
                continue;
            }
            let post: Post = match serde_json::from_value(thing.data) {
                Ok(post) => post,
                Err(err) => {
                    warn!(error = %err, "skipping undecodable post");
                    continue;
                }
            };
            if let Some(reason) = skip_reason(&post) {
                debug!(id = %post.id, reason, "skipping post");
                continue;
            }
            let Some(found) = classify::classify(&post) else {
                unclassified += 1;
                continue;
            };
            if !seen.insert(found.media_url.clone()) {
                duplicates += 1;
                debug!(url = %found.media_url, "skipping duplicate media url");
                continue;
            }
            debug!(id = %post.id, rule = found.rule, media_type = %found.media_type, "classified post");
            posts.push(MediaPost {
                media_url: found.media_url,
                media_type: found.media_type,
                source_url: self.permalink_url(&post.permalink),
                title: post.title,
            });
        }

        info!(
            community = %community,
            entries = total,
            media = posts.len(),
            duplicates,
            unclassified,
            "fetched hot listing"
        );
        Ok(posts)
    }

    fn hot_listing(&self, community: &str, limit: u32) -> Result<Listing, FetchError> {
        let token = self.token_provider.token()?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::upstream("api base url cannot be a base"))?
            .pop_if_empty()
            .extend(["r", community, "hot"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        debug!(community, limit, "requesting hot listing");
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(AUTHORIZATION, format!("Bearer {}", token.value))
            .header(CACHE_CONTROL, "no-store")
            .send()?;

        let resp = self.check_status(resp, community)?;
        let body = resp.text()?;
        decode_listing(&body)
    }

    fn check_status(&self, resp: Response, community: &str) -> Result<Response, FetchError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status.as_u16() {
            401 => {
                // the token can expire between the cache check and this call
                self.token_provider.invalidate();
                Err(FetchError::AuthRejected {
                    status: 401,
                    detail: "listing request unauthorized".into(),
                })
            }
            403 => Err(FetchError::AccessDenied(community.to_string())),
            404 => Err(FetchError::SourceNotFound(community.to_string())),
            429 => Err(FetchError::RateLimited {
                retry_after: retry_after(resp.headers()),
            }),
            code => {
                let body = resp.text().unwrap_or_default();
                Err(FetchError::Upstream {
                    status: Some(code),
                    detail: snippet(&body),
                })
            }
        }
    }

    fn permalink_url(&self, permalink: &str) -> String {
        if permalink.is_empty() {
            return String::new();
        }
        if permalink.starts_with("http://") || permalink.starts_with("https://") {
            return permalink.to_string();
        }
        format!("{}/{}", self.site_url, permalink.trim_start_matches('/'))
    }
}

/// Extracts the community name from the path segment after `/r/`.
pub fn community_name(community_url: &str) -> Result<String, FetchError> {
    let invalid = || FetchError::InvalidSource(community_url.to_string());
    let trimmed = community_url.trim();
    let start = trimmed.find("/r/").ok_or_else(invalid)? + 3;
    let name = trimmed[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid());
    }
    Ok(name.to_string())
}

/// Entries the fetcher never hands to the classifier.
fn skip_reason(post: &Post) -> Option<&'static str> {
    if post.stickied {
        Some("stickied")
    } else if post.is_gallery || post.gallery_data.is_some() {
        Some("gallery")
    } else {
        None
    }
}

fn decode_listing(body: &str) -> Result<Listing, FetchError> {
    let envelope: ListingEnvelope = serde_json::from_str(body)
        .map_err(|err| FetchError::upstream(format!("decode listing: {}", err)))?;
    if envelope.kind != LISTING_KIND {
        return Err(FetchError::upstream(format!(
            "expected {} but got {:?}",
            LISTING_KIND, envelope.kind
        )));
    }
    Ok(envelope.data)
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ListingEnvelope {
    kind: String,
    data: Listing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub children: Vec<Thing>,
}

/// Children are kept as raw json until their kind is known.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// One entry of a listing as reddit sends it. Only the fields the
/// classifier reads are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub post_hint: String,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub is_gallery: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub media: Option<PostMedia>,
    #[serde(default)]
    pub secure_media: Option<PostMedia>,
    #[serde(default)]
    pub secure_media_embed: Option<MediaEmbed>,
    #[serde(default)]
    pub preview: Option<Preview>,
    #[serde(default)]
    pub gallery_data: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMedia {
    #[serde(default)]
    pub reddit_video: Option<RedditVideo>,
    #[serde(default)]
    pub oembed: Option<OEmbed>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditVideo {
    #[serde(default)]
    pub fallback_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OEmbed {
    #[serde(default)]
    pub provider_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEmbed {
    #[serde(default)]
    pub media_domain_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preview {
    #[serde(default)]
    pub reddit_video_preview: Option<RedditVideo>,
}
