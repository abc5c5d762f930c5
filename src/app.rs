use std::sync::Arc;

use tracing::info;

use crate::auth::{TokenManager, TokenProvider};
use crate::config::Config;
use crate::error::FetchError;
use crate::media::MediaPost;
use crate::reddit;
use crate::sanitize::{self, AllowedHosts};

/// Owns the token cache for the life of the process and runs one
/// fetch → sanitize pass per call.
pub struct Pipeline {
    client: reddit::Client,
    image_hosts: Vec<String>,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        let tokens: Arc<dyn TokenProvider> =
            Arc::new(TokenManager::new(cfg.reddit.auth_config())?);
        Self::with_tokens(cfg, tokens)
    }

    pub fn with_tokens(cfg: &Config, tokens: Arc<dyn TokenProvider>) -> Result<Self, FetchError> {
        let client = reddit::Client::new(tokens, cfg.reddit.client_config())?;
        Ok(Self {
            client,
            image_hosts: cfg.media.image_hosts.clone(),
        })
    }

    pub fn allowed_hosts(&self) -> AllowedHosts {
        AllowedHosts::with_defaults(&self.image_hosts)
    }

    /// Unfiltered classifier output for the community.
    pub fn fetch(&self, community_url: &str, limit: u32) -> Result<Vec<MediaPost>, FetchError> {
        self.client.hot_media(community_url, limit)
    }

    /// Direct image links that passed the host allow-list.
    pub fn images(&self, community_url: &str, limit: u32) -> Result<Vec<MediaPost>, FetchError> {
        let posts = self.fetch(community_url, limit)?;
        let fetched = posts.len();
        let images = sanitize::filter(posts, &self.allowed_hosts());
        info!(fetched, kept = images.len(), "sanitized media list");
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessToken;
    use crate::media::MediaType;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;

    struct StaticToken;

    impl TokenProvider for StaticToken {
        fn token(&self) -> Result<AccessToken, FetchError> {
            Ok(AccessToken {
                value: "tok".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
        }

        fn invalidate(&self) {}
    }

    fn config(server: &Server, hosts: &[&str]) -> Config {
        let mut cfg = Config::default();
        cfg.reddit.api_base_url = format!("{}/", server.url());
        cfg.reddit.token_url = format!("{}/api/v1/access_token", server.url());
        cfg.reddit.client_id = "client".into();
        cfg.reddit.client_secret = "secret".into();
        cfg.media.image_hosts = hosts.iter().map(|h| h.to_string()).collect();
        cfg
    }

    fn entry(id: &str, url: &str, extra: serde_json::Value) -> serde_json::Value {
        let mut data = json!({
            "id": id,
            "title": format!("post {id}"),
            "permalink": format!("/r/pics/comments/{id}/post/"),
            "url": url,
        });
        if let (Some(map), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
            map.extend(extra.clone());
        }
        json!({ "kind": "t3", "data": data })
    }

    #[test]
    fn keeps_only_allowed_images_in_listing_order() {
        let mut server = Server::new();
        let body = json!({
            "kind": "Listing",
            "data": { "children": [
                entry("a", "https://i.redd.it/a.jpg", json!({ "post_hint": "image" })),
                entry("b", "https://v.redd.it/b", json!({
                    "is_video": true,
                    "media": { "reddit_video": { "fallback_url": "https://v.redd.it/b/DASH_360.mp4" } }
                })),
                entry("c", "https://cdn.example.com/c.png", json!({})),
                entry("d", "https://tracker.example.net/d.gif", json!({})),
                entry("e", "https://i.imgur.com/e.jpg", json!({})),
            ]}
        });
        let _hot = server
            .mock("GET", "/r/pics/hot")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create();

        let pipeline = Pipeline::with_tokens(
            &config(&server, &["cdn.example.com"]),
            Arc::new(StaticToken),
        )
        .unwrap();

        assert_eq!(pipeline.fetch("https://www.reddit.com/r/pics", 25).unwrap().len(), 5);

        let images = pipeline.images("https://www.reddit.com/r/pics", 25).unwrap();
        let urls: Vec<_> = images.iter().map(|p| p.media_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://i.redd.it/a.jpg",
                "https://cdn.example.com/c.png",
                "https://i.imgur.com/e.jpg"
            ]
        );
        assert!(images.iter().all(|p| p.media_type == MediaType::Image));
    }

    #[test]
    fn grant_then_listing_share_the_cached_token() {
        let mut server = Server::new();
        let grant = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok-9","token_type":"bearer","expires_in":86400,"scope":"*"}"#)
            .expect(1)
            .create();
        let hot = server
            .mock("GET", "/r/pics/hot")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer tok-9")
            .with_status(200)
            .with_body(json!({ "kind": "Listing", "data": { "children": [] } }).to_string())
            .expect(2)
            .create();

        let pipeline = Pipeline::new(&config(&server, &[])).unwrap();
        assert!(pipeline.images("https://www.reddit.com/r/pics", 25).unwrap().is_empty());
        assert!(pipeline.images("https://www.reddit.com/r/pics", 25).unwrap().is_empty());
        grant.assert();
        hot.assert();
    }

    #[test]
    fn rate_limited_listing_returns_no_partial_results() {
        let mut server = Server::new();
        let _hot = server
            .mock("GET", "/r/pics/hot")
            .match_query(Matcher::Any)
            .with_status(429)
            .create();

        let pipeline = Pipeline::with_tokens(&config(&server, &[]), Arc::new(StaticToken)).unwrap();
        let err = pipeline
            .images("https://www.reddit.com/r/pics", 25)
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { retry_after: None }));
    }
}
