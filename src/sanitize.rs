use std::collections::BTreeSet;

use tracing::debug;
use url::Url;

use crate::media::{MediaPost, MediaType};

/// Hosts reddit itself serves images from.
pub const DEFAULT_IMAGE_HOSTS: &[&str] = &["i.redd.it", "preview.redd.it", "i.imgur.com"];

/// Closed set of hostnames a final image link may point at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedHosts {
    hosts: BTreeSet<String>,
}

impl AllowedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| host.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();
        Self { hosts }
    }

    /// The built-in hosts plus whatever the image configuration declares.
    pub fn with_defaults<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = Self::new(DEFAULT_IMAGE_HOSTS);
        allowed.hosts.extend(Self::new(extra).hosts);
        allowed
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }
}

/// Keeps image posts whose url is http(s) on an allowed host. Order is preserved.
pub fn filter(posts: Vec<MediaPost>, allowed: &AllowedHosts) -> Vec<MediaPost> {
    posts
        .into_iter()
        .filter(|post| match rejection(post, allowed) {
            Some(reason) => {
                debug!(url = %post.media_url, reason, "dropping media post");
                false
            }
            None => true,
        })
        .collect()
}

fn rejection(post: &MediaPost, allowed: &AllowedHosts) -> Option<&'static str> {
    if post.media_type != MediaType::Image {
        return Some("not an image");
    }
    let url = match Url::parse(&post.media_url) {
        Ok(url) => url,
        Err(_) => return Some("unparseable url"),
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Some("scheme not allowed");
    }
    match url.host_str() {
        Some(host) if allowed.contains(host) => None,
        _ => Some("host not allowed"),
    }
}
