//! Maps one raw listing entry to a `(url, type)` pair.
//!
//! The listing API exposes media in several places depending on the post
//! type: the target url, `media.reddit_video`, the oembed block, and the
//! preview object. Each rule below reads one of those shapes. Rules are
//! tried in table order and the first hit wins, so higher-confidence
//! signals sit at the top.

use url::Url;

use crate::media::MediaType;
use crate::reddit::Post;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];
const GALLERY_MARKER: &str = "gallery";

struct EmbedHost {
    id: &'static str,
    domains: &'static [&'static str],
}

const EMBED_HOSTS: &[EmbedHost] = &[
    EmbedHost {
        id: "redgifs",
        domains: &["redgifs.com"],
    },
    EmbedHost {
        id: "gfycat",
        domains: &["gfycat.com"],
    },
    EmbedHost {
        id: "streamable",
        domains: &["streamable.com"],
    },
];

const PREVIEW_VIDEO_HINTS: &[&str] = &["rich:video", "link"];
const PREVIEW_VIDEO_DOMAINS: &[&str] = &[
    "imgur.com",
    "i.imgur.com",
    "giphy.com",
    "media.giphy.com",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub media_url: String,
    pub media_type: MediaType,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

struct Rule {
    name: &'static str,
    apply: fn(&Post) -> Option<(String, MediaType)>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "direct_image",
        apply: direct_image,
    },
    Rule {
        name: "hosted_video",
        apply: hosted_video,
    },
    Rule {
        name: "embed_host",
        apply: embed_host,
    },
    Rule {
        name: "preview_video",
        apply: preview_video,
    },
];

pub fn classify(post: &Post) -> Option<Classification> {
    RULES.iter().find_map(|rule| {
        let (url, media_type) = (rule.apply)(post)?;
        let media_url = clean_url(&url);
        if !is_absolute_http(&media_url) {
            return None;
        }
        Some(Classification {
            media_url,
            media_type,
            rule: rule.name,
        })
    })
}

fn direct_image(post: &Post) -> Option<(String, MediaType)> {
    if post.url.trim().is_empty() || post.url.contains(GALLERY_MARKER) {
        return None;
    }
    if post.post_hint == "image" || has_image_extension(&post.url) {
        return Some((post.url.clone(), MediaType::Image));
    }
    None
}

fn hosted_video(post: &Post) -> Option<(String, MediaType)> {
    if !post.is_video {
        return None;
    }
    [post.media.as_ref(), post.secure_media.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|media| media.reddit_video.as_ref())
        .map(|video| video.fallback_url.trim())
        .find(|url| !url.is_empty())
        .map(|url| (url.to_string(), MediaType::Video))
}

fn embed_host(post: &Post) -> Option<(String, MediaType)> {
    let host = EMBED_HOSTS.iter().find(|host| {
        host.domains
            .iter()
            .any(|domain| domain_matches(&post.domain, domain))
            || provider_name(post).is_some_and(|name| name.eq_ignore_ascii_case(host.id))
    })?;

    let embedded = post
        .secure_media_embed
        .as_ref()
        .map(|embed| embed.media_domain_url.trim())
        .filter(|url| !url.is_empty());
    let preview = preview_fallback(post).filter(|url| url.contains(host.id));
    let target = Some(post.url.trim()).filter(|url| !url.is_empty());

    embedded
        .or(preview)
        .or(target)
        .map(|url| (url.to_string(), MediaType::Embed))
}

fn preview_video(post: &Post) -> Option<(String, MediaType)> {
    if !PREVIEW_VIDEO_HINTS.contains(&post.post_hint.as_str()) {
        return None;
    }
    let domain = post.domain.to_ascii_lowercase();
    if !PREVIEW_VIDEO_DOMAINS.contains(&domain.as_str()) {
        return None;
    }
    preview_fallback(post).map(|url| (url.to_string(), MediaType::Video))
}

fn provider_name(post: &Post) -> Option<&str> {
    [post.secure_media.as_ref(), post.media.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|media| media.oembed.as_ref())
        .map(|oembed| oembed.provider_name.trim())
        .find(|name| !name.is_empty())
}

fn preview_fallback(post: &Post) -> Option<&str> {
    post.preview
        .as_ref()
        .and_then(|preview| preview.reddit_video_preview.as_ref())
        .map(|video| video.fallback_url.trim())
        .filter(|url| !url.is_empty())
}

fn domain_matches(domain: &str, expected: &str) -> bool {
    let domain = domain.trim().to_ascii_lowercase();
    domain == expected
        || domain
            .strip_suffix(expected)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn has_image_extension(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    // query strings like `?width=640` must not hide the extension
    let path = url.path().to_ascii_lowercase();
    let full = raw.trim().to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext) || full.ends_with(ext))
}

fn is_absolute_http(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn clean_url(raw: &str) -> String {
    raw.trim().replace("&amp;", "&")
}
