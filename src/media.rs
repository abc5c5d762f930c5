use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Embed,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Embed => "embed",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified post. Within a single fetch no two posts share `media_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPost {
    pub media_url: String,
    pub media_type: MediaType,
    pub title: String,
    pub source_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_type_in_lowercase() {
        let post = MediaPost {
            media_url: "https://i.redd.it/abc.jpg".into(),
            media_type: MediaType::Image,
            title: "A cat".into(),
            source_url: "https://www.reddit.com/r/cats/comments/abc/a_cat/".into(),
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["media_type"], "image");
        assert_eq!(value["media_url"], "https://i.redd.it/abc.jpg");
    }
}
