//! Text patterns used to pull a story out of a notification.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::SiteConfig;
use crate::error::{Result, Rr2OpmlError};

/// Title used when the notification text does not name the story.
pub const PLACEHOLDER_TITLE: &str = "New Story";

/// "… posted a new chapter of **X** titled …"; the bold markers delimit the title.
static BOLD_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"posted a new chapter of \*\*(?P<title>.+?)\*\* titled ")
        .expect("valid bold title pattern")
});

/// "… posted a new chapter of X titled …"; the last " titled " on the line ends the title.
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"posted a new chapter of (?P<title>.*) titled ").expect("valid title pattern")
});

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url pattern"));

/// The story title named in a notification body, if there is one.
pub fn extract_title(body: &str) -> Option<String> {
    BOLD_TITLE_PATTERN
        .captures(body)
        .or_else(|| TITLE_PATTERN.captures(body))
        .map(|caps| caps["title"].trim().to_string())
        .filter(|title| !title.is_empty())
}

/// `html` with its markup removed and the common entities decoded.
pub fn strip_tags(html: &str) -> String {
    TAG_PATTERN
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// The first URL-shaped substring of `body`.
pub fn first_url(body: &str) -> Option<&str> {
    URL_PATTERN.find(body).map(|m| m.as_str())
}

/// URL layout of the serialized-fiction site.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    base_url: String,
    story_page: Regex,
}

impl SiteProfile {
    /// Build the profile for a site rooted at `base_url` (e.g. `https://www.royalroad.com`).
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Rr2OpmlError::Config("site.base_url is empty".to_string()));
        }
        // <base>/fiction/<id>/<slug>/chapter/<n>/<slug>
        let pattern = format!(
            r"^{}/fiction/(?P<id>\d+)/.*/chapter/\d+/.*",
            regex::escape(&base_url)
        );
        let story_page = Regex::new(&pattern)
            .map_err(|e| Rr2OpmlError::Config(format!("invalid site.base_url: {e}")))?;
        Ok(Self {
            base_url,
            story_page,
        })
    }

    pub fn from_config(site: &SiteConfig) -> Result<Self> {
        Self::new(&site.base_url)
    }

    /// The story id in a chapter page URL, if `url` is one.
    pub fn story_id(&self, url: &str) -> Option<u64> {
        self.story_page
            .captures(url)
            .and_then(|caps| caps["id"].parse().ok())
    }

    /// Syndication feed URL for a story. Always derivable from the id alone.
    pub fn feed_url(&self, external_id: u64) -> String {
        format!("{}/syndication/{}", self.base_url, external_id)
    }
}
