//! Story identity resolution: notification email → (story id, title).

pub mod http;
pub mod patterns;

use tracing::debug;

use crate::model::story::NewStory;
use crate::parser::notification::Notification;

use self::http::LinkResolver;
use self::patterns::{extract_title, first_url, strip_tags, SiteProfile, PLACEHOLDER_TITLE};

/// A story identified from one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub external_id: u64,
    pub title: String,
}

/// Turns notifications into story candidates.
///
/// Every failure (no link, unreachable link, link to somewhere else) is a
/// plain "nothing found"; nothing here returns an error.
pub struct StoryResolver<L> {
    site: SiteProfile,
    links: L,
}

impl<L: LinkResolver> StoryResolver<L> {
    pub fn new(site: SiteProfile, links: L) -> Self {
        Self { site, links }
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    /// Identify the story a notification is about.
    pub fn resolve(&self, notification: &Notification) -> Option<Candidate> {
        let title = notification
            .text
            .as_deref()
            .and_then(extract_title)
            .or_else(|| {
                let html = notification.html.as_deref()?;
                extract_title(&strip_tags(html))
            })
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

        let Some(url) = notification.bodies().find_map(first_url) else {
            debug!(subject = %notification.subject, "No link in notification");
            return None;
        };

        let landing = match self.links.final_url(url) {
            Ok(landing) => landing,
            Err(e) => {
                debug!(url, error = %e, "Could not follow notification link");
                return None;
            }
        };

        match self.site.story_id(&landing) {
            Some(external_id) => Some(Candidate { external_id, title }),
            None => {
                debug!(url, landing = %landing, "Link does not land on a chapter page");
                None
            }
        }
    }

    /// Build the record to store for a candidate.
    pub fn new_story(&self, candidate: Candidate) -> NewStory {
        NewStory {
            feed_url: self.site.feed_url(candidate.external_id),
            external_id: candidate.external_id,
            title: candidate.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::{Result, Rr2OpmlError};

    struct MapResolver(HashMap<&'static str, &'static str>);

    impl LinkResolver for MapResolver {
        fn final_url(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .map(|s| s.to_string())
                .ok_or_else(|| Rr2OpmlError::Connect {
                    host: url.to_string(),
                    reason: "unreachable".to_string(),
                })
        }
    }

    fn resolver() -> StoryResolver<MapResolver> {
        let mut links = HashMap::new();
        links.insert(
            "https://links.example/c/1",
            "https://site.example/fiction/42/example/chapter/9/ch-9",
        );
        links.insert("https://links.example/c/2", "https://site.example/forums/7");
        StoryResolver::new(
            SiteProfile::new("https://site.example").unwrap(),
            MapResolver(links),
        )
    }

    #[test]
    fn test_resolve_story() {
        let n = Notification::from_text(
            "Jo posted a new chapter of **Example Tale** titled Ch. 9\nhttps://links.example/c/1",
        );
        assert_eq!(
            resolver().resolve(&n),
            Some(Candidate {
                external_id: 42,
                title: "Example Tale".to_string()
            })
        );
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let n = Notification::from_text("Read now: https://links.example/c/1");
        assert_eq!(resolver().resolve(&n).unwrap().title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_link_found_in_html_part() {
        let n = Notification {
            subject: "New Chapter of Example Tale".to_string(),
            text: Some("Jo posted a new chapter of Example Tale titled Ch. 9".to_string()),
            html: Some("<a href=\"https://links.example/c/1\">Read</a>".to_string()),
        };
        let candidate = resolver().resolve(&n).unwrap();
        assert_eq!(candidate.external_id, 42);
        assert_eq!(candidate.title, "Example Tale");
    }

    #[test]
    fn test_html_only_title_has_no_markup() {
        let n = Notification {
            subject: "New Chapter of Example Tale".to_string(),
            text: None,
            html: Some(
                "<p>Jo posted a new chapter of <b>Example Tale</b> titled Ch. 9</p>\
                 <a href=\"https://links.example/c/1\">Read</a>"
                    .to_string(),
            ),
        };
        let candidate = resolver().resolve(&n).unwrap();
        assert_eq!(candidate.title, "Example Tale");
        assert_eq!(candidate.external_id, 42);
    }

    #[test]
    fn test_failures_yield_nothing() {
        let r = resolver();
        assert_eq!(r.resolve(&Notification::from_text("no link here")), None);
        assert_eq!(
            r.resolve(&Notification::from_text("https://links.example/broken")),
            None
        );
        assert_eq!(
            r.resolve(&Notification::from_text("https://links.example/c/2")),
            None
        );
        assert_eq!(r.resolve(&Notification::default()), None);
    }

    #[test]
    fn test_new_story_derives_feed_url() {
        let story = resolver().new_story(Candidate {
            external_id: 42,
            title: "Example Tale".to_string(),
        });
        assert_eq!(story.feed_url, "https://site.example/syndication/42");
        assert_eq!(story.external_id, 42);
    }
}
