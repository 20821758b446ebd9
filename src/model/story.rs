//! Story records held by the dedup store.

/// A story as persisted in the store.
///
/// Records are created once, when a notification first mentions the story,
/// and are never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    /// Row id assigned by the store on insertion.
    pub id: i64,

    /// Numeric id the site embeds in its story URLs.
    pub external_id: u64,

    /// Title from the first notification seen for this story.
    pub title: String,

    /// Syndication feed URL, derived from `external_id`.
    pub feed_url: String,
}

/// A story that has been resolved from a notification but not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub external_id: u64,
    pub title: String,
    pub feed_url: String,
}
