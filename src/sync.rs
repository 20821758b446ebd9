//! One pass of "absorb whatever new notifications are waiting".

use tracing::{debug, info};

use crate::error::Result;
use crate::mailbox::{Mailbox, NotificationFilter};
use crate::parser::notification::parse_notification;
use crate::resolver::http::LinkResolver;
use crate::resolver::StoryResolver;
use crate::store::stories::StoryStore;

/// What one sync pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Unread notifications fetched.
    pub examined: usize,
    /// Notifications that did not lead to a story.
    pub unresolved: usize,
    /// Notifications for stories already in the store.
    pub known: usize,
    /// Stories added to the store.
    pub inserted: usize,
}

impl SyncReport {
    /// Whether the outline needs regenerating.
    pub fn has_new(&self) -> bool {
        self.inserted > 0
    }
}

/// Fetch unread notifications and store every story not seen before.
///
/// Messages are marked read by the fetch itself. A notification that does
/// not resolve is not retried later.
///
/// The mailbox must not be in a wait when this is called.
pub fn sync_once<M, L>(
    mailbox: &mut M,
    filter: &NotificationFilter,
    resolver: &StoryResolver<L>,
    store: &StoryStore,
) -> Result<SyncReport>
where
    M: Mailbox + ?Sized,
    L: LinkResolver,
{
    let ids = mailbox.search(filter)?;
    let mut report = SyncReport::default();
    if ids.is_empty() {
        debug!("No unread notifications");
        return Ok(report);
    }

    let messages = mailbox.fetch(&ids)?;
    report.examined = messages.len();

    for message in messages {
        let notification = parse_notification(&message.raw);
        let Some(candidate) = resolver.resolve(&notification) else {
            debug!(id = message.id, subject = %notification.subject, "Notification did not resolve");
            report.unresolved += 1;
            continue;
        };

        if let Some(existing) = store.lookup(candidate.external_id)? {
            debug!(
                external_id = candidate.external_id,
                id = existing,
                "Story already known"
            );
            report.known += 1;
            continue;
        }

        let story = resolver.new_story(candidate);
        let id = store.insert(&story)?;
        info!(
            id,
            external_id = story.external_id,
            title = %story.title,
            "Discovered new story"
        );
        report.inserted += 1;
    }

    info!(
        examined = report.examined,
        inserted = report.inserted,
        known = report.known,
        unresolved = report.unresolved,
        "Sync finished"
    );
    Ok(report)
}
