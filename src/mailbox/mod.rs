//! The mailbox the notifications arrive in.
//!
//! [`Mailbox`] is the narrow session interface the sync step and watch
//! engine need. [`session::ImapMailbox`] implements it over IMAP with IDLE.

pub mod session;

use std::time::Duration;

use crate::config::SiteConfig;
use crate::error::Result;

/// Server-side id of a message within the selected folder.
pub type MessageId = u32;

/// Which unread messages count as notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFilter {
    /// Sender address the notifications come from.
    pub sender: String,
    /// Fragment of the subject line.
    pub subject: String,
}

impl NotificationFilter {
    pub fn from_config(site: &SiteConfig) -> Self {
        Self {
            sender: site.sender.clone(),
            subject: site.subject.clone(),
        }
    }

    /// IMAP SEARCH criteria for unread notifications.
    pub fn to_search_query(&self) -> String {
        format!(
            "UNSEEN SUBJECT {} FROM {}",
            quote(&self.subject),
            quote(&self.sender)
        )
    }
}

/// Quote a string for use as an IMAP search argument.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// One fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: MessageId,
    /// The complete RFC 5322 message.
    pub raw: Vec<u8>,
}

/// What a bounded wait observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSignal {
    /// The server reported a change to the folder.
    Changed,
    /// The poll interval elapsed without news.
    Quiet,
}

/// A logged-in session on the folder the notifications arrive in.
///
/// While a wait is outstanding the server accepts no other commands, so
/// callers must [`end_wait`](Mailbox::end_wait) before searching or fetching.
pub trait Mailbox {
    /// Ids of unread messages matching `filter`.
    fn search(&mut self, filter: &NotificationFilter) -> Result<Vec<MessageId>>;

    /// Full content of the given messages. Fetching marks them read.
    fn fetch(&mut self, ids: &[MessageId]) -> Result<Vec<FetchedMessage>>;

    /// Start waiting for changes (IMAP IDLE).
    fn begin_wait(&mut self) -> Result<()>;

    /// Block for at most `timeout` and report whether a change was signalled.
    fn poll_wait(&mut self, timeout: Duration) -> Result<WaitSignal>;

    /// Stop waiting. Must succeed when no wait is outstanding.
    fn end_wait(&mut self) -> Result<()>;
}
