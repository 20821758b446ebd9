//! Network-free stand-ins shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rr2opml::error::{Result, Rr2OpmlError};
use rr2opml::mailbox::{FetchedMessage, Mailbox, MessageId, NotificationFilter, WaitSignal};
use rr2opml::resolver::http::LinkResolver;
use rr2opml::resolver::patterns::SiteProfile;
use rr2opml::resolver::StoryResolver;
use rr2opml::watch::ManualClock;

pub const SITE: &str = "https://site.example";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A plain-text notification for `title` linking to `link`.
pub fn notification(title: &str, link: &str) -> Vec<u8> {
    format!(
        "From: Royal Road <noreply@royalroad.com>\r\n\
         To: reader@example.com\r\n\
         Subject: New Chapter of {title}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Jo Quill has just posted a new chapter of **{title}** titled Ch. 9\r\n\
         \r\n\
         Read it here: {link}\r\n"
    )
    .into_bytes()
}

/// Tracking link for story `id` and where it redirects to.
pub fn link_for(id: u64) -> (String, String) {
    (
        format!("https://links.site.example/ls/click?upn={id}"),
        format!("{SITE}/fiction/{id}/some-story/chapter/9/ch-9"),
    )
}

/// What the next `poll_wait` does.
pub enum WaitEvent {
    /// Nothing happens for the whole poll slice.
    Quiet,
    /// A message arrives and the server reports it.
    Arrive(Vec<u8>),
    /// The server answers with a protocol error.
    Fail(&'static str),
    /// The connection drops.
    Disconnect,
}

/// In-memory mailbox with scripted wait events.
///
/// Quiet polls advance the shared clock by the requested timeout. Search or
/// fetch during an outstanding wait is an error, as it is on a real server.
pub struct FakeMailbox {
    messages: Vec<(MessageId, Vec<u8>, bool)>,
    events: VecDeque<WaitEvent>,
    clock: ManualClock,
    search_failures: VecDeque<&'static str>,
    fetch_failures: VecDeque<&'static str>,
    pub waiting: bool,
    pub searches: usize,
    pub begin_waits: usize,
    pub end_waits: usize,
    pub polls: usize,
}

impl FakeMailbox {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            messages: Vec::new(),
            events: VecDeque::new(),
            clock,
            search_failures: VecDeque::new(),
            fetch_failures: VecDeque::new(),
            waiting: false,
            searches: 0,
            begin_waits: 0,
            end_waits: 0,
            polls: 0,
        }
    }

    pub fn deliver(&mut self, raw: Vec<u8>) {
        let id = self.messages.len() as MessageId + 1;
        self.messages.push((id, raw, false));
    }

    pub fn script(&mut self, events: impl IntoIterator<Item = WaitEvent>) {
        self.events.extend(events);
    }

    /// Make the next search answer `NO reason`.
    pub fn fail_next_search(&mut self, reason: &'static str) {
        self.search_failures.push_back(reason);
    }

    /// Make the next fetch answer `NO reason`.
    pub fn fail_next_fetch(&mut self, reason: &'static str) {
        self.fetch_failures.push_back(reason);
    }

    pub fn unseen(&self) -> usize {
        self.messages.iter().filter(|(_, _, seen)| !seen).count()
    }
}

fn refused(reason: &str) -> Rr2OpmlError {
    Rr2OpmlError::Protocol(imap::Error::No(reason.to_string()))
}

fn busy() -> Rr2OpmlError {
    Rr2OpmlError::Protocol(imap::Error::Bad("command issued during IDLE".to_string()))
}

impl Mailbox for FakeMailbox {
    fn search(&mut self, _filter: &NotificationFilter) -> Result<Vec<MessageId>> {
        if self.waiting {
            return Err(busy());
        }
        if let Some(reason) = self.search_failures.pop_front() {
            return Err(refused(reason));
        }
        self.searches += 1;
        Ok(self
            .messages
            .iter()
            .filter(|(_, _, seen)| !seen)
            .map(|(id, _, _)| *id)
            .collect())
    }

    fn fetch(&mut self, ids: &[MessageId]) -> Result<Vec<FetchedMessage>> {
        if self.waiting {
            return Err(busy());
        }
        if let Some(reason) = self.fetch_failures.pop_front() {
            return Err(refused(reason));
        }
        let mut fetched = Vec::new();
        for (id, raw, seen) in &mut self.messages {
            if ids.contains(id) {
                *seen = true;
                fetched.push(FetchedMessage {
                    id: *id,
                    raw: raw.clone(),
                });
            }
        }
        Ok(fetched)
    }

    fn begin_wait(&mut self) -> Result<()> {
        self.begin_waits += 1;
        self.waiting = true;
        Ok(())
    }

    fn poll_wait(&mut self, timeout: Duration) -> Result<WaitSignal> {
        self.polls += 1;
        match self.events.pop_front().unwrap_or(WaitEvent::Quiet) {
            WaitEvent::Quiet => {
                self.clock.advance(timeout);
                Ok(WaitSignal::Quiet)
            }
            WaitEvent::Arrive(raw) => {
                self.deliver(raw);
                Ok(WaitSignal::Changed)
            }
            WaitEvent::Fail(reason) => Err(refused(reason)),
            WaitEvent::Disconnect => Err(Rr2OpmlError::Protocol(imap::Error::ConnectionLost)),
        }
    }

    fn end_wait(&mut self) -> Result<()> {
        self.end_waits += 1;
        self.waiting = false;
        Ok(())
    }
}

/// Redirect table standing in for HTTP.
#[derive(Default)]
pub struct MapLinks(HashMap<String, String>);

impl MapLinks {
    pub fn with(mut self, from: &str, to: &str) -> Self {
        self.0.insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_story(self, id: u64) -> Self {
        let (from, to) = link_for(id);
        self.with(&from, &to)
    }
}

impl LinkResolver for MapLinks {
    fn final_url(&self, url: &str) -> Result<String> {
        self.0.get(url).cloned().ok_or_else(|| Rr2OpmlError::Connect {
            host: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

pub fn resolver(links: MapLinks) -> StoryResolver<MapLinks> {
    StoryResolver::new(SiteProfile::new(SITE).unwrap(), links)
}

pub fn filter() -> NotificationFilter {
    NotificationFilter {
        sender: "noreply@royalroad.com".to_string(),
        subject: "New Chapter of".to_string(),
    }
}
