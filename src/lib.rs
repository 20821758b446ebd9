//! `rr2opml`: turns serialized-fiction "new chapter" emails into an OPML
//! subscription list.
//!
//! Notifications are read from an IMAP folder, resolved to story ids by
//! following their links, deduplicated in SQLite, and written out as OPML
//! whenever a new story shows up. [`watch::WatchEngine`] keeps doing this
//! on top of IMAP IDLE.

pub mod config;
pub mod error;
pub mod export;
pub mod fsutil;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod watch;
