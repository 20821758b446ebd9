//! Export functionality: the OPML subscription list.

pub mod opml;
