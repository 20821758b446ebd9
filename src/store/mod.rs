//! Persistent story storage.

pub mod stories;
