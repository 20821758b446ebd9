//! Core data model types for discovered stories.

pub mod story;
