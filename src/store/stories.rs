//! Story store: the durable set of known stories, keyed by site story id.
//!
//! The store does not enforce one row per story id on its own. Callers check
//! [`StoryStore::lookup`] before [`StoryStore::insert`]; the watch engine is
//! the only writer, so nothing interleaves between the two.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Result, Rr2OpmlError};
use crate::model::story::{NewStory, Story};

// Column names match databases written by earlier releases.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stories (
    story_id     INTEGER PRIMARY KEY,
    royalroad_id INTEGER NOT NULL,
    title        TEXT NOT NULL,
    feed_url     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stories_royalroad_id ON stories (royalroad_id);
";

/// Where the database lives, parsed from the `storage.database` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`,
    /// `sqlite://path.db`, `:memory:`, or a bare path.
    pub fn parse(setting: &str) -> Result<Self> {
        let setting = setting.trim();
        let path = match setting.strip_prefix("sqlite:") {
            Some(rest) => rest
                .strip_prefix("///")
                .or_else(|| rest.strip_prefix("//"))
                .unwrap_or(rest),
            None => setting,
        };
        match path {
            "" => Err(Rr2OpmlError::Config("storage.database is empty".to_string())),
            ":memory:" => Ok(Self::Memory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

/// SQLite-backed story store.
pub struct StoryStore {
    conn: Connection,
}

impl StoryStore {
    /// Open the store described by a `storage.database` setting.
    pub fn open(setting: &str) -> Result<Self> {
        match DatabaseLocation::parse(setting)? {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open_path(&path),
        }
    }

    /// Open (or create) a database file. Creates the schema if absent.
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Rr2OpmlError::io(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        info!(path = %path.display(), "Opened story store");
        Ok(store)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create tables and indexes. Idempotent.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Row id of the story with this site id, if one is stored.
    pub fn lookup(&self, external_id: u64) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT story_id FROM stories WHERE royalroad_id = ?1 ORDER BY story_id LIMIT 1",
                params![external_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Persist a new story and return its row id.
    pub fn insert(&self, story: &NewStory) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO stories (royalroad_id, title, feed_url) VALUES (?1, ?2, ?3)",
            params![story.external_id as i64, story.title, story.feed_url],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, external_id = story.external_id, "Inserted story");
        Ok(id)
    }

    /// Every stored story, in insertion order.
    pub fn all(&self) -> Result<Vec<Story>> {
        let mut stmt = self.conn.prepare(
            "SELECT story_id, royalroad_id, title, feed_url FROM stories ORDER BY story_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Story {
                id: row.get(0)?,
                external_id: row.get::<_, i64>(1)? as u64,
                title: row.get(2)?,
                feed_url: row.get(3)?,
            })
        })?;
        let stories = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stories)
    }

    /// Number of stored stories.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
