//! JSON-file ledger of articles the monitor has already picked up.
//!
//! The file maps article URL to `{ "title", "timestamp" }` and is read and written whole.
//! Writes go to a temp file in the same directory and are renamed over the target, so a
//! crash mid-save leaves the previous state intact.
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use newsrant_common::{Article, NewsrantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub title: String,
    #[serde(rename = "timestamp", with = "timestamp")]
    pub first_seen_at: DateTime<Utc>,
}

/// In-memory view of the ledger, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenArticles {
    records: BTreeMap<String, SeenRecord>,
}

impl SeenArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<&SeenRecord> {
        self.records.get(url)
    }

    /// Record `article` as seen at `now`. Returns `false` if it was already present,
    /// in which case the original first-seen time is kept.
    pub fn mark_seen(&mut self, article: &Article, now: DateTime<Utc>) -> bool {
        if self.records.contains_key(&article.url) {
            return false;
        }
        self.records.insert(
            article.url.clone(),
            SeenRecord {
                title: article.title.clone(),
                first_seen_at: now,
            },
        );
        true
    }

    /// Drop records older than `ttl` (strictly). Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.records.len();
        self.records.retain(|_, rec| match (now - rec.first_seen_at).to_std() {
            Ok(age) => age <= ttl,
            // first seen in the future (clock moved back): keep
            Err(_) => true,
        });
        before - self.records.len()
    }
}

/// Location of the persisted ledger.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger. A missing file is an empty ledger; an unreadable or corrupt one
    /// is an error.
    pub fn load(&self) -> Result<SeenArticles> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store.load.missing");
                return Ok(SeenArticles::new());
            }
            Err(e) => {
                return Err(NewsrantError::Store(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let seen: SeenArticles = serde_json::from_str(&raw).map_err(|e| {
            NewsrantError::Store(format!("corrupt state file {}: {e}", self.path.display()))
        })?;
        info!(path = %self.path.display(), records = seen.len(), "store.loaded");
        Ok(seen)
    }

    /// Atomically replace the persisted ledger with `seen`.
    pub fn save(&self, seen: &SeenArticles) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, seen)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| NewsrantError::Io(e.error))?;

        debug!(path = %self.path.display(), records = seen.len(), "store.saved");
        Ok(())
    }
}

/// RFC 3339 on write; on read also accepts offset-less ISO-8601 in local time.
mod timestamp {
    use super::*;
    use serde::{de::Error, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("unrecognised timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
