//! Directory-backed fetcher for offline runs and tests.
//!
//! Layout, one pair of files per identifier:
//!
//! ```text
//! <dir>/<identifier>.snapshot.json   # Snapshot JSON
//! <dir>/<identifier>.updates.json    # UpdateFeed JSON
//! ```
//!
//! A missing file means the identifier is unknown. The update feed is
//! filtered to events strictly after `since`, like a live feed would be.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{FetchError, RemoteFetcher, Snapshot, UpdateFeed};
use crate::clock::Timestamp;

/// Serves snapshots and update feeds from JSON files.
#[derive(Debug, Clone)]
pub struct FixtureFetcher {
    dir: PathBuf,
}

impl FixtureFetcher {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `identifier`.
    #[must_use]
    pub fn snapshot_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.snapshot.json"))
    }

    /// Path of the update feed file for `identifier`.
    #[must_use]
    pub fn updates_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.updates.json"))
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        identifier: &str,
        path: &Path,
    ) -> Result<T, FetchError> {
        if identifier.is_empty()
            || identifier.contains(['/', '\\'])
            || identifier.starts_with('.')
        {
            return Err(FetchError::not_found(identifier));
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FetchError::not_found(identifier));
            }
            Err(err) => {
                return Err(FetchError::transient(
                    identifier,
                    format!("read {}: {err}", path.display()),
                ));
            }
        };

        serde_json::from_str(&content).map_err(|err| {
            FetchError::transient(identifier, format!("parse {}: {err}", path.display()))
        })
    }
}

impl RemoteFetcher for FixtureFetcher {
    fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        self.read_json(identifier, &self.snapshot_path(identifier))
    }

    fn fetch_updates_since(
        &self,
        identifier: &str,
        since: Option<Timestamp>,
    ) -> Result<UpdateFeed, FetchError> {
        let mut feed: UpdateFeed = self.read_json(identifier, &self.updates_path(identifier))?;
        if let Some(since) = since {
            feed.events.retain(|event| event.occurred_at > since);
        }
        Ok(feed)
    }
}
