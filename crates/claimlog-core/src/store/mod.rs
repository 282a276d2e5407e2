//! Claims log and checkpoint store.
//!
//! [`ClaimLedger`] is the only storage surface the engine sees: read the full
//! log of an identifier, read its checkpoint, and commit a batch together with
//! a new checkpoint. There is no update or delete.
//!
//! [`SqliteLedger`] implements it on one SQLite connection. Runtime pragmas
//! follow the usual defaults:
//! - `journal_mode = WAL` so readers don't block the committing writer
//! - `busy_timeout = 5s` to ride out short lock contention between processes
//! - `foreign_keys = ON`

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params, types::Type};

use crate::clock::Timestamp;
use crate::error::ErrorCode;
use crate::event::{ClaimEvent, ClaimStatus, NewClaimEvent};

/// Busy timeout used for claims DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix of checkpoint keys in `key_value`.
pub const CHECKPOINT_KEY_PREFIX: &str = "last.check";

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("open claims database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("migrate claims database: {0}")]
    Migrate(#[source] rusqlite::Error),

    #[error("read claims log: {0}")]
    Read(#[source] rusqlite::Error),

    /// The batch was rolled back; nothing from it is visible.
    #[error("commit claims batch: {0}")]
    Commit(#[source] rusqlite::Error),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CreateDir { .. } | Self::Open { .. } | Self::Migrate(_) | Self::Read(_) => {
                ErrorCode::StorageReadFailed
            }
            Self::Commit(_) => ErrorCode::CommitFailed,
        }
    }
}

/// Event log plus checkpoint store for claim identifiers.
pub trait ClaimLedger {
    /// Every event of `identifier`, ascending by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the log cannot be read.
    fn read_all(&self, identifier: &str) -> Result<Vec<ClaimEvent>, StoreError>;

    /// Last synced time of `identifier`, if a usable checkpoint exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the store cannot be read.
    fn checkpoint(&self, identifier: &str) -> Result<Option<Timestamp>, StoreError>;

    /// Append `batch` in order and, when `checkpoint` is set, store it, all in
    /// one transaction. Returns the appended events with their sequences.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Commit`] if anything fails; the whole batch and
    /// the checkpoint are rolled back.
    fn commit(
        &mut self,
        identifier: &str,
        batch: &[NewClaimEvent],
        checkpoint: Option<Timestamp>,
    ) -> Result<Vec<ClaimEvent>, StoreError>;

    /// Append without touching the checkpoint (writers other than the engine).
    ///
    /// # Errors
    ///
    /// Same as [`ClaimLedger::commit`].
    fn append(
        &mut self,
        identifier: &str,
        batch: &[NewClaimEvent],
    ) -> Result<Vec<ClaimEvent>, StoreError> {
        self.commit(identifier, batch, None)
    }
}

/// Key under which the checkpoint of `identifier` is stored.
#[must_use]
pub fn checkpoint_key(identifier: &str) -> String {
    format!("{CHECKPOINT_KEY_PREFIX}:{identifier}")
}

/// SQLite-backed [`ClaimLedger`].
#[derive(Debug)]
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open (or create) the claims database, apply runtime pragmas, and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if creating/opening/configuring/migrating fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        configure_connection(&conn).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_connection(conn)
    }

    /// Fresh in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create or migrate it.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, migrating it first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migrate`] if migrations fail.
    pub fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&mut conn).map_err(StoreError::Migrate)?;
        Ok(Self { conn })
    }

    /// The underlying connection, for ad-hoc inspection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Distinct identifiers present in the log, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn identifiers(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT identifier FROM claims_log ORDER BY identifier")
            .map_err(StoreError::Read)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::Read)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Read)
    }

    /// History of one subject under `identifier`, ascending by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the query fails.
    pub fn subject_history(
        &self,
        identifier: &str,
        subject: &str,
    ) -> Result<Vec<ClaimEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, identifier, subject, status, occurred_at_us, provenance
                 FROM claims_log
                 WHERE identifier = ?1 AND subject = ?2
                 ORDER BY id ASC",
            )
            .map_err(StoreError::Read)?;
        let rows = stmt
            .query_map(params![identifier, subject], row_to_event)
            .map_err(StoreError::Read)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Read)
    }
}

impl ClaimLedger for SqliteLedger {
    fn read_all(&self, identifier: &str) -> Result<Vec<ClaimEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, identifier, subject, status, occurred_at_us, provenance
                 FROM claims_log
                 WHERE identifier = ?1
                 ORDER BY id ASC",
            )
            .map_err(StoreError::Read)?;
        let rows = stmt
            .query_map([identifier], row_to_event)
            .map_err(StoreError::Read)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Read)
    }

    fn checkpoint(&self, identifier: &str) -> Result<Option<Timestamp>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM key_value WHERE key = ?1",
                [checkpoint_key(identifier)],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Read)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        match Timestamp::parse(&raw) {
            Ok(ts) => Ok(Some(ts)),
            Err(err) => {
                tracing::warn!(
                    identifier,
                    value = %raw,
                    error = %err,
                    "ignoring unparseable checkpoint"
                );
                Ok(None)
            }
        }
    }

    fn commit(
        &mut self,
        identifier: &str,
        batch: &[NewClaimEvent],
        checkpoint: Option<Timestamp>,
    ) -> Result<Vec<ClaimEvent>, StoreError> {
        let tx = self.conn.transaction().map_err(StoreError::Commit)?;
        let mut appended = Vec::with_capacity(batch.len());

        {
            let mut insert = tx
                .prepare_cached(
                    "INSERT INTO claims_log (identifier, subject, status, occurred_at_us, provenance)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(StoreError::Commit)?;

            for event in batch {
                insert
                    .execute(params![
                        identifier,
                        event.subject,
                        event.status.as_str(),
                        event.occurred_at.as_micros(),
                        event.provenance,
                    ])
                    .map_err(StoreError::Commit)?;
                let sequence = tx.last_insert_rowid();
                appended.push(event.clone().into_event(identifier, sequence));
            }
        }

        if let Some(checkpoint) = checkpoint {
            tx.execute(
                "INSERT INTO key_value (key, value, updated_at_us) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at_us = excluded.updated_at_us",
                params![
                    checkpoint_key(identifier),
                    checkpoint.to_rfc3339(),
                    Timestamp::now().as_micros()
                ],
            )
            .map_err(StoreError::Commit)?;
        }

        tx.commit().map_err(StoreError::Commit)?;

        tracing::debug!(
            identifier,
            appended = appended.len(),
            checkpoint = ?checkpoint.map(Timestamp::to_rfc3339),
            "committed claims batch"
        );

        Ok(appended)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClaimEvent> {
    let status_raw: String = row.get(3)?;
    let status: ClaimStatus = status_raw
        .parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;

    Ok(ClaimEvent {
        sequence: row.get(0)?,
        identifier: row.get(1)?,
        subject: row.get(2)?,
        status,
        occurred_at: Timestamp::from_micros(row.get(4)?),
        provenance: row.get(5)?,
    })
}
