//! Reconciliation engine.
//!
//! One run for one identifier:
//!
//! 1. read the checkpoint and the full local log, project it
//! 2. fetch the remote snapshot and the update feed since the checkpoint
//! 3. [`plan_run`] picks the path and builds the batch (pure)
//! 4. commit the batch and the new checkpoint in one transaction
//!
//! A failure anywhere before step 4 leaves the store untouched; a failure in
//! step 4 rolls back the whole batch. The caller reruns the identifier later.

pub mod decide;
pub mod diff;
pub mod incremental;

pub use decide::{FullReason, SyncPath, decide_path};
pub use diff::{clean_snapshot, full_diff};
pub use incremental::incremental_batch;

use std::time::Instant;

use serde::Serialize;

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::error::ErrorCode;
use crate::event::{ClaimEvent, ClaimStatus, NewClaimEvent};
use crate::fetch::{FetchError, RemoteFetcher, Snapshot, UpdateFeed};
use crate::projection::{ProjectedState, project};
use crate::store::{ClaimLedger, StoreError};

/// Failure of one reconciliation run. Nothing from a failed run is visible.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("fetch for {identifier} failed")]
    Fetch {
        identifier: String,
        #[source]
        source: FetchError,
    },

    #[error("identifier {identifier} is unknown to the remote authority")]
    NotFound { identifier: String },

    #[error("commit for {identifier} failed")]
    Commit {
        identifier: String,
        #[source]
        source: StoreError,
    },

    #[error("reading local state of {identifier} failed")]
    Storage {
        identifier: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    fn from_fetch(identifier: &str, source: FetchError) -> Self {
        match source {
            FetchError::NotFound { .. } => Self::NotFound {
                identifier: identifier.to_string(),
            },
            FetchError::Transient { .. } => Self::Fetch {
                identifier: identifier.to_string(),
                source,
            },
        }
    }

    fn storage(identifier: &str, source: StoreError) -> Self {
        Self::Storage {
            identifier: identifier.to_string(),
            source,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Fetch { .. } => ErrorCode::RemoteUnavailable,
            Self::NotFound { .. } => ErrorCode::IdentifierNotFound,
            Self::Commit { .. } => ErrorCode::CommitFailed,
            Self::Storage { .. } => ErrorCode::StorageReadFailed,
        }
    }

    /// Whether rerunning the identifier later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Fetch { identifier, .. }
            | Self::NotFound { identifier }
            | Self::Commit { identifier, .. }
            | Self::Storage { identifier, .. } => identifier,
        }
    }
}

/// What a run intends to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub path: SyncPath,
    /// Batch to append, in order.
    pub events: Vec<NewClaimEvent>,
    /// Checkpoint to store with the batch.
    pub checkpoint: Timestamp,
}

/// Everything [`plan_run`] needs, already fetched and read.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub identifier: &'a str,
    /// Provenance label for anchors and engine-derived entries.
    pub engine: &'a str,
    pub local: &'a ProjectedState,
    pub checkpoint: Option<Timestamp>,
    pub snapshot: &'a Snapshot,
    pub feed: &'a UpdateFeed,
    /// Logical "now" for removals found by a full diff.
    pub now: Timestamp,
}

/// Decide the path and build the batch for one run. No I/O.
#[must_use]
pub fn plan_run(input: PlanInput<'_>) -> RunPlan {
    let path = decide_path(
        input.checkpoint,
        input.local.generation,
        input.snapshot.generation,
    );

    let events = match (path, input.checkpoint) {
        (SyncPath::Incremental, Some(since)) => {
            incremental_batch(input.identifier, input.local, since, input.feed)
        }
        _ => full_diff(
            input.identifier,
            input.engine,
            input.local,
            input.snapshot,
            input.now,
        ),
    };

    if let Some(previous) = input.checkpoint {
        if input.feed.as_of < previous {
            tracing::warn!(
                identifier = input.identifier,
                previous = %previous,
                as_of = %input.feed.as_of,
                "update feed reports an as-of time before the stored checkpoint"
            );
        }
    }

    RunPlan {
        path,
        events,
        checkpoint: input.feed.as_of,
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub identifier: String,
    pub path: SyncPath,
    /// Events appended by this run, with their sequences.
    pub appended: Vec<ClaimEvent>,
    pub checkpoint_before: Option<Timestamp>,
    pub checkpoint_after: Timestamp,
}

impl RunReport {
    /// Number of appended events with `status`.
    #[must_use]
    pub fn count(&self, status: ClaimStatus) -> usize {
        self.appended.iter().filter(|e| e.status == status).count()
    }

    #[must_use]
    pub fn checkpoint_advanced(&self) -> bool {
        self.checkpoint_before != Some(self.checkpoint_after)
    }
}

/// Runs reconciliations, labelling derived entries with the engine name.
#[derive(Debug, Clone)]
pub struct Reconciler<C = SystemClock> {
    engine: String,
    clock: C,
}

impl Reconciler<SystemClock> {
    #[must_use]
    pub fn new(engine: impl Into<String>) -> Self {
        Self::with_clock(engine, SystemClock)
    }
}

impl<C: Clock> Reconciler<C> {
    #[must_use]
    pub fn with_clock(engine: impl Into<String>, clock: C) -> Self {
        Self {
            engine: engine.into(),
            clock,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Reconcile `identifier` against the remote.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Storage`] if the local log or checkpoint can't be read
    /// - [`ReconcileError::NotFound`] / [`ReconcileError::Fetch`] on fetch failure
    /// - [`ReconcileError::Commit`] if the batch could not be committed
    pub fn run<F, L>(
        &self,
        identifier: &str,
        fetcher: &F,
        ledger: &mut L,
    ) -> Result<RunReport, ReconcileError>
    where
        F: RemoteFetcher + ?Sized,
        L: ClaimLedger + ?Sized,
    {
        let start = Instant::now();

        let checkpoint = ledger
            .checkpoint(identifier)
            .map_err(|e| ReconcileError::storage(identifier, e))?;
        let log = ledger
            .read_all(identifier)
            .map_err(|e| ReconcileError::storage(identifier, e))?;
        let local = project(&log);

        let snapshot = fetcher
            .fetch_snapshot(identifier)
            .map_err(|e| ReconcileError::from_fetch(identifier, e))?;
        let feed = fetcher
            .fetch_updates_since(identifier, checkpoint)
            .map_err(|e| ReconcileError::from_fetch(identifier, e))?;

        let plan = plan_run(PlanInput {
            identifier,
            engine: &self.engine,
            local: &local,
            checkpoint,
            snapshot: &snapshot,
            feed: &feed,
            now: self.clock.now(),
        });

        tracing::debug!(
            identifier,
            path = %plan.path,
            local_events = log.len(),
            local_active = local.active.len(),
            remote_claims = snapshot.claims.len(),
            feed_events = feed.events.len(),
            "planned reconciliation"
        );

        let appended = if plan.events.is_empty() && checkpoint == Some(plan.checkpoint) {
            Vec::new()
        } else {
            ledger
                .commit(identifier, &plan.events, Some(plan.checkpoint))
                .map_err(|source| ReconcileError::Commit {
                    identifier: identifier.to_string(),
                    source,
                })?
        };

        let report = RunReport {
            identifier: identifier.to_string(),
            path: plan.path,
            appended,
            checkpoint_before: checkpoint,
            checkpoint_after: plan.checkpoint,
        };

        tracing::info!(
            identifier,
            path = %report.path,
            claimed = report.count(ClaimStatus::Claimed),
            removed = report.count(ClaimStatus::Removed),
            unchanged = report.count(ClaimStatus::Unchanged),
            checkpoint = %report.checkpoint_after,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "reconciled"
        );

        Ok(report)
    }
}
