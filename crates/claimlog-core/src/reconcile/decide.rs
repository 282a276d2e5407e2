//! Fast-path vs full-diff decision.

use std::fmt;

use serde::Serialize;

use crate::clock::Timestamp;

/// Why a run fell back to a full reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FullReason {
    /// No usable checkpoint is stored for the identifier.
    NoCheckpoint,
    /// The log holds no anchor, so there is no local generation to compare.
    NoLocalGeneration,
    /// The latest anchor does not carry the remote snapshot's generation.
    GenerationDrift { local: Timestamp, remote: Timestamp },
}

impl fmt::Display for FullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCheckpoint => f.write_str("no checkpoint"),
            Self::NoLocalGeneration => f.write_str("no local generation"),
            Self::GenerationDrift { local, remote } => {
                write!(f, "generation drift (local {local}, remote {remote})")
            }
        }
    }
}

/// Which reconciliation path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPath {
    /// Apply the update feed on top of the local state.
    Incremental,
    /// Diff the full snapshot against the local state and write a new anchor.
    Full(FullReason),
}

impl SyncPath {
    #[must_use]
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::Full(reason) => write!(f, "full ({reason})"),
        }
    }
}

/// Pick the path for one run.
///
/// The fast path needs a checkpoint and a local generation equal to the
/// remote one to the microsecond. Anything else is a full pass.
#[must_use]
pub fn decide_path(
    checkpoint: Option<Timestamp>,
    local_generation: Option<Timestamp>,
    remote_generation: Timestamp,
) -> SyncPath {
    if checkpoint.is_none() {
        return SyncPath::Full(FullReason::NoCheckpoint);
    }
    match local_generation {
        None => SyncPath::Full(FullReason::NoLocalGeneration),
        Some(local) if local != remote_generation => {
            SyncPath::Full(FullReason::GenerationDrift {
                local,
                remote: remote_generation,
            })
        }
        Some(_) => SyncPath::Incremental,
    }
}
