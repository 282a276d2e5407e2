//! Claim event data model for the claims log.
//!
//! A [`ClaimEvent`] is one immutable row of the append-only log. The engine
//! builds [`NewClaimEvent`]s; the log assigns `sequence` when it appends them.
//!
//! # Ordering
//!
//! `sequence` is the only ordering that matters. `occurred_at` is whatever
//! time the source reported (a remote claim date, or a snapshot generation
//! for anchors) and may go backwards between consecutive rows.

pub mod types;

pub use types::{ClaimStatus, UnknownClaimStatus};

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// A single appended entry of the claims log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvent {
    /// Log-assigned, strictly increasing position. Never reused.
    pub sequence: i64,

    /// The external authority's subject-of-truth key (e.g. an ORCID iD).
    pub identifier: String,

    /// The claimed entity (e.g. a bibcode). Empty for anchors.
    pub subject: String,

    pub status: ClaimStatus,

    /// Source-supplied time of the event.
    pub occurred_at: Timestamp,

    /// Origin label. `None` when a foreign writer did not supply one.
    pub provenance: Option<String>,
}

impl ClaimEvent {
    /// `true` for full-reconciliation anchors.
    #[must_use]
    pub fn is_anchor(&self) -> bool {
        self.status == ClaimStatus::ImportAnchor
    }
}

/// An event that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaimEvent {
    pub subject: String,
    pub status: ClaimStatus,
    pub occurred_at: Timestamp,
    pub provenance: Option<String>,
}

impl NewClaimEvent {
    #[must_use]
    pub fn claimed(
        subject: impl Into<String>,
        occurred_at: Timestamp,
        provenance: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            status: ClaimStatus::Claimed,
            occurred_at,
            provenance,
        }
    }

    #[must_use]
    pub fn removed(
        subject: impl Into<String>,
        occurred_at: Timestamp,
        provenance: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            status: ClaimStatus::Removed,
            occurred_at,
            provenance,
        }
    }

    #[must_use]
    pub fn unchanged(
        subject: impl Into<String>,
        occurred_at: Timestamp,
        provenance: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            status: ClaimStatus::Unchanged,
            occurred_at,
            provenance,
        }
    }

    /// Anchor for a full reconciliation of the snapshot with `generation`.
    #[must_use]
    pub fn anchor(generation: Timestamp, engine: &str) -> Self {
        Self {
            subject: String::new(),
            status: ClaimStatus::ImportAnchor,
            occurred_at: generation,
            provenance: Some(engine.to_string()),
        }
    }

    /// Attach a log position, producing the appended form.
    #[must_use]
    pub fn into_event(self, identifier: &str, sequence: i64) -> ClaimEvent {
        ClaimEvent {
            sequence,
            identifier: identifier.to_string(),
            subject: self.subject,
            status: self.status,
            occurred_at: self.occurred_at,
            provenance: self.provenance,
        }
    }
}
