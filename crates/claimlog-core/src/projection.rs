//! Claims log → latest-status-per-subject projection.
//!
//! [`project`] is a pure last-writer-wins fold over `(subject, sequence)`.
//! It has no notion of who appended a row: engine entries, manual entries,
//! and rows written by unrelated tools are all ordered by `sequence` alone,
//! so a foreign `removed` newer than a `claimed` wins.
//!
//! Status semantics:
//!
//! - `claimed` makes the subject active, carrying that row's date/provenance
//! - `unchanged` re-asserts an active claim; on an inactive subject it
//!   activates it with its own date/provenance
//! - `removed` deactivates the subject
//! - `#full-import` rows never touch subjects; the highest-sequence one is the
//!   current generation marker

use std::collections::BTreeMap;

use serde::Serialize;

use crate::clock::Timestamp;
use crate::event::{ClaimEvent, ClaimStatus};

/// One active claim in the projected state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveClaim {
    /// Date of the claim as reported by its source.
    pub occurred_at: Timestamp,
    pub provenance: Option<String>,
    /// Sequence of the latest row for this subject.
    pub sequence: i64,
}

/// Derived view of a claims log. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectedState {
    /// Subjects whose latest status is active, keyed by subject.
    pub active: BTreeMap<String, ActiveClaim>,
    /// Latest status of every subject seen, active or not.
    pub latest: BTreeMap<String, ClaimStatus>,
    /// `occurred_at` of the highest-sequence anchor.
    pub generation: Option<Timestamp>,
    /// Sequence of that anchor.
    pub generation_sequence: Option<i64>,
}

impl ProjectedState {
    /// `true` if `subject` is currently an active claim.
    #[must_use]
    pub fn is_active(&self, subject: &str) -> bool {
        self.active.contains_key(subject)
    }

    /// Latest status recorded for `subject`, if any.
    #[must_use]
    pub fn status_of(&self, subject: &str) -> Option<ClaimStatus> {
        self.latest.get(subject).copied()
    }
}

/// Fold the complete event list of one identifier into its projected state.
///
/// Input order is irrelevant; rows are applied by ascending `sequence`. The
/// common case (already ascending, as read from the log) is a single pass.
#[must_use]
pub fn project(events: &[ClaimEvent]) -> ProjectedState {
    let mut ordered: Vec<&ClaimEvent> = events.iter().collect();
    if !ordered.is_sorted_by_key(|event| event.sequence) {
        ordered.sort_by_key(|event| event.sequence);
    }

    let mut state = ProjectedState::default();

    for event in ordered {
        if event.status == ClaimStatus::ImportAnchor {
            state.generation = Some(event.occurred_at);
            state.generation_sequence = Some(event.sequence);
            continue;
        }

        if event.subject.is_empty() {
            tracing::debug!(
                sequence = event.sequence,
                status = %event.status,
                "ignoring non-anchor row with empty subject"
            );
            continue;
        }

        state.latest.insert(event.subject.clone(), event.status);

        match event.status {
            ClaimStatus::Claimed => {
                state.active.insert(
                    event.subject.clone(),
                    ActiveClaim {
                        occurred_at: event.occurred_at,
                        provenance: event.provenance.clone(),
                        sequence: event.sequence,
                    },
                );
            }
            ClaimStatus::Unchanged => {
                state
                    .active
                    .entry(event.subject.clone())
                    .and_modify(|claim| claim.sequence = event.sequence)
                    .or_insert_with(|| ActiveClaim {
                        occurred_at: event.occurred_at,
                        provenance: event.provenance.clone(),
                        sequence: event.sequence,
                    });
            }
            ClaimStatus::Removed => {
                state.active.remove(&event.subject);
            }
            ClaimStatus::ImportAnchor => {}
        }
    }

    state
}
