//! Full reconciliation: set diff of a remote snapshot against local state.

use std::collections::{HashMap, HashSet};

use crate::clock::Timestamp;
use crate::event::NewClaimEvent;
use crate::fetch::{RemoteClaim, Snapshot};
use crate::projection::ProjectedState;

/// Snapshot claims with empty subjects dropped and duplicates collapsed to
/// their first listing, in listing order.
#[must_use]
pub fn clean_snapshot<'a>(identifier: &str, snapshot: &'a Snapshot) -> Vec<&'a RemoteClaim> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.claims.len());
    let mut cleaned = Vec::with_capacity(snapshot.claims.len());

    for claim in &snapshot.claims {
        if claim.subject.is_empty() {
            tracing::warn!(identifier, "dropping snapshot claim with empty subject");
            continue;
        }
        if !seen.insert(claim.subject.as_str()) {
            tracing::warn!(
                identifier,
                subject = %claim.subject,
                "duplicate subject in snapshot, keeping first listing"
            );
            continue;
        }
        cleaned.push(claim);
    }

    cleaned
}

/// Build the batch for a full reconciliation.
///
/// Batch order is fixed: the anchor, then subjects new on the remote as
/// `claimed` in listing order, then locally active subjects the remote no
/// longer lists as `removed`, then subjects present on both sides as
/// `unchanged`. The last two groups are in ascending subject order.
#[must_use]
pub fn full_diff(
    identifier: &str,
    engine: &str,
    local: &ProjectedState,
    snapshot: &Snapshot,
    now: Timestamp,
) -> Vec<NewClaimEvent> {
    let remote = clean_snapshot(identifier, snapshot);
    let by_subject: HashMap<&str, &RemoteClaim> = remote
        .iter()
        .map(|claim| (claim.subject.as_str(), *claim))
        .collect();

    let mut batch = Vec::with_capacity(remote.len() + local.active.len() + 1);
    batch.push(NewClaimEvent::anchor(snapshot.generation, engine));

    batch.extend(
        remote
            .iter()
            .filter(|claim| !local.is_active(&claim.subject))
            .map(|claim| {
                NewClaimEvent::claimed(
                    claim.subject.clone(),
                    claim.occurred_at,
                    claim.provenance.clone(),
                )
            }),
    );

    batch.extend(
        local
            .active
            .keys()
            .filter(|subject| !by_subject.contains_key(subject.as_str()))
            .map(|subject| NewClaimEvent::removed(subject.clone(), now, Some(engine.to_string()))),
    );

    batch.extend(local.active.keys().filter_map(|subject| {
        by_subject.get(subject.as_str()).map(|claim| {
            NewClaimEvent::unchanged(subject.clone(), claim.occurred_at, Some(engine.to_string()))
        })
    }));

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClaimEvent, ClaimStatus};
    use crate::projection::project;

    const ORCID: &str = "0000-0003-3041-2092";
    const ENGINE: &str = "claims-importer";
    const GEN: Timestamp = Timestamp::from_micros(1_446_723_453_381_000);
    const NOW: Timestamp = Timestamp::from_micros(1_446_800_000_000_000);

    fn remote(subject: &str, micros: i64) -> RemoteClaim {
        RemoteClaim {
            subject: subject.to_string(),
            occurred_at: Timestamp::from_micros(micros),
            provenance: Some("NASA ADS".to_string()),
        }
    }

    fn claimed(sequence: i64, subject: &str) -> ClaimEvent {
        NewClaimEvent::claimed(subject, Timestamp::from_micros(1), Some("NASA ADS".into()))
            .into_event(ORCID, sequence)
    }

    fn summary(batch: &[NewClaimEvent]) -> Vec<(ClaimStatus, &str)> {
        batch.iter().map(|e| (e.status, e.subject.as_str())).collect()
    }

    #[test]
    fn empty_local_claims_everything_in_listing_order() {
        let snapshot = Snapshot {
            generation: GEN,
            claims: vec![remote("z", 1), remote("a", 2), remote("m", 3)],
        };
        let batch = full_diff(ORCID, ENGINE, &ProjectedState::default(), &snapshot, NOW);

        assert_eq!(
            summary(&batch),
            vec![
                (ClaimStatus::ImportAnchor, ""),
                (ClaimStatus::Claimed, "z"),
                (ClaimStatus::Claimed, "a"),
                (ClaimStatus::Claimed, "m"),
            ]
        );
        assert_eq!(batch[0].occurred_at, GEN);
        assert_eq!(batch[2].occurred_at, Timestamp::from_micros(2));
        assert_eq!(batch[2].provenance.as_deref(), Some("NASA ADS"));
    }

    #[test]
    fn batch_order_is_anchor_new_gone_kept() {
        let local = project(&[claimed(1, "k2"), claimed(2, "g"), claimed(3, "k1")]);
        let snapshot = Snapshot {
            generation: GEN,
            claims: vec![remote("k2", 20), remote("n", 30), remote("k1", 10)],
        };
        let batch = full_diff(ORCID, ENGINE, &local, &snapshot, NOW);

        assert_eq!(
            summary(&batch),
            vec![
                (ClaimStatus::ImportAnchor, ""),
                (ClaimStatus::Claimed, "n"),
                (ClaimStatus::Removed, "g"),
                (ClaimStatus::Unchanged, "k1"),
                (ClaimStatus::Unchanged, "k2"),
            ]
        );

        let gone = &batch[2];
        assert_eq!(gone.occurred_at, NOW);
        assert_eq!(gone.provenance.as_deref(), Some(ENGINE));

        let kept = &batch[3];
        assert_eq!(kept.occurred_at, Timestamp::from_micros(10));
        assert_eq!(kept.provenance.as_deref(), Some(ENGINE));
    }

    #[test]
    fn removed_locally_and_listed_remotely_is_reclaimed() {
        let removed =
            NewClaimEvent::removed("a", Timestamp::from_micros(5), None).into_event(ORCID, 2);
        let local = project(&[claimed(1, "a"), removed]);
        let snapshot = Snapshot {
            generation: GEN,
            claims: vec![remote("a", 1)],
        };

        let batch = full_diff(ORCID, ENGINE, &local, &snapshot, NOW);
        assert_eq!(
            summary(&batch),
            vec![(ClaimStatus::ImportAnchor, ""), (ClaimStatus::Claimed, "a")]
        );
    }

    #[test]
    fn duplicate_and_empty_subjects_are_cleaned() {
        let snapshot = Snapshot {
            generation: GEN,
            claims: vec![remote("a", 1), remote("", 2), remote("b", 3), remote("a", 4)],
        };
        let cleaned = clean_snapshot(ORCID, &snapshot);
        let subjects: Vec<&str> = cleaned.iter().map(|c| c.subject.as_str()).collect();
        assert_eq!(subjects, vec!["a", "b"]);
        assert_eq!(cleaned[0].occurred_at, Timestamp::from_micros(1));
    }

    #[test]
    fn empty_snapshot_removes_all_active() {
        let local = project(&[claimed(1, "b"), claimed(2, "a")]);
        let snapshot = Snapshot {
            generation: GEN,
            claims: Vec::new(),
        };
        let batch = full_diff(ORCID, ENGINE, &local, &snapshot, NOW);
        assert_eq!(
            summary(&batch),
            vec![
                (ClaimStatus::ImportAnchor, ""),
                (ClaimStatus::Removed, "a"),
                (ClaimStatus::Removed, "b"),
            ]
        );
    }
}
