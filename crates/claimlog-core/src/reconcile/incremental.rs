//! Fast path: apply the update feed on top of the projected state.

use std::collections::HashMap;

use crate::clock::Timestamp;
use crate::event::{ClaimStatus, NewClaimEvent};
use crate::fetch::UpdateFeed;
use crate::projection::ProjectedState;

/// Build the batch for an incremental run.
///
/// Only feed events strictly newer than `since` count. Several events for
/// one subject collapse to the last one in feed order, and an event whose
/// status the subject already has locally is skipped. `claimed` and
/// `removed` keep the feed's date and provenance; other statuses are not
/// meaningful in a feed and are dropped.
#[must_use]
pub fn incremental_batch(
    identifier: &str,
    local: &ProjectedState,
    since: Timestamp,
    feed: &UpdateFeed,
) -> Vec<NewClaimEvent> {
    let candidates: Vec<_> = feed
        .events
        .iter()
        .filter(|update| update.occurred_at > since)
        .filter(|update| {
            if update.subject.is_empty() {
                tracing::warn!(identifier, "ignoring feed event with empty subject");
                return false;
            }
            match update.status {
                ClaimStatus::Claimed | ClaimStatus::Removed => true,
                ClaimStatus::Unchanged | ClaimStatus::ImportAnchor => {
                    tracing::warn!(
                        identifier,
                        subject = %update.subject,
                        status = %update.status,
                        "ignoring feed event with unsupported status"
                    );
                    false
                }
            }
        })
        .collect();

    let last_index: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(index, update)| (update.subject.as_str(), index))
        .collect();

    candidates
        .iter()
        .enumerate()
        .filter(|(index, update)| last_index.get(update.subject.as_str()) == Some(index))
        .filter_map(|(_, update)| {
            let active = local.is_active(&update.subject);
            match update.status {
                ClaimStatus::Claimed if !active => Some(NewClaimEvent::claimed(
                    update.subject.clone(),
                    update.occurred_at,
                    update.provenance.clone(),
                )),
                ClaimStatus::Removed if active => Some(NewClaimEvent::removed(
                    update.subject.clone(),
                    update.occurred_at,
                    update.provenance.clone(),
                )),
                _ => {
                    tracing::debug!(
                        identifier,
                        subject = %update.subject,
                        status = %update.status,
                        "feed event already reflected locally"
                    );
                    None
                }
            }
        })
        .collect()
}
