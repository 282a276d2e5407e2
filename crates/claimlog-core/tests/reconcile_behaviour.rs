//! Engine behaviour against an on-disk ledger: idempotence, drift detection,
//! foreign writers, failed commits, and failed fetches.

#[path = "common.rs"]
mod common;

use claimlog_core::error::ErrorCode;
use claimlog_core::fetch::{FixtureFetcher, RemoteClaim, RemoteUpdate};
use claimlog_core::reconcile::FullReason;
use claimlog_core::{
    ClaimLedger, ClaimStatus, NewClaimEvent, ReconcileError, SqliteLedger, SyncPath, project,
};
use common::*;
use tempfile::TempDir;

fn disk_ledger() -> (TempDir, SqliteLedger) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = SqliteLedger::open(&dir.path().join(".claimlog/claims.db")).expect("open");
    (dir, ledger)
}

#[test]
fn unchanged_remote_is_idempotent_across_many_runs() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();

    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");
    let log_after_first = ledger.read_all(ORCID).expect("read");

    for _ in 0..3 {
        let report = engine.run(ORCID, &fetcher, &mut ledger).expect("rerun");
        assert_eq!(report.path, SyncPath::Incremental);
        assert!(report.appended.is_empty());
        assert!(!report.checkpoint_advanced());
    }

    assert_eq!(ledger.read_all(ORCID).expect("read"), log_after_first);
    assert_eq!(ledger.checkpoint(ORCID).expect("checkpoint"), Some(as_of()));
}

#[test]
fn one_microsecond_generation_drift_forces_full_pass() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();
    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");

    let shifted = generation().offset_micros(1);
    fetcher.snapshot.borrow_mut().generation = shifted;

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("drift run");
    assert_eq!(
        report.path,
        SyncPath::Full(FullReason::GenerationDrift {
            local: generation(),
            remote: shifted,
        })
    );
    assert!(report.appended[0].is_anchor());
    assert_eq!(report.appended[0].occurred_at, shifted);
    assert_eq!(report.count(ClaimStatus::Unchanged), REFERENCE_CLAIMS.len());
    assert_eq!(report.count(ClaimStatus::Claimed), 0);

    let state = project(&ledger.read_all(ORCID).expect("read"));
    assert_eq!(state.generation, Some(shifted));

    let settled = engine.run(ORCID, &fetcher, &mut ledger).expect("settled run");
    assert_eq!(settled.path, SyncPath::Incremental);
    assert!(settled.appended.is_empty());
}

#[test]
fn sub_microsecond_generation_drift_is_refused_not_truncated() {
    let (dir, mut ledger) = disk_ledger();
    let engine = reconciler();
    engine
        .run(ORCID, &ScriptedFetcher::reference(), &mut ledger)
        .expect("first run");
    let log_after_first = ledger.read_all(ORCID).expect("read");

    let fixtures = FixtureFetcher::new(dir.path().join("fixtures"));
    std::fs::create_dir_all(fixtures.dir()).expect("fixtures dir");
    let mut snapshot = serde_json::to_value(reference_snapshot()).expect("snapshot json");
    snapshot["generation"] = "2015-11-05T11:37:33.381000500Z".into();
    std::fs::write(fixtures.snapshot_path(ORCID), snapshot.to_string()).expect("write snapshot");
    std::fs::write(
        fixtures.updates_path(ORCID),
        serde_json::to_string(&reference_feed()).expect("feed json"),
    )
    .expect("write updates");

    let err = engine
        .run(ORCID, &fixtures, &mut ledger)
        .expect_err("a marker finer than the log can store must not match");
    assert!(matches!(err, ReconcileError::Fetch { .. }));
    assert_eq!(ledger.read_all(ORCID).expect("read"), log_after_first);
    assert_eq!(ledger.checkpoint(ORCID).expect("checkpoint"), Some(as_of()));
}

#[test]
fn out_of_range_checkpoint_is_refused_and_reruns_stay_quiet() {
    let (dir, mut ledger) = disk_ledger();
    let engine = reconciler();
    engine
        .run(ORCID, &ScriptedFetcher::reference(), &mut ledger)
        .expect("first run");

    let fixtures = FixtureFetcher::new(dir.path().join("fixtures"));
    std::fs::create_dir_all(fixtures.dir()).expect("fixtures dir");
    std::fs::write(
        fixtures.snapshot_path(ORCID),
        serde_json::to_string(&reference_snapshot()).expect("snapshot json"),
    )
    .expect("write snapshot");
    let mut feed = serde_json::to_value(reference_feed()).expect("feed json");
    feed["as_of"] = 9_000_000_000_000_000_i64.into();
    std::fs::write(fixtures.updates_path(ORCID), feed.to_string()).expect("write updates");

    let err = engine
        .run(ORCID, &fixtures, &mut ledger)
        .expect_err("epoch millis past year 9999 must be refused");
    assert!(matches!(err, ReconcileError::Fetch { .. }));
    assert_eq!(ledger.checkpoint(ORCID).expect("checkpoint"), Some(as_of()));

    let rerun = engine
        .run(ORCID, &ScriptedFetcher::reference(), &mut ledger)
        .expect("rerun");
    assert_eq!(rerun.path, SyncPath::Incremental);
    assert!(rerun.appended.is_empty());
}

#[test]
fn claims_dropped_by_the_remote_are_removed_with_engine_time() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();
    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");

    {
        let mut snapshot = fetcher.snapshot.borrow_mut();
        snapshot.generation = ts("2015-11-07T08:00:00Z");
        snapshot
            .claims
            .retain(|claim| claim.subject != "2015ASPC..492..208G");
        snapshot.claims.push(RemoteClaim {
            subject: "2016ApJ...817...13A".to_string(),
            occurred_at: ts("2015-11-07T07:00:00Z"),
            provenance: Some("Roman Chyla".to_string()),
        });
    }

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("second full run");
    assert!(report.path.is_full());

    let removed: Vec<_> = report
        .appended
        .iter()
        .filter(|e| e.status == ClaimStatus::Removed)
        .collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].subject, "2015ASPC..492..208G");
    assert_eq!(removed[0].occurred_at, now());
    assert_eq!(removed[0].provenance.as_deref(), Some(ENGINE));

    assert_eq!(report.appended[1].status, ClaimStatus::Claimed);
    assert_eq!(report.appended[1].subject, "2016ApJ...817...13A");
    assert_eq!(report.appended[2].status, ClaimStatus::Removed);

    let state = project(&ledger.read_all(ORCID).expect("read"));
    assert_eq!(state.active.len(), 7);
    assert!(!state.is_active("2015ASPC..492..208G"));
}

#[test]
fn foreign_claim_is_kept_by_next_full_pass_when_remote_agrees() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();

    // A manual entry arrives before the engine ever ran.
    ledger
        .append(
            ORCID,
            &[NewClaimEvent::claimed("2015arXiv150304194A", claim_date(), None)],
        )
        .expect("foreign append");

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("first run");
    assert_eq!(report.count(ClaimStatus::Claimed), REFERENCE_CLAIMS.len() - 1);
    assert_eq!(report.count(ClaimStatus::Unchanged), 1);
    assert_eq!(report.appended[0].sequence, 2);
}

#[test]
fn foreign_removal_does_not_block_the_fast_path() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();
    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");

    ledger
        .append(
            ORCID,
            &[NewClaimEvent::removed("2015ASPC..492..150T", now(), None)],
        )
        .expect("foreign removal");

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("rerun");
    assert_eq!(report.path, SyncPath::Incremental);
    assert!(report.appended.is_empty());

    let state = project(&ledger.read_all(ORCID).expect("read"));
    assert!(!state.is_active("2015ASPC..492..150T"));
}

#[test]
fn incremental_feed_claims_and_removals_are_recorded() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();
    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");

    let later = ts("2015-11-06T12:00:00Z");
    {
        let mut feed = fetcher.feed.borrow_mut();
        feed.as_of = later;
        feed.events.push(RemoteUpdate {
            subject: "2016ApJ...817...13A".to_string(),
            status: ClaimStatus::Claimed,
            occurred_at: ts("2015-11-06T10:00:00Z"),
            provenance: Some("NASA ADS".to_string()),
        });
        feed.events.push(RemoteUpdate {
            subject: "2015AAS...22533655A".to_string(),
            status: ClaimStatus::Removed,
            occurred_at: ts("2015-11-06T11:00:00Z"),
            provenance: Some("NASA ADS".to_string()),
        });
    }

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("incremental run");
    assert_eq!(report.path, SyncPath::Incremental);
    let got: Vec<_> = report
        .appended
        .iter()
        .map(|e| (e.status, e.subject.as_str(), e.sequence))
        .collect();
    assert_eq!(
        got,
        vec![
            (ClaimStatus::Claimed, "2016ApJ...817...13A", 9),
            (ClaimStatus::Removed, "2015AAS...22533655A", 10),
        ]
    );
    assert_eq!(report.checkpoint_before, Some(as_of()));
    assert_eq!(ledger.checkpoint(ORCID).expect("checkpoint"), Some(later));

    let again = engine.run(ORCID, &fetcher, &mut ledger).expect("rerun");
    assert!(again.appended.is_empty());
}

#[test]
fn checkpoint_advances_even_when_nothing_is_appended() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();
    engine.run(ORCID, &fetcher, &mut ledger).expect("first run");

    let later = ts("2015-11-06T12:00:00Z");
    fetcher.feed.borrow_mut().as_of = later;

    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("rerun");
    assert!(report.appended.is_empty());
    assert!(report.checkpoint_advanced());
    assert_eq!(ledger.checkpoint(ORCID).expect("checkpoint"), Some(later));
}

#[test]
fn failed_commit_leaves_nothing_and_retry_writes_the_same_batch() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();

    ledger
        .connection()
        .execute_batch(
            "CREATE TRIGGER fail_checkpoint BEFORE INSERT ON key_value
             BEGIN SELECT RAISE(ABORT, 'injected checkpoint failure'); END;",
        )
        .expect("install trigger");

    let err = engine
        .run(ORCID, &fetcher, &mut ledger)
        .expect_err("commit must fail");
    assert!(matches!(err, ReconcileError::Commit { .. }));
    assert_eq!(err.code(), ErrorCode::CommitFailed);
    assert!(err.is_retryable());
    assert!(ledger.read_all(ORCID).expect("read").is_empty());
    assert!(ledger.checkpoint(ORCID).expect("checkpoint").is_none());

    ledger
        .connection()
        .execute_batch("DROP TRIGGER fail_checkpoint;")
        .expect("drop trigger");

    let retry = engine.run(ORCID, &fetcher, &mut ledger).expect("retry");
    assert_eq!(retry.path, SyncPath::Full(FullReason::NoCheckpoint));
    assert_eq!(retry.appended.len(), REFERENCE_CLAIMS.len() + 1);
    assert!(retry.appended[0].is_anchor());
    let subjects: Vec<&str> = retry.appended[1..]
        .iter()
        .map(|e| e.subject.as_str())
        .collect();
    let expected: Vec<&str> = REFERENCE_CLAIMS.iter().map(|(s, _)| *s).collect();
    assert_eq!(subjects, expected);
}

#[test]
fn fetch_failures_leave_no_trace() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();

    fetcher.fail.set(Some(FailMode::Transient));
    let err = engine.run(ORCID, &fetcher, &mut ledger).expect_err("transient");
    assert!(matches!(err, ReconcileError::Fetch { .. }));
    assert!(err.is_retryable());

    fetcher.fail.set(Some(FailMode::NotFound));
    let err = engine.run(ORCID, &fetcher, &mut ledger).expect_err("not found");
    assert!(matches!(err, ReconcileError::NotFound { .. }));
    assert!(!err.is_retryable());

    assert!(ledger.read_all(ORCID).expect("read").is_empty());
    assert!(ledger.checkpoint(ORCID).expect("checkpoint").is_none());

    fetcher.fail.set(None);
    let report = engine.run(ORCID, &fetcher, &mut ledger).expect("recovered");
    assert_eq!(report.appended.len(), REFERENCE_CLAIMS.len() + 1);
}

#[test]
fn identifiers_do_not_share_state() {
    let (_dir, mut ledger) = disk_ledger();
    let fetcher = ScriptedFetcher::reference();
    let engine = reconciler();

    engine.run(ORCID, &fetcher, &mut ledger).expect("first identifier");
    let other = engine
        .run("0000-0002-1825-0097", &fetcher, &mut ledger)
        .expect("second identifier");

    assert_eq!(other.path, SyncPath::Full(FullReason::NoCheckpoint));
    assert_eq!(other.appended.len(), REFERENCE_CLAIMS.len() + 1);
    assert_eq!(ledger.read_all(ORCID).expect("read").len(), REFERENCE_CLAIMS.len() + 1);
}
