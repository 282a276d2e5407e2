//! Shared fixtures for claimlog-core integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use claimlog_core::fetch::{
    FetchError, RemoteClaim, RemoteFetcher, RemoteUpdate, Snapshot, UpdateFeed,
};
use claimlog_core::{ClaimStatus, FixedClock, Reconciler, Timestamp};

pub const ORCID: &str = "0000-0003-3041-2092";
pub const ENGINE: &str = "claims-importer";

/// The seven claims of the reference researcher, in the authority's
/// listing order.
pub const REFERENCE_CLAIMS: [(&str, &str); 7] = [
    ("2015arXiv150304194A", "NASA ADS"),
    ("2015AAS...22533655A", "NASA ADS"),
    ("2014arXiv1406.4542H", "NASA ADS"),
    ("2015arXiv150305881C", "Roman Chyla"),
    ("2015ASPC..492..150T", "NASA ADS"),
    ("2015ASPC..492..208G", "NASA ADS"),
    ("2014AAS...22325503A", "NASA ADS"),
];

pub fn ts(raw: &str) -> Timestamp {
    Timestamp::parse(raw).expect("valid timestamp")
}

pub fn generation() -> Timestamp {
    ts("2015-11-05 11:37:33.381000")
}

pub fn as_of() -> Timestamp {
    ts("2015-11-05T11:37:36.381000")
}

pub fn claim_date() -> Timestamp {
    ts("2015-09-16 06:59:01.721000")
}

pub fn now() -> Timestamp {
    ts("2015-11-06T00:00:00Z")
}

pub fn reconciler() -> Reconciler<FixedClock> {
    Reconciler::with_clock(ENGINE, FixedClock(now()))
}

pub fn reference_snapshot() -> Snapshot {
    Snapshot {
        generation: generation(),
        claims: REFERENCE_CLAIMS
            .iter()
            .map(|(subject, provenance)| RemoteClaim {
                subject: (*subject).to_string(),
                occurred_at: claim_date(),
                provenance: Some((*provenance).to_string()),
            })
            .collect(),
    }
}

/// The feed the authority returns for the reference researcher: every claim,
/// all dated before `as_of`.
pub fn reference_feed() -> UpdateFeed {
    UpdateFeed {
        as_of: as_of(),
        events: REFERENCE_CLAIMS
            .iter()
            .map(|(subject, provenance)| RemoteUpdate {
                subject: (*subject).to_string(),
                status: ClaimStatus::Claimed,
                occurred_at: claim_date(),
                provenance: Some((*provenance).to_string()),
            })
            .collect(),
    }
}

/// In-memory remote whose answers tests can change between runs.
pub struct ScriptedFetcher {
    pub snapshot: RefCell<Snapshot>,
    pub feed: RefCell<UpdateFeed>,
    /// When set, every call fails with this error kind.
    pub fail: Cell<Option<FailMode>>,
    pub calls: Cell<usize>,
}

#[derive(Debug, Clone, Copy)]
pub enum FailMode {
    Transient,
    NotFound,
}

impl ScriptedFetcher {
    pub fn new(snapshot: Snapshot, feed: UpdateFeed) -> Self {
        Self {
            snapshot: RefCell::new(snapshot),
            feed: RefCell::new(feed),
            fail: Cell::new(None),
            calls: Cell::new(0),
        }
    }

    pub fn reference() -> Self {
        Self::new(reference_snapshot(), reference_feed())
    }

    fn check(&self, identifier: &str) -> Result<(), FetchError> {
        self.calls.set(self.calls.get() + 1);
        match self.fail.get() {
            None => Ok(()),
            Some(FailMode::Transient) => Err(FetchError::transient(identifier, "connection reset")),
            Some(FailMode::NotFound) => Err(FetchError::not_found(identifier)),
        }
    }
}

impl RemoteFetcher for ScriptedFetcher {
    fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        self.check(identifier)?;
        Ok(self.snapshot.borrow().clone())
    }

    fn fetch_updates_since(
        &self,
        identifier: &str,
        since: Option<Timestamp>,
    ) -> Result<UpdateFeed, FetchError> {
        self.check(identifier)?;
        let feed = self.feed.borrow();
        Ok(UpdateFeed {
            as_of: feed.as_of,
            events: feed
                .events
                .iter()
                .filter(|update| since.is_none_or(|since| update.occurred_at > since))
                .cloned()
                .collect(),
        })
    }
}
