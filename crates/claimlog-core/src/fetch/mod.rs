//! Remote authority access.
//!
//! The engine only sees the [`RemoteFetcher`] trait. Two implementations
//! ship here: [`http::HttpFetcher`] talks to the authority's JSON API and
//! [`fixture::FixtureFetcher`] reads the same payloads from a directory.
//!
//! Neither retries. A failed fetch fails the whole run and the caller reruns
//! it later.

pub mod fixture;
pub mod http;

pub use fixture::FixtureFetcher;
pub use http::HttpFetcher;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::ErrorCode;
use crate::event::ClaimStatus;

/// One claim listed in a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteClaim {
    pub subject: String,
    pub occurred_at: Timestamp,
    #[serde(default)]
    pub provenance: Option<String>,
}

/// Full current claim set of one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The remote's own marker for which full state this is.
    pub generation: Timestamp,
    /// Claims in the remote's listing order.
    #[serde(default)]
    pub claims: Vec<RemoteClaim>,
}

/// One change reported by the incremental feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    pub subject: String,
    #[serde(default = "default_update_status")]
    pub status: ClaimStatus,
    pub occurred_at: Timestamp,
    #[serde(default)]
    pub provenance: Option<String>,
}

/// Changes reported since a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFeed {
    /// The feed's own "as of" time; becomes the next checkpoint.
    pub as_of: Timestamp,
    #[serde(default)]
    pub events: Vec<RemoteUpdate>,
}

const fn default_update_status() -> ClaimStatus {
    ClaimStatus::Claimed
}

/// Fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or remote failure; the run may be retried later.
    #[error("remote fetch for {identifier} failed: {reason}")]
    Transient { identifier: String, reason: String },

    /// The authority does not know the identifier.
    #[error("identifier {identifier} not found at the remote authority")]
    NotFound { identifier: String },
}

impl FetchError {
    #[must_use]
    pub fn transient(identifier: &str, reason: impl Into<String>) -> Self {
        Self::Transient {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn not_found(identifier: &str) -> Self {
        Self::NotFound {
            identifier: identifier.to_string(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transient { .. } => ErrorCode::RemoteUnavailable,
            Self::NotFound { .. } => ErrorCode::IdentifierNotFound,
        }
    }
}

/// Read access to the remote authority.
pub trait RemoteFetcher {
    /// Fetch the full current claim set of `identifier`.
    ///
    /// # Errors
    ///
    /// [`FetchError::NotFound`] for unknown identifiers, otherwise
    /// [`FetchError::Transient`].
    fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, FetchError>;

    /// Fetch changes reported since `since` (everything when `None`).
    ///
    /// # Errors
    ///
    /// Same as [`RemoteFetcher::fetch_snapshot`].
    fn fetch_updates_since(
        &self,
        identifier: &str,
        since: Option<Timestamp>,
    ) -> Result<UpdateFeed, FetchError>;
}

impl<F: RemoteFetcher + ?Sized> RemoteFetcher for &F {
    fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        (**self).fetch_snapshot(identifier)
    }

    fn fetch_updates_since(
        &self,
        identifier: &str,
        since: Option<Timestamp>,
    ) -> Result<UpdateFeed, FetchError> {
        (**self).fetch_updates_since(identifier, since)
    }
}
