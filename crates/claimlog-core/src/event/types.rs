//! Claim status enum covering the four log entry kinds.
//!
//! The string form is what lands in the `status` column of the claims log
//! and in JSON output. The anchor keeps its historical `#full-import` label.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status carried by a claim event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimStatus {
    /// The subject is claimed under the identifier.
    Claimed,
    /// The claim was withdrawn.
    Removed,
    /// A full reconciliation saw the claim still present.
    Unchanged,
    /// Boundary marker of one full reconciliation; `subject` is empty.
    ImportAnchor,
}

/// Error returned when parsing an unknown claim status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClaimStatus {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown claim status '{}': expected one of claimed, removed, unchanged, #full-import",
            self.raw
        )
    }
}

impl std::error::Error for UnknownClaimStatus {}

impl ClaimStatus {
    /// All statuses in catalog order.
    pub const ALL: [Self; 4] = [
        Self::Claimed,
        Self::Removed,
        Self::Unchanged,
        Self::ImportAnchor,
    ];

    /// Return the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
            Self::ImportAnchor => "#full-import",
        }
    }

    /// Whether a subject whose latest entry has this status counts as an
    /// active claim.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Claimed | Self::Unchanged)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = UnknownClaimStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claimed" => Ok(Self::Claimed),
            "removed" => Ok(Self::Removed),
            "unchanged" => Ok(Self::Unchanged),
            "#full-import" | "full-import" | "anchor" => Ok(Self::ImportAnchor),
            _ => Err(UnknownClaimStatus { raw: s.to_string() }),
        }
    }
}

impl Serialize for ClaimStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClaimStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
