use std::fmt;

/// Machine-readable error codes for operator- and script-friendly decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    IdentifierNotFound,
    InvalidTimestamp,
    InvalidClaimStatus,
    RemoteUnavailable,
    StorageReadFailed,
    CommitFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::IdentifierNotFound => "E2001",
            Self::InvalidTimestamp => "E2002",
            Self::InvalidClaimStatus => "E2003",
            Self::RemoteUnavailable => "E4001",
            Self::StorageReadFailed => "E5001",
            Self::CommitFailed => "E5002",
            Self::LockContention => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::IdentifierNotFound => "Identifier unknown to the remote authority",
            Self::InvalidTimestamp => "Invalid timestamp",
            Self::InvalidClaimStatus => "Invalid claim status",
            Self::RemoteUnavailable => "Remote authority unavailable",
            Self::StorageReadFailed => "Claims log read failed",
            Self::CommitFailed => "Claims log commit failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `claimlog init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .claimlog/config.toml and retry."),
            Self::IdentifierNotFound => {
                Some("Check the identifier; the remote does not know it. Retrying will not help.")
            }
            Self::InvalidTimestamp => {
                Some("Use RFC 3339 (2015-11-05T11:37:33.381Z) or `YYYY-MM-DD HH:MM:SS.ffffff`.")
            }
            Self::InvalidClaimStatus => {
                Some("Use one of: claimed, removed, unchanged, #full-import.")
            }
            Self::RemoteUnavailable => Some("Retry the whole sync later; nothing was recorded."),
            Self::StorageReadFailed => Some("Check the database path and permissions, then retry."),
            Self::CommitFailed => {
                Some("Retry the whole sync; the failed batch was rolled back in full.")
            }
            Self::LockContention => {
                Some("Another sync for this identifier is running; retry after it finishes.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
