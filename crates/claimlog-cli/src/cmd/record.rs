//! `claimlog record`: append one event outside of a sync.

use crate::output::{CliError, OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use claimlog_core::error::ErrorCode;
use claimlog_core::{ClaimLedger, ClaimStatus, NewClaimEvent, Timestamp};
use clap::Args;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Identifier the event belongs to.
    pub identifier: String,

    /// Claimed entity (e.g. a bibcode).
    pub subject: String,

    /// One of: claimed, removed, unchanged.
    #[arg(long)]
    pub status: String,

    /// When the event happened (default: now).
    #[arg(long)]
    pub at: Option<String>,

    /// Origin label to store with the event.
    #[arg(long)]
    pub provenance: Option<String>,
}

/// Build the event described by `args`. Anchors are reserved for syncs.
fn build_event(args: &RecordArgs) -> Result<NewClaimEvent> {
    let status: ClaimStatus = args
        .status
        .parse()
        .map_err(|err| CliError::new(ErrorCode::InvalidClaimStatus, err).into_anyhow())?;
    if status == ClaimStatus::ImportAnchor {
        return Err(CliError::new(
            ErrorCode::InvalidClaimStatus,
            "anchors are only written by `claimlog sync`",
        )
        .into_anyhow());
    }

    let subject = args.subject.trim();
    if subject.is_empty() {
        anyhow::bail!("subject must not be empty");
    }

    let occurred_at = match &args.at {
        Some(raw) => Timestamp::parse(raw)
            .map_err(|err| CliError::new(ErrorCode::InvalidTimestamp, err).into_anyhow())?,
        None => Timestamp::now(),
    };

    Ok(NewClaimEvent {
        subject: subject.to_string(),
        status,
        occurred_at,
        provenance: args.provenance.clone(),
    })
}

/// Execute `claimlog record`.
///
/// # Errors
///
/// Returns an error for an invalid status or timestamp, an uninitialized
/// project, or a failed append.
pub fn run_record(args: &RecordArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let event = build_event(args)?;
    let cfg = super::require_project(project_root)?;
    let mut ledger = super::open_ledger(&cfg)?;

    let appended = ledger
        .append(&args.identifier, std::slice::from_ref(&event))
        .with_context(|| format!("append to claims log of {}", args.identifier))?;

    tracing::info!(
        identifier = %args.identifier,
        subject = %event.subject,
        status = %event.status,
        "recorded claim event"
    );

    render(output, &appended, |events, w| {
        for event in events {
            pretty_kv(w, "sequence", event.sequence.to_string())?;
            pretty_kv(w, "status", event.status.as_str())?;
            pretty_kv(w, "subject", &event.subject)?;
            writeln!(w, "{:<12} {}", "at:", event.occurred_at)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(status: &str, at: Option<&str>) -> RecordArgs {
        RecordArgs {
            identifier: "0000-0003-3041-2092".into(),
            subject: "2014AAS...22325503A".into(),
            status: status.into(),
            at: at.map(str::to_string),
            provenance: None,
        }
    }

    #[test]
    fn builds_removal_with_explicit_time() {
        let event = build_event(&args("removed", Some("2015-11-05 11:37:33.381"))).expect("build");
        assert_eq!(event.status, ClaimStatus::Removed);
        assert_eq!(
            event.occurred_at,
            Timestamp::parse("2015-11-05T11:37:33.381Z").expect("ts")
        );
        assert!(event.provenance.is_none());
    }

    #[test]
    fn rejects_anchor_and_unknown_status() {
        let err = build_event(&args("#full-import", None)).expect_err("anchor");
        assert!(err.to_string().starts_with("E2003"));
        let err = build_event(&args("forced", None)).expect_err("unknown");
        assert!(err.to_string().starts_with("E2003"));
    }

    #[test]
    fn rejects_bad_timestamp() {
        let err = build_event(&args("claimed", Some("yesterday"))).expect_err("bad ts");
        assert!(err.to_string().starts_with("E2002"));
    }
}
