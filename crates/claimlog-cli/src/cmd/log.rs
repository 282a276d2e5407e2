//! `claimlog log`: claims log inspection.

use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use claimlog_core::{ClaimEvent, ClaimLedger};
use clap::Args;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Identifier to inspect.
    pub identifier: String,

    /// Only show the history of this subject.
    #[arg(long)]
    pub subject: Option<String>,

    /// Show only the last N events.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Execute `claimlog log`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the log cannot be
/// read.
pub fn run_log(args: &LogArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let cfg = super::require_project(project_root)?;
    let ledger = super::open_ledger(&cfg)?;

    let mut events = match &args.subject {
        Some(subject) => ledger.subject_history(&args.identifier, subject),
        None => ledger.read_all(&args.identifier),
    }
    .with_context(|| format!("read claims log of {}", args.identifier))?;

    if let Some(limit) = args.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }

    render(output, &events, |events, w| {
        if events.is_empty() {
            return writeln!(w, "No events for {}", args.identifier);
        }
        for event in events {
            write_event(w, event)?;
        }
        Ok(())
    })
}

fn write_event(w: &mut dyn std::io::Write, event: &ClaimEvent) -> std::io::Result<()> {
    let subject = if event.is_anchor() {
        "-"
    } else {
        event.subject.as_str()
    };
    writeln!(
        w,
        "{:>6}  {:<12} {:<24} {}  {}",
        event.sequence,
        event.status.as_str(),
        subject,
        event.occurred_at,
        event.provenance.as_deref().unwrap_or("-"),
    )
}
