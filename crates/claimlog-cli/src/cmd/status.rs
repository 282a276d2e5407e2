//! `claimlog status`: projected view of one identifier.

use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use claimlog_core::projection::ActiveClaim;
use claimlog_core::{ClaimLedger, ClaimStatus, Timestamp, project};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Identifier to inspect.
    pub identifier: String,

    /// Also list subjects whose latest status is removed.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    identifier: String,
    events: usize,
    generation: Option<Timestamp>,
    checkpoint: Option<Timestamp>,
    active: BTreeMap<String, ActiveClaim>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    removed: Vec<String>,
}

/// Execute `claimlog status`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the store cannot
/// be read.
pub fn run_status(args: &StatusArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let cfg = super::require_project(project_root)?;
    let ledger = super::open_ledger(&cfg)?;

    let events = ledger
        .read_all(&args.identifier)
        .with_context(|| format!("read claims log of {}", args.identifier))?;
    let checkpoint = ledger
        .checkpoint(&args.identifier)
        .with_context(|| format!("read checkpoint of {}", args.identifier))?;
    let state = project(&events);

    let removed = if args.all {
        state
            .latest
            .iter()
            .filter(|(_, status)| **status == ClaimStatus::Removed)
            .map(|(subject, _)| subject.clone())
            .collect()
    } else {
        Vec::new()
    };

    let report = StatusReport {
        identifier: args.identifier.clone(),
        events: events.len(),
        generation: state.generation,
        checkpoint,
        active: state.active,
        removed,
    };

    render(output, &report, |r, w| {
        pretty_kv(w, "identifier", &r.identifier)?;
        pretty_kv(w, "events", r.events.to_string())?;
        pretty_kv(w, "generation", display_or_none(r.generation))?;
        pretty_kv(w, "checkpoint", display_or_none(r.checkpoint))?;
        pretty_kv(w, "active", r.active.len().to_string())?;
        for (subject, claim) in &r.active {
            writeln!(
                w,
                "  {subject:<24} {}  {}",
                claim.occurred_at,
                claim.provenance.as_deref().unwrap_or("-")
            )?;
        }
        if !r.removed.is_empty() {
            pretty_kv(w, "removed", r.removed.len().to_string())?;
            for subject in &r.removed {
                writeln!(w, "  {subject}")?;
            }
        }
        Ok(())
    })
}

fn display_or_none(ts: Option<Timestamp>) -> String {
    ts.map_or_else(|| "none".to_string(), |ts| ts.to_string())
}
