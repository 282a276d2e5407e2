//! `claimlog sync`: reconcile identifiers with the remote authority.
//!
//! Each identifier runs on its own scoped thread with its own database
//! connection, under the identifier's advisory lock. A failure is reported
//! for that identifier and does not stop the others; the command exits
//! non-zero if any identifier failed.

use crate::output::{CliError, OutputMode, render};
use anyhow::Result;
use claimlog_core::config::EffectiveConfig;
use claimlog_core::error::ErrorCode;
use claimlog_core::fetch::{FixtureFetcher, HttpFetcher, RemoteFetcher};
use claimlog_core::lock::IdentifierLock;
use claimlog_core::{ClaimStatus, Reconciler, RunReport, SqliteLedger};
use clap::Args;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::thread;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Identifiers to reconcile.
    #[arg(required = true, value_name = "IDENTIFIER")]
    pub identifiers: Vec<String>,

    /// Read `<id>.snapshot.json` / `<id>.updates.json` from this directory
    /// instead of the configured remote.
    #[arg(long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,

    /// Override the engine name recorded as provenance.
    #[arg(long)]
    pub engine: Option<String>,
}

/// Outcome of one identifier.
#[derive(Debug, Serialize)]
pub struct IdentifierOutcome {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeError {
    #[serde(flatten)]
    pub detail: CliError,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub results: Vec<IdentifierOutcome>,
    pub failed: usize,
}

type SharedFetcher = Box<dyn RemoteFetcher + Sync>;

/// Execute `claimlog sync`.
///
/// # Errors
///
/// Returns an error if the project is not initialized, no remote is
/// configured, or any identifier failed (after reporting all of them).
pub fn run_sync(args: &SyncArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let cfg = super::require_project(project_root)?;
    let fetcher = build_fetcher(args, &cfg, project_root)?;
    let engine_name = args
        .engine
        .clone()
        .unwrap_or_else(|| cfg.project.engine.name.clone());
    let engine = Reconciler::new(engine_name);

    let mut seen = HashSet::new();
    let identifiers: Vec<&str> = args
        .identifiers
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect();

    let results = sync_all(&identifiers, &engine, fetcher.as_ref(), &cfg);
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let summary = SyncSummary { results, failed };

    render(output, &summary, |s, w| {
        for outcome in &s.results {
            match (&outcome.report, &outcome.error) {
                (Some(report), _) => writeln!(
                    w,
                    "{}  {}  +{} claimed  -{} removed  ={} unchanged  checkpoint {}",
                    outcome.identifier,
                    report.path,
                    report.count(ClaimStatus::Claimed),
                    report.count(ClaimStatus::Removed),
                    report.count(ClaimStatus::Unchanged),
                    report.checkpoint_after,
                )?,
                (None, Some(err)) => writeln!(
                    w,
                    "{}  FAILED  {}: {}",
                    outcome.identifier, err.detail.code, err.detail.message
                )?,
                (None, None) => {}
            }
        }
        Ok(())
    })?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} identifier(s) failed to sync", summary.results.len());
    }
    Ok(())
}

fn build_fetcher(
    args: &SyncArgs,
    cfg: &EffectiveConfig,
    project_root: &Path,
) -> Result<SharedFetcher> {
    if let Some(dir) = &args.fixtures {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            project_root.join(dir)
        };
        tracing::debug!(dir = %dir.display(), "using fixture fetcher");
        return Ok(Box::new(FixtureFetcher::new(dir)));
    }

    let remote = &cfg.project.remote;
    match (&remote.snapshot_url, &remote.updates_url) {
        (Some(snapshot_url), Some(updates_url)) => Ok(Box::new(
            HttpFetcher::new(snapshot_url, updates_url, remote.timeout())
                .with_token(cfg.token.clone()),
        )),
        _ => Err(CliError::new(
            ErrorCode::ConfigParseError,
            "remote.snapshot_url and remote.updates_url must be set (or pass --fixtures)",
        )
        .into_anyhow()),
    }
}

fn sync_all(
    identifiers: &[&str],
    engine: &Reconciler,
    fetcher: &(dyn RemoteFetcher + Sync),
    cfg: &EffectiveConfig,
) -> Vec<IdentifierOutcome> {
    thread::scope(|scope| {
        let handles: Vec<_> = identifiers
            .iter()
            .map(|identifier| {
                let identifier = *identifier;
                let handle = scope.spawn(move || sync_one(identifier, engine, fetcher, cfg));
                (identifier, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(identifier, handle)| {
                handle.join().unwrap_or_else(|_| IdentifierOutcome {
                    identifier: identifier.to_string(),
                    report: None,
                    error: Some(OutcomeError {
                        detail: CliError::new(
                            ErrorCode::InternalUnexpected,
                            "sync worker panicked",
                        ),
                        retryable: true,
                    }),
                })
            })
            .collect()
    })
}

fn sync_one(
    identifier: &str,
    engine: &Reconciler,
    fetcher: &(dyn RemoteFetcher + Sync),
    cfg: &EffectiveConfig,
) -> IdentifierOutcome {
    let failed = |detail: CliError, retryable: bool| IdentifierOutcome {
        identifier: identifier.to_string(),
        report: None,
        error: Some(OutcomeError { detail, retryable }),
    };

    let lock = match IdentifierLock::acquire(
        &cfg.locks_dir,
        identifier,
        cfg.project.engine.lock_timeout(),
    ) {
        Ok(lock) => lock,
        Err(err) => {
            tracing::warn!(identifier, error = %err, "could not lock identifier");
            return failed(CliError::new(err.code(), &err), true);
        }
    };

    let mut ledger = match SqliteLedger::open(&cfg.db_path) {
        Ok(ledger) => ledger,
        Err(err) => {
            tracing::error!(identifier, error = %err, "could not open claims database");
            return failed(CliError::new(err.code(), &err), true);
        }
    };

    let result = engine.run(identifier, fetcher, &mut ledger);
    lock.release();

    match result {
        Ok(report) => IdentifierOutcome {
            identifier: identifier.to_string(),
            report: Some(report),
            error: None,
        },
        Err(err) => {
            let detail = match std::error::Error::source(&err) {
                Some(source) => format!("{err}: {source}"),
                None => err.to_string(),
            };
            tracing::warn!(identifier, code = %err.code(), error = %detail, "sync failed");
            failed(CliError::new(err.code(), detail), err.is_retryable())
        }
    }
}
