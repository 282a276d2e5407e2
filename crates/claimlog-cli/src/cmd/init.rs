use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use claimlog_core::config::{self, STATE_DIR};
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.claimlog/` already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "claims.db\nclaims.db-wal\nclaims.db-shm\nlocks/\n";

#[derive(Debug, Serialize)]
struct InitReport {
    state_dir: String,
    config: String,
    database: String,
}

/// Execute `claimlog init`. Creates:
///
/// ```text
/// .claimlog/
///   config.toml   (default config template)
///   claims.db     (migrated, empty)
///   locks/
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if `.claimlog/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let state_dir = project_root.join(STATE_DIR);

    if state_dir.exists() && !args.force {
        anyhow::bail!("{STATE_DIR}/ already exists. Use `claimlog init --force` to reinitialize.");
    }

    let locks_dir = state_dir.join("locks");
    std::fs::create_dir_all(&locks_dir)
        .with_context(|| format!("Failed to create {}", locks_dir.display()))?;

    let config_path = config::config_path(project_root);
    std::fs::write(&config_path, config::default_config_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let gitignore = state_dir.join(".gitignore");
    std::fs::write(&gitignore, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore.display()))?;

    let cfg = config::resolve_config(project_root)?;
    drop(super::open_ledger(&cfg)?);

    tracing::info!(path = %state_dir.display(), "initialized claimlog project");

    let report = InitReport {
        state_dir: state_dir.display().to_string(),
        config: config_path.display().to_string(),
        database: cfg.db_path.display().to_string(),
    };
    render(output, &report, |r, w| {
        writeln!(w, "Initialized claimlog project")?;
        pretty_kv(w, "config", &r.config)?;
        pretty_kv(w, "database", &r.database)
    })
}
