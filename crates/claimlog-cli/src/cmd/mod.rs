pub mod init;
pub mod log;
pub mod record;
pub mod status;
pub mod sync;

use crate::output::CliError;
use anyhow::{Context as _, Result};
use claimlog_core::SqliteLedger;
use claimlog_core::config::{self, EffectiveConfig, STATE_DIR};
use claimlog_core::error::ErrorCode;
use std::path::Path;

/// Resolve config for an initialized project, failing with `E1001` if
/// `.claimlog/` is missing.
pub fn require_project(project_root: &Path) -> Result<EffectiveConfig> {
    if !project_root.join(STATE_DIR).is_dir() {
        return Err(
            CliError::new(ErrorCode::NotInitialized, format!("{STATE_DIR}/ not found"))
                .into_anyhow(),
        );
    }
    config::resolve_config(project_root).map_err(|err| {
        CliError::new(ErrorCode::ConfigParseError, format!("{err:#}")).into_anyhow()
    })
}

/// Open the claims database named by `cfg`.
pub fn open_ledger(cfg: &EffectiveConfig) -> Result<SqliteLedger> {
    SqliteLedger::open(&cfg.db_path)
        .with_context(|| format!("open claims database {}", cfg.db_path.display()))
}
