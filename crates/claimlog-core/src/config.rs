use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the project root holding config, database, and locks.
pub const STATE_DIR: &str = ".claimlog";

/// Environment variable that overrides `remote.token`.
pub const TOKEN_ENV: &str = "CLAIMLOG_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Provenance label written on anchors and engine-derived entries.
    #[serde(default = "default_engine_name")]
    pub name: String,
    /// How long `sync` waits for another run on the same identifier.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Snapshot URL template with an `{identifier}` placeholder.
    #[serde(default)]
    pub snapshot_url: Option<String>,
    /// Update feed URL template with an `{identifier}` placeholder.
    #[serde(default)]
    pub updates_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            snapshot_url: None,
            updates_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path; relative paths resolve against the project root.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Config with paths resolved against a project root and env overrides
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub db_path: PathBuf,
    pub locks_dir: PathBuf,
    pub token: Option<String>,
}

/// Path of the project config file.
#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join("config.toml")
}

/// Load `.claimlog/config.toml`, or defaults if it doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the project config and resolve paths and overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded.
pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let env_token = env::var(TOKEN_ENV).ok();
    Ok(resolve_with(project_root, project, env_token))
}

fn resolve_with(
    project_root: &Path,
    project: ProjectConfig,
    env_token: Option<String>,
) -> EffectiveConfig {
    let state_dir = project_root.join(STATE_DIR);
    let db_path = match &project.storage.db_path {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => project_root.join(path),
        None => state_dir.join("claims.db"),
    };
    let token = env_token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| project.remote.token.clone());

    EffectiveConfig {
        project,
        db_path,
        locks_dir: state_dir.join("locks"),
        token,
    }
}

/// Default config file contents written by `claimlog init`.
#[must_use]
pub fn default_config_toml() -> String {
    format!(
        r#"[engine]
name = "{name}"
lock_timeout_ms = {lock}

[remote]
# snapshot_url = "https://api.example.org/v1/{{identifier}}/claims"
# updates_url = "https://api.example.org/v1/{{identifier}}/updates"
timeout_secs = {timeout}

[storage]
# db_path = ".claimlog/claims.db"
"#,
        name = default_engine_name(),
        lock = default_lock_timeout_ms(),
        timeout = default_timeout_secs(),
    )
}

fn default_engine_name() -> String {
    "claims-importer".to_string()
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

const fn default_timeout_secs() -> u64 {
    30
}
