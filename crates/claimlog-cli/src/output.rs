//! Shared output layer: human text or stable JSON for every command.

use claimlog_core::error::ErrorCode;
use serde::Serialize;
use std::io::{self, Write};

/// Output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Labelled text for terminals.
    Human,
    /// Machine-readable JSON, one document per command.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// A structured error with a machine code and optional hint.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    /// Machine-readable error code (`E####`).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: ErrorCode, detail: impl std::fmt::Display) -> Self {
        Self {
            code: code.code().to_string(),
            message: format!("{}: {detail}", code.message()),
            hint: code.hint().map(str::to_string),
        }
    }

    /// Convert into an `anyhow` error carrying the code, message, and hint.
    pub fn into_anyhow(self) -> anyhow::Error {
        match self.hint {
            Some(hint) => anyhow::anyhow!("{}: {}\nhint: {hint}", self.code, self.message),
            None => anyhow::anyhow!("{}: {}", self.code, self.message),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; otherwise
/// `human_fn` writes the text form.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human_fn(value, &mut out)?,
    }
    Ok(())
}
