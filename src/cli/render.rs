//! Plain-text and JSON rendering of engine state.

use crate::config::KeeprConfig;
use crate::engine::Provenance;
use crate::models::Memory;
use crate::{Error, Result};
use std::io::Write;

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// Pretty-printed JSON array.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown values fall back to the table.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

const TITLE_WIDTH: usize = 40;

fn write_failed(e: impl std::fmt::Display) -> Error {
    Error::operation_failed("write_output", e.to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Renders the memory wall.
///
/// Locked memories show only their stub; descriptions appear for unlocked
/// ones.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if writing fails.
pub fn render_wall<W: Write>(
    out: &mut W,
    memories: &[Memory],
    provenance: Provenance,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, memories).map_err(write_failed)?;
        return writeln!(out).map_err(write_failed);
    }

    if memories.is_empty() {
        return writeln!(out, "No memories found.").map_err(write_failed);
    }

    let id_width = memories
        .iter()
        .map(|m| m.id.as_str().len())
        .max()
        .unwrap_or(2)
        .max(2);

    writeln!(
        out,
        "{:<id_width$}  {:<8}  {:<10}  TITLE",
        "ID", "STATE", "CREATED"
    )
    .map_err(write_failed)?;
    for memory in memories {
        writeln!(
            out,
            "{:<id_width$}  {:<8}  {:<10}  {}",
            memory.id.as_str(),
            memory.access_state.as_str(),
            memory.created_at.format("%Y-%m-%d").to_string(),
            truncate(&memory.title, TITLE_WIDTH)
        )
        .map_err(write_failed)?;
        if !memory.is_locked() && !memory.description.is_empty() {
            writeln!(
                out,
                "{:<id_width$}  {}",
                "",
                truncate(&memory.description, TITLE_WIDTH + 22)
            )
            .map_err(write_failed)?;
        }
    }

    if provenance == Provenance::Placeholder {
        writeln!(out, "\n(placeholder memories: the memory service is unavailable)")
            .map_err(write_failed)?;
    }
    Ok(())
}

/// Renders a single memory.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if writing fails.
pub fn render_memory<W: Write>(out: &mut W, memory: &Memory, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, memory).map_err(write_failed)?;
        return writeln!(out).map_err(write_failed);
    }

    writeln!(out, "{} [{}]", memory.title, memory.access_state).map_err(write_failed)?;
    writeln!(out, "  id:      {}", memory.id).map_err(write_failed)?;
    writeln!(out, "  created: {}", memory.created_at.format("%Y-%m-%d")).map_err(write_failed)?;
    if let Some(owner) = &memory.owner {
        writeln!(out, "  by:      {}", owner.name).map_err(write_failed)?;
    }

    if memory.is_locked() {
        return writeln!(out, "\n  Locked. Run `keepr unlock {}` to reveal it.", memory.id)
            .map_err(write_failed);
    }

    if let Some(url) = &memory.image_url {
        writeln!(out, "  image:   {url}").map_err(write_failed)?;
    }
    if let Some(keyword) = memory.revealed_keyword() {
        writeln!(out, "  keyword: {keyword}").map_err(write_failed)?;
    }
    if !memory.description.is_empty() {
        writeln!(out, "\n  {}", memory.description).map_err(write_failed)?;
    }
    Ok(())
}

/// Renders the effective configuration. The token itself is never printed.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if writing fails.
pub fn render_config<W: Write>(out: &mut W, config: &KeeprConfig, authenticated: bool) -> Result<()> {
    let logging = &config.logging;
    let lines = [
        ("API URL", config.api_url.clone()),
        ("Data Directory", config.data_dir.display().to_string()),
        ("Scope", config.scope.to_string()),
        ("HTTP Timeout (ms)", config.http.timeout_ms.to_string()),
        ("Connect Timeout (ms)", config.http.connect_timeout_ms.to_string()),
        (
            "Log Format",
            logging.format.clone().unwrap_or_else(|| "pretty".to_string()),
        ),
        (
            "Log Filter",
            logging.filter.clone().unwrap_or_else(|| "(default)".to_string()),
        ),
        (
            "Log File",
            logging.file.clone().unwrap_or_else(|| "(stderr)".to_string()),
        ),
        (
            "Session",
            if authenticated { "token set (redacted)" } else { "anonymous" }.to_string(),
        ),
    ];

    writeln!(out, "Current Configuration").map_err(write_failed)?;
    writeln!(out, "=====================").map_err(write_failed)?;
    for (label, value) in lines {
        writeln!(out, "{label:<22}{value}").map_err(write_failed)?;
    }
    Ok(())
}
