//! Output formatting: table, JSON, JSON lines, YAML, plain.
//!
//! Renders entity snapshots in the format selected by `--output`. Table
//! uses `tabled`, structured formats use serde, plain emits one id per
//! line.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use emitwatch_core::TelemetryEntity;

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled on stderr.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// A status line for stderr, green when color is on.
pub fn success(message: &str, color: bool) -> String {
    if color {
        format!("{} {message}", "✓".green())
    } else {
        format!("✓ {message}")
    }
}

/// A warning line for stderr, yellow when color is on.
pub fn notice(message: &str, color: bool) -> String {
    if color {
        message.yellow().to_string()
    } else {
        message.to_owned()
    }
}

// ── Entity rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Lat")]
    lat: String,
    #[tabled(rename = "Lon")]
    lon: String,
    #[tabled(rename = "Heading")]
    heading: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&TelemetryEntity> for EntityRow {
    fn from(e: &TelemetryEntity) -> Self {
        Self {
            id: e.id.clone(),
            label: e.label.clone(),
            lat: format!("{:.6}", e.latitude),
            lon: format!("{:.6}", e.longitude),
            heading: e
                .normalized_heading()
                .map_or_else(|| "-".into(), |h| format!("{h:.1}")),
            updated: format_time(e.last_update),
        }
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render one snapshot of the live map in the chosen format.
pub fn render_snapshot<E>(format: OutputFormat, entities: &[E]) -> Result<String, serde_json::Error>
where
    E: AsRef<TelemetryEntity> + serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => {
            if entities.is_empty() {
                "(no emitters)".into()
            } else {
                let rows: Vec<EntityRow> =
                    entities.iter().map(|e| EntityRow::from(e.as_ref())).collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
        }
        OutputFormat::Json => serde_json::to_string_pretty(entities)?,
        OutputFormat::JsonLines => serde_json::to_string(entities)?,
        OutputFormat::Yaml => render_yaml(entities),
        OutputFormat::Plain => entities
            .iter()
            .map(|e| e.as_ref().id.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    match serde_yaml::to_string(data) {
        Ok(doc) => format!("---\n{}", doc.trim_end()),
        Err(e) => format!("# yaml serialization failed: {e}"),
    }
}

/// Print rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

/// Clear an interactive terminal before redrawing a table.
pub fn clear_screen() {
    if io::stdout().is_terminal() {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\x1b[2J\x1b[H");
    }
}
