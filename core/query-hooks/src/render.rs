//! Output formats for session-state records: table, CSV, JSON.

use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use observatory_core::{OutputRecord, VERSION};
use observatory_protocol::parse_timestamp;
use serde::Serialize;

pub const DEFAULT_TABLE_COLUMNS: [&str; 6] =
    ["tmux_target", "state", "ago", "project", "reason", "session_id"];

/// Display limits and help text for one `--waiting` column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub min_width: usize,
    pub max_width: usize,
    pub description: &'static str,
}

const fn column(
    name: &'static str,
    min_width: usize,
    max_width: usize,
    description: &'static str,
) -> ColumnSpec {
    ColumnSpec {
        name,
        min_width,
        max_width,
        description,
    }
}

const FALLBACK_WIDTH: (usize, usize) = (8, 30);

pub const KNOWN_COLUMNS: &[ColumnSpec] = &[
    column(
        "state",
        8,
        20,
        "Session state: FRESH, PERMIT, QUESTION, IDLE, RUN:*, DEAD. Derived from the last \
         tracked hook event and whether a live claude process was matched.",
    ),
    column(
        "ago",
        8,
        12,
        "Time since the last tracked event (e.g. '5m ago'). Computed from _ts.",
    ),
    column(
        "project",
        10,
        35,
        "Short project name: org/repo from the git remote when there is one, otherwise the \
         last two components of the git root or of start_cwd (or cwd).",
    ),
    column(
        "reason",
        6,
        20,
        "Detail beyond the state: tool name for PERMIT, question text for QUESTION, empty \
         when the state says it all (IDLE, FRESH, RUN:Tool).",
    ),
    column(
        "session_id",
        12,
        12,
        "Claude Code session UUID. Stable across resumes. Truncated in table mode.",
    ),
    column(
        "cwd",
        10,
        60,
        "Working directory from the most recent hook event. Drifts as Claude moves around.",
    ),
    column(
        "start_cwd",
        10,
        60,
        "Working directory from SessionStart, where claude was launched. Preferred for \
         process matching.",
    ),
    column(
        "alive",
        8,
        30,
        "true for every state except DEAD.",
    ),
    column(
        "match",
        8,
        30,
        "How the live process was matched: exact:start, exact:last, ancestor:start, \
         ancestor:last, or empty when dead.",
    ),
    column(
        "_ts",
        8,
        30,
        "ISO 8601 timestamp of the last tracked hook event (e.g. '2026-02-17T19:09:44+00:00').",
    ),
    column(
        "_version",
        8,
        30,
        "query-hooks version that produced the record.",
    ),
    column(
        "tmux_session",
        8,
        20,
        "tmux session name (e.g. 'main'). Empty when the session is not inside tmux.",
    ),
    column(
        "tmux_window",
        6,
        6,
        "tmux window index within the session (e.g. '2').",
    ),
    column(
        "tmux_pane",
        5,
        5,
        "tmux pane index within the window (e.g. '0').",
    ),
    column(
        "tmux_cwd",
        10,
        60,
        "Current path of the tmux pane. May differ from cwd.",
    ),
    column(
        "tmux_target",
        10,
        20,
        "tmux target as session:window.pane (e.g. 'main:2.0'), with ' [server]' appended \
         for non-default servers. Usable with 'tmux [-L server] select-pane -t'.",
    ),
];

const PATH_COLUMNS: [&str; 4] = ["cwd", "start_cwd", "tmux_cwd", "project"];

fn column_spec(name: &str) -> Option<&'static ColumnSpec> {
    KNOWN_COLUMNS.iter().find(|spec| spec.name == name)
}

/// Splits a `--columns` value. With `validate`, every name must be a known
/// `--waiting` column.
pub fn parse_columns(spec: &str, validate: bool) -> Result<Vec<String>, String> {
    let columns: Vec<String> = spec
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if !validate {
        return Ok(columns);
    }

    let unknown: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|name| column_spec(name).is_none())
        .collect();
    if unknown.is_empty() {
        return Ok(columns);
    }

    let mut available: Vec<&str> = KNOWN_COLUMNS.iter().map(|spec| spec.name).collect();
    available.sort_unstable();
    Err(format!(
        "unknown column(s): {}\nAvailable: {}",
        unknown.join(", "),
        available.join(", ")
    ))
}

pub fn default_columns() -> Vec<String> {
    DEFAULT_TABLE_COLUMNS.iter().map(|name| name.to_string()).collect()
}

/// `5s ago`, `12m ago`, `3h 4m ago`, `2d ago`; `just now` for future stamps
/// and `?` when the stamp does not parse.
pub fn time_ago(ts: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(ts) else {
        return "?".to_string();
    };
    let secs = (now - then).num_seconds();
    match secs {
        _ if secs < 0 => "just now".to_string(),
        0..=59 => format!("{}s ago", secs),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h {}m ago", secs / 3_600, (secs % 3_600) / 60),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// Column value as displayed, including the virtual `ago` column.
pub fn cell(record: &OutputRecord, column: &str, now: DateTime<Utc>) -> String {
    if column == "ago" {
        time_ago(&record.ts, now)
    } else {
        record.column(column)
    }
}

fn truncate(value: &str, column: &str, width: usize) -> String {
    let length = value.chars().count();
    if length <= width {
        return value.to_string();
    }
    let keep = width.saturating_sub(3);
    if PATH_COLUMNS.contains(&column) {
        let tail: String = value.chars().skip(length - keep).collect();
        format!("...{}", tail)
    } else {
        let head: String = value.chars().take(keep).collect();
        format!("{}...", head)
    }
}

pub fn write_table(
    out: &mut dyn Write,
    records: &[OutputRecord],
    columns: &[String],
    now: DateTime<Utc>,
) -> io::Result<()> {
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|record| columns.iter().map(|name| cell(record, name, now)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let (min_width, max_width) = column_spec(name)
                .map(|spec| (spec.min_width, spec.max_width))
                .unwrap_or(FALLBACK_WIDTH);
            let data_width = cells
                .iter()
                .map(|row| row[index].chars().count())
                .max()
                .unwrap_or(0);
            data_width.max(name.len()).min(max_width).max(min_width)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, &width)| align(name, &name.to_uppercase(), width))
        .collect();
    let separator: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, &width)| {
            let rule = if name == "ago" {
                "---".to_string()
            } else {
                "-".repeat(name.len().min(width))
            };
            align(name, &rule, width)
        })
        .collect();
    writeln!(out, "{}", header.join("  "))?;
    writeln!(out, "{}", separator.join("  "))?;

    for row in &cells {
        let parts: Vec<String> = columns
            .iter()
            .zip(&widths)
            .zip(row)
            .map(|((name, &width), value)| align(name, &truncate(value, name, width), width))
            .collect();
        writeln!(out, "{}", parts.join("  "))?;
    }
    Ok(())
}

fn align(column: &str, value: &str, width: usize) -> String {
    if column == "ago" {
        format!("{:>width$}", value, width = width)
    } else {
        format!("{:<width$}", value, width = width)
    }
}

/// CSV with a header row. Fields are quoted only when they contain a comma,
/// a quote, or a line break.
pub fn write_csv(
    out: &mut dyn Write,
    records: &[OutputRecord],
    columns: &[String],
    now: DateTime<Utc>,
) -> io::Result<()> {
    write_csv_row(out, columns.iter().map(String::as_str))?;
    for record in records {
        let values: Vec<String> = columns.iter().map(|name| cell(record, name, now)).collect();
        write_csv_row(out, values.iter().map(String::as_str))?;
    }
    Ok(())
}

fn write_csv_row<'a>(out: &mut dyn Write, fields: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let escaped: Vec<String> = fields.map(csv_field).collect();
    write!(out, "{}\r\n", escaped.join(","))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One JSON document per item: compact lines with `jsonl`, indented otherwise.
pub fn write_json<T: Serialize>(out: &mut dyn Write, items: &[T], jsonl: bool) -> io::Result<()> {
    for item in items {
        let text = if jsonl {
            serde_json::to_string(item)
        } else {
            serde_json::to_string_pretty(item)
        }
        .map_err(io::Error::other)?;
        writeln!(out, "{}", text)?;
    }
    Ok(())
}

/// Two stderr lines: counts per state group with sources and timing, then
/// counts per match method.
pub fn write_summary(
    err: &mut dyn Write,
    records: &[OutputRecord],
    source_names: &str,
    elapsed: Option<Duration>,
) -> io::Result<()> {
    let groups = tally(records.iter().map(OutputRecord::group_name));
    let mut parts = vec![format!("{} ({} total)", groups, records.len())];
    if !source_names.is_empty() {
        parts.push(format!("from {}", source_names));
    }
    if let Some(elapsed) = elapsed {
        parts.push(format!("in {:.3}s (v{})", elapsed.as_secs_f64(), VERSION));
    }
    writeln!(err, "{}", parts.join(" | "))?;

    let methods = tally(records.iter().map(|record| {
        if record.match_method.is_empty() {
            "dead"
        } else {
            record.match_method.as_str()
        }
    }));
    writeln!(err, "  liveness: {}", methods)
}

/// `2 FRESH, 1 RUN` in first-seen order.
fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for key in keys {
        match counts.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 += 1,
            None => counts.push((key, 1)),
        }
    }
    counts
        .iter()
        .map(|(key, count)| format!("{} {}", count, key))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn write_columns_help(out: &mut dyn Write) -> io::Result<()> {
    let name_width = KNOWN_COLUMNS
        .iter()
        .map(|spec| spec.name.len())
        .max()
        .unwrap_or(0);
    let mut specs: Vec<&ColumnSpec> = KNOWN_COLUMNS.iter().collect();
    specs.sort_by_key(|spec| spec.name);

    writeln!(
        out,
        "Available columns for --waiting mode (default: {}):\n",
        DEFAULT_TABLE_COLUMNS.join(",")
    )?;
    for spec in specs {
        let marker = if DEFAULT_TABLE_COLUMNS.contains(&spec.name) {
            " *"
        } else {
            "  "
        };
        writeln!(
            out,
            " {} {:<width$}  {}",
            marker,
            spec.name,
            spec.description,
            width = name_width
        )?;
    }
    writeln!(out, "\n * = included in default table output")?;
    writeln!(
        out,
        "\nIn filter mode (no --waiting), --columns selects keys from the raw event JSON"
    )?;
    writeln!(out, "without validation; any key present in the event is included.")
}
