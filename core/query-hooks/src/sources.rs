//! Where event lines come from.
//!
//! Explicit `--file` paths win, then the observatory's log directory, then
//! piped stdin. Rotated logs (`*.log.N`) are read before the live `*.log`
//! files, highest N first, so lines arrive oldest first.

use std::io::{BufRead, BufReader, IsTerminal, Read};
use std::path::{Path, PathBuf};

use observatory_core::{ObservatoryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Files(Vec<PathBuf>),
    Stdin,
}

impl EventSource {
    /// File names for the summary line; empty for stdin.
    pub fn display_names(&self) -> String {
        match self {
            EventSource::Files(paths) => paths
                .iter()
                .map(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string())
                })
                .collect::<Vec<_>>()
                .join(", "),
            EventSource::Stdin => String::new(),
        }
    }
}

pub fn resolve_source(files: &[PathBuf], log_dir: &Path) -> Result<EventSource> {
    resolve_source_with(files, log_dir, std::io::stdin().is_terminal())
}

fn resolve_source_with(
    files: &[PathBuf],
    log_dir: &Path,
    stdin_is_terminal: bool,
) -> Result<EventSource> {
    if !files.is_empty() {
        return Ok(EventSource::Files(files.to_vec()));
    }
    let discovered = discover_log_files(log_dir);
    if !discovered.is_empty() {
        return Ok(EventSource::Files(discovered));
    }
    if !stdin_is_terminal {
        return Ok(EventSource::Stdin);
    }
    Err(ObservatoryError::NoEventSource(format!(
        "no log files found in {}; pipe JSONL into stdin or pass --file",
        log_dir.display()
    )))
}

/// Log files in `log_dir`: rotated `*.log.N` (highest N first), then `*.log`
/// in name order.
pub fn discover_log_files(log_dir: &Path) -> Vec<PathBuf> {
    let entries = match fs_err::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(error = %err, "Log directory unavailable");
            return Vec::new();
        }
    };

    let mut current: Vec<PathBuf> = Vec::new();
    let mut rotated: Vec<(u64, PathBuf)> = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".log") {
            current.push(path);
        } else if let Some(generation) = rotation_number(&name) {
            rotated.push((generation, path));
        }
    }

    current.sort();
    rotated.sort_by(|(left, left_path), (right, right_path)| {
        right.cmp(left).then_with(|| left_path.cmp(right_path))
    });
    rotated
        .into_iter()
        .map(|(_, path)| path)
        .chain(current)
        .collect()
}

/// `N` from `name.log.N`.
fn rotation_number(name: &str) -> Option<u64> {
    let (stem, suffix) = name.rsplit_once('.')?;
    if !stem.ends_with(".log") || suffix.is_empty() {
        return None;
    }
    suffix.parse().ok()
}

/// Reads every line from `source`.
///
/// Unreadable files are warned about and skipped. When files were requested
/// and none could be opened the pass has no input and fails.
pub fn read_lines(source: &EventSource) -> Result<Vec<String>> {
    match source {
        EventSource::Stdin => {
            collect_lines(std::io::stdin().lock()).map_err(|err| ObservatoryError::Io {
                context: "reading stdin".to_string(),
                source: err,
            })
        }
        EventSource::Files(paths) => {
            let mut lines = Vec::new();
            let mut opened = 0;
            for path in paths {
                let file = match fs_err::File::open(path) {
                    Ok(file) => file,
                    Err(err) => {
                        tracing::warn!(error = %err, "Skipping unreadable event log");
                        continue;
                    }
                };
                opened += 1;
                match collect_lines(file) {
                    Ok(file_lines) => lines.extend(file_lines),
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %err,
                            "Event log read failed"
                        );
                    }
                }
            }
            if opened == 0 {
                return Err(ObservatoryError::NoEventSource(format!(
                    "none of {} could be opened",
                    source.display_names()
                )));
            }
            Ok(lines)
        }
    }
}

/// Lines of `reader`; invalid UTF-8 is replaced rather than fatal.
fn collect_lines<R: Read>(reader: R) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        lines.push(String::from_utf8_lossy(&buffer).trim_end_matches(['\n', '\r']).to_string());
    }
    Ok(lines)
}
