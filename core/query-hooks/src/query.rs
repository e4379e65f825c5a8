//! Filter mode: stream matching raw events back out as JSON.

use std::collections::VecDeque;
use std::io::{self, Write};

use observatory_protocol::{parse_line, HookEvent};
use serde_json::{Map, Value};

use crate::render::write_json;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Event kinds to keep; empty keeps every kind.
    pub events: Vec<String>,
    pub tool: Option<String>,
    /// Session id prefix.
    pub session: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &HookEvent) -> bool {
        if !self.events.is_empty() && !self.events.iter().any(|kind| kind == event.kind.as_str()) {
            return false;
        }
        if let Some(tool) = &self.tool {
            if event.tool_name.as_deref() != Some(tool.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.session {
            let session_id = event.session_id.as_deref().unwrap_or("");
            if !session_id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub filter: EventFilter,
    /// Raw keys to keep, in this order. `None` keeps the whole event.
    pub columns: Option<Vec<String>>,
    /// Keep only the last N matches.
    pub last: Option<usize>,
    pub jsonl: bool,
}

/// The listed keys of `raw` that are present, in column order.
pub fn select_columns(raw: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    columns
        .iter()
        .filter_map(|key| raw.get(key).map(|value| (key.clone(), value.clone())))
        .collect()
}

/// Writes every matching event and returns how many were written.
///
/// Without `last` events are written as they are found; with it only the
/// tail is buffered.
pub fn run_filter<I, S>(lines: I, options: &FilterOptions, out: &mut dyn Write) -> io::Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tail_size = options.last.filter(|last| *last > 0);
    let mut tail: VecDeque<Map<String, Value>> = VecDeque::new();
    let mut written = 0;

    for line in lines {
        let event = match parse_line(line.as_ref()) {
            Ok(Some(event)) => event,
            Ok(None) | Err(_) => continue,
        };
        if !options.filter.matches(&event) {
            continue;
        }
        let selected = match &options.columns {
            Some(columns) => select_columns(&event.raw, columns),
            None => event.raw,
        };

        match tail_size {
            Some(size) => {
                if tail.len() == size {
                    tail.pop_front();
                }
                tail.push_back(selected);
            }
            None => {
                write_json(out, &[selected], options.jsonl)?;
                written += 1;
            }
        }
    }

    let tail: Vec<_> = tail.into_iter().collect();
    write_json(out, &tail, options.jsonl)?;
    Ok(written + tail.len())
}
