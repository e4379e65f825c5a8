//! Hook event schema for the observatory.
//!
//! Producers append one JSON object per line (`_event`, `_ts`, plus the raw
//! hook payload). This crate is shared by everything that reads those lines so
//! the field names and the tracked-event rules live in one place.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Notification types that change session state. Other notification types
/// are ignored for state purposes.
pub const WAITING_NOTIFICATION_TYPES: [&str; 3] =
    ["permission_prompt", "idle_prompt", "elicitation_dialog"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    Stop,
    PermissionRequest,
    Notification,
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    UserPromptSubmit,
    SubagentStart,
    SubagentStop,
    /// Any hook the observatory does not derive state from (PreCompact,
    /// TeammateIdle, ...), or an empty name when `_event` is missing.
    Other(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "SessionStart" => EventKind::SessionStart,
            "SessionEnd" => EventKind::SessionEnd,
            "Stop" => EventKind::Stop,
            "PermissionRequest" => EventKind::PermissionRequest,
            "Notification" => EventKind::Notification,
            "PreToolUse" => EventKind::PreToolUse,
            "PostToolUse" => EventKind::PostToolUse,
            "PostToolUseFailure" => EventKind::PostToolUseFailure,
            "UserPromptSubmit" => EventKind::UserPromptSubmit,
            "SubagentStart" => EventKind::SubagentStart,
            "SubagentStop" => EventKind::SubagentStop,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::SessionStart => "SessionStart",
            EventKind::SessionEnd => "SessionEnd",
            EventKind::Stop => "Stop",
            EventKind::PermissionRequest => "PermissionRequest",
            EventKind::Notification => "Notification",
            EventKind::PreToolUse => "PreToolUse",
            EventKind::PostToolUse => "PostToolUse",
            EventKind::PostToolUseFailure => "PostToolUseFailure",
            EventKind::UserPromptSubmit => "UserPromptSubmit",
            EventKind::SubagentStart => "SubagentStart",
            EventKind::SubagentStop => "SubagentStop",
            EventKind::Other(name) => name,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed line of the event log.
///
/// The typed fields are lifted out of `raw`; a field holding a non-string JSON
/// value is treated as absent. `raw` keeps the original object (key order
/// included) so it can be re-emitted untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub kind: EventKind,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub ts: Option<String>,
    pub tool_name: Option<String>,
    pub notification_type: Option<String>,
    pub message: Option<String>,
    pub raw: Map<String, Value>,
}

impl HookEvent {
    pub fn from_object(raw: Map<String, Value>) -> Self {
        let field = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            kind: EventKind::from_name(raw.get("_event").and_then(Value::as_str).unwrap_or("")),
            session_id: field("session_id"),
            cwd: field("cwd"),
            ts: field("_ts"),
            tool_name: field("tool_name"),
            notification_type: field("notification_type"),
            message: field("message"),
            raw,
        }
    }

    /// Whether this event participates in session-state derivation.
    ///
    /// Notifications only count for the waiting notification types.
    pub fn is_tracked(&self) -> bool {
        match self.kind {
            EventKind::Other(_) => false,
            EventKind::Notification => self
                .notification_type
                .as_deref()
                .is_some_and(|kind| WAITING_NOTIFICATION_TYPES.contains(&kind)),
            _ => true,
        }
    }

    /// Session id, treating an empty string as missing.
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Working directory, treating an empty string as missing.
    pub fn cwd_path(&self) -> Option<&str> {
        self.cwd.as_deref().filter(|cwd| !cwd.is_empty())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.ts.as_deref().and_then(parse_timestamp)
    }
}

/// Parses one log line.
///
/// Returns `Ok(None)` for lines that are not event candidates (blank, or not
/// starting with `{` after trimming, e.g. YAML separators from pretty
/// printers). Candidate lines that fail to parse as a JSON object are errors.
pub fn parse_line(line: &str) -> Result<Option<HookEvent>, ErrorInfo> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| ErrorInfo::new("invalid_json", format!("line is invalid JSON: {}", err)))?;
    match value {
        Value::Object(map) => Ok(Some(HookEvent::from_object(map))),
        _ => Err(ErrorInfo::new(
            "not_an_object",
            "line is not a single JSON object",
        )),
    }
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| parsed.and_utc())
}
