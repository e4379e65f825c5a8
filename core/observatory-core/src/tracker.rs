//! Folds the hook event stream into one record per session.
//!
//! ```text
//! SessionStart           → last_event, start_cwd (first one only)
//! SessionEnd             → last_event, terminated
//! other tracked kinds    → last_event
//! untracked kinds        → cwd bookkeeping only
//! ```
//!
//! Events are applied in arrival order; nothing is reordered by timestamp.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use observatory_protocol::{parse_line, EventKind, HookEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    /// Most recent tracked event (including `SessionEnd`).
    pub last_event: Option<HookEvent>,
    pub terminated: bool,
    /// Launch directory from the first `SessionStart`; empty until one is seen.
    pub start_cwd: String,
    /// Latest non-empty `cwd` seen on any event.
    pub cwd: String,
}

impl SessionRecord {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            last_event: None,
            terminated: false,
            start_cwd: String::new(),
            cwd: String::new(),
        }
    }

    /// Timestamp of the last tracked event, if it has a parsable one.
    pub fn last_event_time(&self) -> Option<DateTime<Utc>> {
        self.last_event.as_ref().and_then(HookEvent::timestamp)
    }

    /// Raw `_ts` of the last tracked event, or empty.
    pub fn last_event_ts(&self) -> &str {
        self.last_event
            .as_ref()
            .and_then(|event| event.ts.as_deref())
            .unwrap_or("")
    }

    fn apply(&mut self, event: HookEvent) {
        if let Some(cwd) = event.cwd_path() {
            self.cwd = cwd.to_string();
            if event.kind == EventKind::SessionStart && self.start_cwd.is_empty() {
                self.start_cwd = cwd.to_string();
            }
        }

        if event.kind == EventKind::SessionEnd {
            self.terminated = true;
            self.last_event = Some(event);
        } else if event.is_tracked() {
            self.last_event = Some(event);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub events: usize,
    pub malformed: usize,
    pub missing_session: usize,
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    records: Vec<SessionRecord>,
    index: HashMap<String, usize>,
    history: Option<Vec<HookEvent>>,
    stats: IngestStats,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker that also keeps every waiting event (`Stop`,
    /// `PermissionRequest`, tracked `Notification`) in arrival order.
    pub fn with_history() -> Self {
        Self {
            history: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Builds a fresh tracker from a complete line stream.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tracker = Self::new();
        tracker.ingest_lines(lines);
        tracker
    }

    pub fn ingest_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.ingest_line(line.as_ref());
        }
        tracing::debug!(
            lines = self.stats.lines,
            events = self.stats.events,
            malformed = self.stats.malformed,
            missing_session = self.stats.missing_session,
            sessions = self.records.len(),
            "Event stream ingested"
        );
    }

    /// Parses and applies one line. Returns true if it changed a session.
    pub fn ingest_line(&mut self, line: &str) -> bool {
        self.stats.lines += 1;
        match parse_line(line) {
            Ok(Some(event)) => self.ingest(event),
            Ok(None) => false,
            Err(err) => {
                self.stats.malformed += 1;
                tracing::trace!(
                    code = %err.code,
                    message = %err.message,
                    "Dropping malformed line"
                );
                false
            }
        }
    }

    /// Applies one parsed event. Events without a session id are dropped.
    pub fn ingest(&mut self, event: HookEvent) -> bool {
        let Some(session_id) = event.session() else {
            self.stats.missing_session += 1;
            return false;
        };
        self.stats.events += 1;

        let position = match self.index.get(session_id) {
            Some(position) => *position,
            None => {
                let position = self.records.len();
                self.index.insert(session_id.to_string(), position);
                self.records.push(SessionRecord::new(session_id));
                position
            }
        };

        if let Some(history) = self.history.as_mut() {
            if is_waiting_event(&event) {
                history.push(event.clone());
            }
        }

        self.records[position].apply(event);
        true
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.index
            .get(session_id)
            .map(|position| &self.records[*position])
    }

    /// All records in first-seen order, terminated ones included.
    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    /// Records that take part in liveness and assignment.
    pub fn active_records(&self) -> impl Iterator<Item = &SessionRecord> {
        self.records.iter().filter(|record| !record.terminated)
    }

    pub fn waiting_history(&self) -> &[HookEvent] {
        self.history.as_deref().unwrap_or(&[])
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_waiting_event(event: &HookEvent) -> bool {
    event.is_tracked()
        && matches!(
            event.kind,
            EventKind::Stop | EventKind::PermissionRequest | EventKind::Notification
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = r#"{"_ts":"2026-02-17T19:00:00+00:00","_event":"SessionStart","session_id":"s1","cwd":"/p"}"#;
    const TOOL: &str = r#"{"_ts":"2026-02-17T19:01:00+00:00","_event":"PreToolUse","session_id":"s1","cwd":"/p/src","tool_name":"Bash"}"#;
    const COMPACT: &str = r#"{"_ts":"2026-02-17T19:02:00+00:00","_event":"PreCompact","session_id":"s1","cwd":"/p/docs"}"#;
    const END: &str = r#"{"_ts":"2026-02-17T19:03:00+00:00","_event":"SessionEnd","session_id":"s1"}"#;

    #[test]
    fn creates_record_on_first_event() {
        let tracker = SessionTracker::from_lines([START]);
        let record = tracker.get("s1").expect("record");
        assert_eq!(record.start_cwd, "/p");
        assert_eq!(record.cwd, "/p");
        assert!(!record.terminated);
        assert_eq!(
            record.last_event.as_ref().map(|event| event.kind.clone()),
            Some(EventKind::SessionStart)
        );
    }

    #[test]
    fn untracked_events_only_move_cwd() {
        let tracker = SessionTracker::from_lines([START, TOOL, COMPACT]);
        let record = tracker.get("s1").expect("record");
        assert_eq!(record.cwd, "/p/docs");
        assert_eq!(record.start_cwd, "/p");
        assert_eq!(
            record.last_event.as_ref().map(|event| event.kind.clone()),
            Some(EventKind::PreToolUse)
        );
    }

    #[test]
    fn start_cwd_is_write_once() {
        let restart = r#"{"_event":"SessionStart","session_id":"s1","cwd":"/elsewhere"}"#;
        let tracker = SessionTracker::from_lines([START, restart]);
        let record = tracker.get("s1").expect("record");
        assert_eq!(record.start_cwd, "/p");
        assert_eq!(record.cwd, "/elsewhere");
    }

    #[test]
    fn start_cwd_stays_empty_without_session_start() {
        let tracker = SessionTracker::from_lines([TOOL]);
        let record = tracker.get("s1").expect("record");
        assert_eq!(record.start_cwd, "");
        assert_eq!(record.cwd, "/p/src");
    }

    #[test]
    fn empty_cwd_does_not_replace_known_cwd() {
        let stop = r#"{"_event":"Stop","session_id":"s1","cwd":""}"#;
        let tracker = SessionTracker::from_lines([START, stop]);
        assert_eq!(tracker.get("s1").expect("record").cwd, "/p");
    }

    #[test]
    fn session_end_terminates_and_is_last_event() {
        let tracker = SessionTracker::from_lines([START, TOOL, END]);
        let record = tracker.get("s1").expect("record");
        assert!(record.terminated);
        assert_eq!(
            record.last_event.as_ref().map(|event| event.kind.clone()),
            Some(EventKind::SessionEnd)
        );
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.active_records().count(), 0);
    }

    #[test]
    fn ignored_notification_types_do_not_become_last_event() {
        let auth = r#"{"_event":"Notification","session_id":"s1","notification_type":"auth_success"}"#;
        let tracker = SessionTracker::from_lines([START, auth]);
        assert_eq!(
            tracker
                .get("s1")
                .and_then(|record| record.last_event.as_ref())
                .map(|event| event.kind.clone()),
            Some(EventKind::SessionStart)
        );
    }

    #[test]
    fn drops_malformed_and_sessionless_lines() {
        let tracker = SessionTracker::from_lines([
            "",
            "---",
            "{broken",
            r#"{"_event":"Stop"}"#,
            r#"{"_event":"Stop","session_id":""}"#,
            START,
        ]);
        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.stats(),
            &IngestStats {
                lines: 6,
                events: 1,
                malformed: 1,
                missing_session: 2,
            }
        );
    }

    #[test]
    fn reingesting_the_same_line_is_idempotent() {
        let once = SessionTracker::from_lines([START, TOOL]);
        let twice = SessionTracker::from_lines([START, TOOL, TOOL]);
        assert_eq!(once.get("s1"), twice.get("s1"));
    }

    #[test]
    fn records_keep_first_seen_order() {
        let other = r#"{"_event":"Stop","session_id":"s0","cwd":"/q"}"#;
        let tracker = SessionTracker::from_lines([START, other, TOOL]);
        let ids: Vec<_> = tracker
            .records()
            .iter()
            .map(|record| record.session_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s1", "s0"]);
    }

    #[test]
    fn history_collects_waiting_events_only() {
        let permit = r#"{"_event":"PermissionRequest","session_id":"s1","tool_name":"Bash"}"#;
        let idle = r#"{"_event":"Notification","session_id":"s1","notification_type":"idle_prompt"}"#;
        let auth = r#"{"_event":"Notification","session_id":"s1","notification_type":"auth_success"}"#;
        let stop = r#"{"_event":"Stop","session_id":"s1"}"#;

        let mut tracker = SessionTracker::with_history();
        tracker.ingest_lines([START, permit, TOOL, idle, auth, stop]);

        let kinds: Vec<_> = tracker
            .waiting_history()
            .iter()
            .map(|event| event.kind.as_str().to_string())
            .collect();
        assert_eq!(kinds, vec!["PermissionRequest", "Notification", "Stop"]);
        assert!(SessionTracker::from_lines([stop]).waiting_history().is_empty());
    }
}
