//! ResolutionEngine - one resolution pass from raw lines to output records.
//!
//! A pass is self-contained: the session map is rebuilt from the full input,
//! the process table and tmux panes are captured once, and the project-name
//! caches are cleared up front. Nothing carries over between passes except
//! the engine's configuration and collaborators.
//!
//! ```rust,ignore
//! use observatory_core::{load_config, ResolutionEngine};
//!
//! let mut engine = ResolutionEngine::new(load_config(None)?);
//! let records = engine.run_pass(lines);
//! ```

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use observatory_protocol::{parse_timestamp, HookEvent};
use serde::Serialize;
use serde_json::Value;

use crate::assignment::assign;
use crate::config::ObservatoryConfig;
use crate::project::{FsRepoReader, ProjectNameResolver, RepoReader};
use crate::snapshot::{LivenessSnapshot, ProcessSource, SysinfoProcessSource};
use crate::state::{label_group, state_reason, SessionState};
use crate::tmux::{correlate_claimed, CommandTmuxAdapter, TmuxAdapter, TmuxPane};
use crate::tracker::SessionTracker;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pane columns attached to a record whose claimed process runs in tmux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TmuxColumns {
    pub tmux_session: String,
    pub tmux_window: String,
    pub tmux_pane: String,
    pub tmux_cwd: String,
    pub tmux_target: String,
}

impl From<&TmuxPane> for TmuxColumns {
    fn from(pane: &TmuxPane) -> Self {
        Self {
            tmux_session: pane.session_name.clone(),
            tmux_window: pane.window_index.clone(),
            tmux_pane: pane.pane_index.clone(),
            tmux_cwd: pane.pane_cwd.clone(),
            tmux_target: pane.target(),
        }
    }
}

/// One resolved session as presented to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    #[serde(rename = "_ts")]
    pub ts: String,
    pub session_id: String,
    pub state: String,
    pub alive: bool,
    #[serde(rename = "match")]
    pub match_method: String,
    pub reason: String,
    pub cwd: String,
    pub start_cwd: String,
    pub project: String,
    #[serde(rename = "_version")]
    pub version: String,
    #[serde(flatten)]
    pub tmux: Option<TmuxColumns>,
}

impl OutputRecord {
    /// Display group of `state`.
    pub fn group(&self) -> u8 {
        label_group(&self.state)
    }

    /// `RUN` for every running state, the label otherwise.
    pub fn group_name(&self) -> &str {
        if self.state.starts_with("RUN:") {
            "RUN"
        } else {
            self.state.as_str()
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.ts)
    }

    /// String value of a stored column; unknown and absent columns are empty.
    pub fn column(&self, name: &str) -> String {
        let tmux = self.tmux.as_ref();
        let tmux_value = |value: Option<&String>| value.cloned().unwrap_or_default();
        match name {
            "_ts" => self.ts.clone(),
            "session_id" => self.session_id.clone(),
            "state" => self.state.clone(),
            "alive" => self.alive.to_string(),
            "match" => self.match_method.clone(),
            "reason" => self.reason.clone(),
            "cwd" => self.cwd.clone(),
            "start_cwd" => self.start_cwd.clone(),
            "project" => self.project.clone(),
            "_version" => self.version.clone(),
            "tmux_session" => tmux_value(tmux.map(|columns| &columns.tmux_session)),
            "tmux_window" => tmux_value(tmux.map(|columns| &columns.tmux_window)),
            "tmux_pane" => tmux_value(tmux.map(|columns| &columns.tmux_pane)),
            "tmux_cwd" => tmux_value(tmux.map(|columns| &columns.tmux_cwd)),
            "tmux_target" => tmux_value(tmux.map(|columns| &columns.tmux_target)),
            _ => String::new(),
        }
    }
}

/// One historical waiting event (`Stop`, `PermissionRequest`, tracked
/// `Notification`), enriched with its reason and project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingRecord {
    #[serde(rename = "_ts")]
    pub ts: String,
    #[serde(rename = "_event")]
    pub event: String,
    pub session_id: String,
    pub reason: String,
    pub cwd: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

/// Resolves every tracked session against one snapshot.
///
/// Terminated sessions are left out. The result is ordered by state group,
/// then by last-event time descending; records without a usable timestamp
/// sort last within their group.
pub fn resolve<R: RepoReader>(
    tracker: &SessionTracker,
    snapshot: &LivenessSnapshot,
    projects: &mut ProjectNameResolver<R>,
) -> Vec<OutputRecord> {
    let assignment = assign(tracker, &snapshot.processes);
    let panes = correlate_claimed(&assignment.claimed, &snapshot.parent, &snapshot.panes);

    let mut records: Vec<OutputRecord> = assignment
        .verdicts
        .iter()
        .map(|verdict| {
            let record = verdict.record;
            let event = record.last_event.as_ref();
            let pane = verdict.pid.and_then(|pid| panes.get(&pid).copied());
            let project_path = if record.start_cwd.is_empty() {
                &record.cwd
            } else {
                &record.start_cwd
            };

            OutputRecord {
                ts: record.last_event_ts().to_string(),
                session_id: record.session_id.clone(),
                state: verdict.state.label(),
                alive: verdict.state != SessionState::Dead,
                match_method: verdict
                    .method
                    .map(|method| method.as_str().to_string())
                    .unwrap_or_default(),
                reason: state_reason(event, &verdict.state),
                cwd: record.cwd.clone(),
                start_cwd: record.start_cwd.clone(),
                project: projects.project_name(project_path),
                version: VERSION.to_string(),
                tmux: pane.map(TmuxColumns::from),
            }
        })
        .collect();

    sort_for_display(&mut records);
    records
}

/// Stable sort by group, then newest first.
pub fn sort_for_display(records: &mut [OutputRecord]) {
    records.sort_by(|left, right| {
        left.group()
            .cmp(&right.group())
            .then_with(|| newest_first(left.timestamp(), right.timestamp()))
    });
}

fn newest_first(left: Option<DateTime<Utc>>, right: Option<DateTime<Utc>>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Enriches the tracker's waiting history, in arrival order.
pub fn waiting_records<R: RepoReader>(
    tracker: &SessionTracker,
    projects: &mut ProjectNameResolver<R>,
) -> Vec<WaitingRecord> {
    tracker
        .waiting_history()
        .iter()
        .map(|event| waiting_record(event, projects))
        .collect()
}

fn waiting_record<R: RepoReader>(
    event: &HookEvent,
    projects: &mut ProjectNameResolver<R>,
) -> WaitingRecord {
    let cwd = event.cwd.clone().unwrap_or_default();
    let raw_field = |key: &str| event.raw.get(key).filter(|value| !value.is_null()).cloned();

    WaitingRecord {
        ts: event.ts.clone().unwrap_or_default(),
        event: event.kind.as_str().to_string(),
        session_id: event.session().unwrap_or_default().to_string(),
        reason: state_reason(Some(event), &SessionState::Idle),
        project: projects.project_name(&cwd),
        cwd,
        tool_name: raw_field("tool_name"),
        notification_type: raw_field("notification_type"),
        message: raw_field("message"),
    }
}

/// Runs resolution passes against injected collaborators.
pub struct ResolutionEngine<R: RepoReader = FsRepoReader> {
    config: ObservatoryConfig,
    process_source: Box<dyn ProcessSource>,
    tmux: Box<dyn TmuxAdapter>,
    projects: ProjectNameResolver<R>,
}

impl ResolutionEngine<FsRepoReader> {
    /// Engine wired to the live process table, real tmux servers, and the
    /// local filesystem.
    pub fn new(config: ObservatoryConfig) -> Self {
        let tmux =
            CommandTmuxAdapter::new(config.resolved_tmux_socket_dir(), config.tmux_timeout());
        Self::with_sources(
            config,
            Box::new(SysinfoProcessSource),
            Box::new(tmux),
            FsRepoReader,
        )
    }
}

impl<R: RepoReader> ResolutionEngine<R> {
    pub fn with_sources(
        config: ObservatoryConfig,
        process_source: Box<dyn ProcessSource>,
        tmux: Box<dyn TmuxAdapter>,
        reader: R,
    ) -> Self {
        Self {
            config,
            process_source,
            tmux,
            projects: ProjectNameResolver::with_reader(reader),
        }
    }

    pub fn config(&self) -> &ObservatoryConfig {
        &self.config
    }

    pub fn projects(&self) -> &ProjectNameResolver<R> {
        &self.projects
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot::capture(
            self.process_source.as_ref(),
            &self.config.process_name,
            self.tmux.as_ref(),
        )
    }

    /// Full pass: fold `lines`, snapshot, assign, enrich, order.
    pub fn run_pass<I, S>(&mut self, lines: I) -> Vec<OutputRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.projects.clear();
        let tracker = SessionTracker::from_lines(lines);
        let snapshot = self.snapshot();
        resolve(&tracker, &snapshot, &mut self.projects)
    }

    /// Waiting-history pass. No process snapshot is taken.
    pub fn run_history_pass<I, S>(&mut self, lines: I) -> Vec<WaitingRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.projects.clear();
        let mut tracker = SessionTracker::with_history();
        tracker.ingest_lines(lines);
        waiting_records(&tracker, &mut self.projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str, ts: &str) -> OutputRecord {
        OutputRecord {
            ts: ts.to_string(),
            session_id: format!("{}-{}", state, ts),
            state: state.to_string(),
            alive: state != "DEAD",
            match_method: String::new(),
            reason: String::new(),
            cwd: String::new(),
            start_cwd: String::new(),
            project: "?".to_string(),
            version: VERSION.to_string(),
            tmux: None,
        }
    }

    #[test]
    fn display_order_is_group_then_newest() {
        let mut records = vec![
            record("DEAD", "2026-02-17T12:00:00Z"),
            record("RUN:Bash", "2026-02-17T10:00:00Z"),
            record("FRESH", "2026-02-17T09:00:00Z"),
            record("RUN:think", "2026-02-17T11:00:00Z"),
            record("IDLE", ""),
            record("FRESH", "2026-02-17T11:30:00Z"),
            record("FRESH", "not a time"),
        ];
        sort_for_display(&mut records);

        let order: Vec<_> = records
            .iter()
            .map(|record| record.session_id.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "FRESH-2026-02-17T11:30:00Z",
                "FRESH-2026-02-17T09:00:00Z",
                "FRESH-not a time",
                "IDLE-",
                "RUN:think-2026-02-17T11:00:00Z",
                "RUN:Bash-2026-02-17T10:00:00Z",
                "DEAD-2026-02-17T12:00:00Z",
            ]
        );
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut rec = record("FRESH", "2026-02-17T09:00:00+00:00");
        rec.match_method = "exact:start".to_string();
        let json = serde_json::to_value(&rec).expect("serialize");

        assert_eq!(json["_ts"], "2026-02-17T09:00:00+00:00");
        assert_eq!(json["match"], "exact:start");
        assert_eq!(json["alive"], true);
        assert_eq!(json["_version"], VERSION);
        assert!(json.get("tmux_target").is_none());

        rec.tmux = Some(TmuxColumns::from(&TmuxPane {
            session_name: "main".to_string(),
            window_index: "1".to_string(),
            pane_index: "0".to_string(),
            pane_cwd: "/p".to_string(),
            server_name: "work".to_string(),
        }));
        let json = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(json["tmux_target"], "main:1.0 [work]");
        assert_eq!(json["tmux_cwd"], "/p");
    }

    #[test]
    fn column_values() {
        let rec = record("DEAD", "2026-02-17T09:00:00Z");
        assert_eq!(rec.column("alive"), "false");
        assert_eq!(rec.column("state"), "DEAD");
        assert_eq!(rec.column("tmux_target"), "");
        assert_eq!(rec.column("bogus"), "");
        assert_eq!(record("RUN:Bash", "").group_name(), "RUN");
        assert_eq!(record("PERMIT", "").group_name(), "PERMIT");
    }

    #[test]
    fn waiting_records_keep_optional_fields_only_when_present() {
        let mut tracker = SessionTracker::with_history();
        tracker.ingest_lines([
            r#"{"_ts":"2026-02-17T09:00:00+00:00","_event":"PermissionRequest","session_id":"s1","cwd":"/nowhere/proj","tool_name":"Bash"}"#,
            r#"{"_event":"Stop","session_id":"s1"}"#,
        ]);
        let mut projects = ProjectNameResolver::new();
        let records = waiting_records(&tracker, &mut projects);

        assert_eq!(records.len(), 2);
        let first = serde_json::to_value(&records[0]).expect("serialize");
        assert_eq!(first["_event"], "PermissionRequest");
        assert_eq!(first["reason"], "Bash");
        assert_eq!(first["tool_name"], "Bash");
        assert_eq!(first["project"], "nowhere/proj");
        assert!(first.get("message").is_none());

        let second = serde_json::to_value(&records[1]).expect("serialize");
        assert_eq!(second["_ts"], "");
        assert_eq!(second["cwd"], "");
        assert_eq!(second["project"], "?");
        assert!(second.get("tool_name").is_none());
    }
}
