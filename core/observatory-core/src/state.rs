//! Display state for a session, derived from its last tracked event and
//! whether a live process was matched.
//!
//! ```text
//! FRESH    - turn finished, waiting for input (Stop)
//! PERMIT   - needs the user to approve a tool
//! QUESTION - asking the user something (elicitation dialog)
//! IDLE     - waiting for input (idle prompt)
//! RUN:*    - working; the suffix says on what (tool name, think, agent, ...)
//! DEAD     - no live process matched, whatever the last event said
//! ```

use observatory_protocol::{EventKind, HookEvent};

use crate::liveness::MatchMethod;
use crate::tracker::SessionRecord;

const PERMISSION_PROMPT_PREFIX: &str = "Claude needs your permission to use ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    Terminated,
    Fresh,
    Permit,
    Question,
    Idle,
    /// Running; holds the suffix after `RUN:`.
    Run(String),
    Dead,
}

impl SessionState {
    fn run(detail: &str) -> Self {
        SessionState::Run(detail.to_string())
    }

    pub fn label(&self) -> String {
        match self {
            SessionState::Terminated => "TERMINATED".to_string(),
            SessionState::Fresh => "FRESH".to_string(),
            SessionState::Permit => "PERMIT".to_string(),
            SessionState::Question => "QUESTION".to_string(),
            SessionState::Idle => "IDLE".to_string(),
            SessionState::Run(detail) => format!("RUN:{}", detail),
            SessionState::Dead => "DEAD".to_string(),
        }
    }

    /// Display group: FRESH < PERMIT < QUESTION < IDLE < RUN:* < DEAD.
    pub fn group(&self) -> u8 {
        match self {
            SessionState::Fresh => 0,
            SessionState::Permit => 1,
            SessionState::Question => 2,
            SessionState::Idle => 3,
            SessionState::Run(_) | SessionState::Terminated => 4,
            SessionState::Dead => 5,
        }
    }

    /// Group name used in summaries (`RUN` for every running state).
    pub fn group_name(&self) -> &'static str {
        match self {
            SessionState::Terminated => "TERMINATED",
            SessionState::Fresh => "FRESH",
            SessionState::Permit => "PERMIT",
            SessionState::Question => "QUESTION",
            SessionState::Idle => "IDLE",
            SessionState::Run(_) => "RUN",
            SessionState::Dead => "DEAD",
        }
    }

    pub fn is_dead(&self) -> bool {
        *self == SessionState::Dead
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Group index for an already-rendered state label. Unknown labels sort with
/// the running states.
pub fn label_group(label: &str) -> u8 {
    match label {
        "FRESH" => 0,
        "PERMIT" => 1,
        "QUESTION" => 2,
        "IDLE" => 3,
        "DEAD" => 5,
        _ => 4,
    }
}

pub fn derive_state(record: &SessionRecord, match_method: Option<MatchMethod>) -> SessionState {
    if record.terminated {
        return SessionState::Terminated;
    }

    let state = match record.last_event.as_ref() {
        None => SessionState::run("?"),
        Some(event) => state_for_event(event),
    };

    // No live process overrides everything the event implies.
    if match_method.is_none() {
        return SessionState::Dead;
    }
    state
}

fn state_for_event(event: &HookEvent) -> SessionState {
    match event.kind {
        EventKind::Stop => SessionState::Fresh,
        EventKind::PermissionRequest => SessionState::Permit,
        EventKind::Notification => match event.notification_type.as_deref() {
            Some("permission_prompt") => SessionState::Permit,
            Some("elicitation_dialog") => SessionState::Question,
            _ => SessionState::Idle,
        },
        EventKind::PreToolUse => SessionState::run(event.tool_name.as_deref().unwrap_or("?")),
        EventKind::UserPromptSubmit => SessionState::run("think"),
        EventKind::SubagentStart => SessionState::run("agent"),
        EventKind::PostToolUse | EventKind::PostToolUseFailure | EventKind::SubagentStop => {
            SessionState::run("done")
        }
        EventKind::SessionStart => SessionState::run("start"),
        EventKind::SessionEnd | EventKind::Other(_) => SessionState::run("?"),
    }
}

/// Short detail beyond what the state already shows. Empty when the state is
/// self-explanatory (FRESH, IDLE, RUN:<tool>, ...).
pub fn state_reason(event: Option<&HookEvent>, _state: &SessionState) -> String {
    let Some(event) = event else {
        return String::new();
    };

    let message = event.message.as_deref().unwrap_or("");
    match event.kind {
        EventKind::PermissionRequest => event.tool_name.as_deref().unwrap_or("?").to_string(),
        EventKind::Notification => match event.notification_type.as_deref().unwrap_or("") {
            "idle_prompt" => String::new(),
            "permission_prompt" => message
                .strip_prefix(PERMISSION_PROMPT_PREFIX)
                .unwrap_or(message)
                .to_string(),
            "elicitation_dialog" => message.to_string(),
            other if message.is_empty() => other.to_string(),
            _ => message.to_string(),
        },
        EventKind::PostToolUse | EventKind::PostToolUseFailure => {
            format!("after {}", event.tool_name.as_deref().unwrap_or("?"))
        }
        EventKind::SubagentStop => "after agent".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observatory_protocol::parse_line;

    fn event(line: &str) -> HookEvent {
        parse_line(line).expect("valid line").expect("event line")
    }

    fn record_with(line: Option<&str>) -> SessionRecord {
        SessionRecord {
            session_id: "s1".to_string(),
            last_event: line.map(event),
            terminated: false,
            start_cwd: "/p".to_string(),
            cwd: "/p".to_string(),
        }
    }

    fn alive(line: &str) -> SessionState {
        derive_state(&record_with(Some(line)), Some(MatchMethod::ExactStart))
    }

    #[test]
    fn event_table() {
        assert_eq!(alive(r#"{"_event":"Stop"}"#), SessionState::Fresh);
        assert_eq!(alive(r#"{"_event":"PermissionRequest"}"#), SessionState::Permit);
        assert_eq!(
            alive(r#"{"_event":"Notification","notification_type":"idle_prompt"}"#),
            SessionState::Idle
        );
        assert_eq!(
            alive(r#"{"_event":"Notification","notification_type":"permission_prompt"}"#),
            SessionState::Permit
        );
        assert_eq!(
            alive(r#"{"_event":"Notification","notification_type":"elicitation_dialog"}"#),
            SessionState::Question
        );
        assert_eq!(
            alive(r#"{"_event":"Notification","notification_type":"something_new"}"#),
            SessionState::Idle
        );
        assert_eq!(
            alive(r#"{"_event":"PreToolUse","tool_name":"Bash"}"#).label(),
            "RUN:Bash"
        );
        assert_eq!(alive(r#"{"_event":"PreToolUse"}"#).label(), "RUN:?");
        assert_eq!(alive(r#"{"_event":"UserPromptSubmit"}"#).label(), "RUN:think");
        assert_eq!(alive(r#"{"_event":"SubagentStart"}"#).label(), "RUN:agent");
        assert_eq!(alive(r#"{"_event":"PostToolUse"}"#).label(), "RUN:done");
        assert_eq!(alive(r#"{"_event":"PostToolUseFailure"}"#).label(), "RUN:done");
        assert_eq!(alive(r#"{"_event":"SubagentStop"}"#).label(), "RUN:done");
        assert_eq!(alive(r#"{"_event":"SessionStart"}"#).label(), "RUN:start");
    }

    #[test]
    fn no_tracked_event_depends_on_match() {
        let record = record_with(None);
        assert_eq!(
            derive_state(&record, Some(MatchMethod::ExactLast)).label(),
            "RUN:?"
        );
        assert_eq!(derive_state(&record, None), SessionState::Dead);
    }

    #[test]
    fn missing_match_forces_dead() {
        for line in [
            r#"{"_event":"Stop"}"#,
            r#"{"_event":"PermissionRequest"}"#,
            r#"{"_event":"Notification","notification_type":"idle_prompt"}"#,
            r#"{"_event":"PreToolUse","tool_name":"Bash"}"#,
            r#"{"_event":"SessionStart"}"#,
        ] {
            assert_eq!(derive_state(&record_with(Some(line)), None), SessionState::Dead);
        }
    }

    #[test]
    fn terminated_wins_over_everything() {
        let mut record = record_with(Some(r#"{"_event":"SessionEnd"}"#));
        record.terminated = true;
        assert_eq!(derive_state(&record, None), SessionState::Terminated);
        assert_eq!(
            derive_state(&record, Some(MatchMethod::ExactStart)),
            SessionState::Terminated
        );
    }

    #[test]
    fn groups_order_states() {
        let ordered = [
            SessionState::Fresh,
            SessionState::Permit,
            SessionState::Question,
            SessionState::Idle,
            SessionState::run("Bash"),
            SessionState::Dead,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].group() < pair[1].group());
        }
        assert_eq!(SessionState::run("think").group(), SessionState::run("?").group());
        assert_eq!(label_group("RUN:Read"), 4);
        assert_eq!(label_group("SOMETHING"), 4);
        assert_eq!(label_group("DEAD"), 5);
    }

    #[test]
    fn reasons() {
        let reason = |line: &str| {
            let event = event(line);
            state_reason(Some(&event), &SessionState::Idle)
        };

        assert_eq!(reason(r#"{"_event":"Stop"}"#), "");
        assert_eq!(reason(r#"{"_event":"PermissionRequest","tool_name":"Edit"}"#), "Edit");
        assert_eq!(reason(r#"{"_event":"PermissionRequest"}"#), "?");
        assert_eq!(
            reason(
                r#"{"_event":"Notification","notification_type":"permission_prompt","message":"Claude needs your permission to use Bash"}"#
            ),
            "Bash"
        );
        assert_eq!(
            reason(
                r#"{"_event":"Notification","notification_type":"permission_prompt","message":"Allow it?"}"#
            ),
            "Allow it?"
        );
        assert_eq!(
            reason(
                r#"{"_event":"Notification","notification_type":"elicitation_dialog","message":"Which branch?"}"#
            ),
            "Which branch?"
        );
        assert_eq!(
            reason(
                r#"{"_event":"Notification","notification_type":"idle_prompt","message":"Waiting"}"#
            ),
            ""
        );
        assert_eq!(
            reason(r#"{"_event":"Notification","notification_type":"auth_success"}"#),
            "auth_success"
        );
        assert_eq!(
            reason(r#"{"_event":"PostToolUseFailure","tool_name":"Write"}"#),
            "after Write"
        );
        assert_eq!(reason(r#"{"_event":"SubagentStop"}"#), "after agent");
        assert_eq!(reason(r#"{"_event":"PreToolUse","tool_name":"Bash"}"#), "");
        assert_eq!(state_reason(None, &SessionState::Dead), "");
    }
}
