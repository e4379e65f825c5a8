//! One live process per session.
//!
//! Several sessions launched from the same directory all look alive by cwd
//! alone. Sessions are therefore visited most recent first, and each one
//! that finds a process claims it, removing it from every later session's
//! candidates. This is a greedy heuristic, not an optimal matching.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::liveness::{check_liveness, match_pid, MatchMethod};
use crate::state::{derive_state, SessionState};
use crate::tracker::{SessionRecord, SessionTracker};

/// Outcome for one non-terminated session.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict<'a> {
    pub record: &'a SessionRecord,
    pub state: SessionState,
    pub method: Option<MatchMethod>,
    /// The pid this session claimed, if any.
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment<'a> {
    /// Verdicts in claiming order (most recent session first).
    pub verdicts: Vec<Verdict<'a>>,
    pub claimed: HashSet<u32>,
}

/// Non-terminated records, most recent last event first.
///
/// Records without a parsable timestamp go last. Ties keep first-seen order.
pub fn recency_order(tracker: &SessionTracker) -> Vec<&SessionRecord> {
    let mut ordered: Vec<_> = tracker
        .active_records()
        .map(|record| (record.last_event_time(), record))
        .collect();
    ordered.sort_by(|(left, _), (right, _)| match (left, right) {
        (Some(left), Some(right)) => right.cmp(left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ordered.into_iter().map(|(_, record)| record).collect()
}

/// Runs claiming over `processes` (pid → cwd).
pub fn assign<'a>(
    tracker: &'a SessionTracker,
    processes: &BTreeMap<u32, String>,
) -> Assignment<'a> {
    let mut assignment = Assignment::default();

    for record in recency_order(tracker) {
        let available: BTreeMap<u32, String> = processes
            .iter()
            .filter(|(pid, _)| !assignment.claimed.contains(*pid))
            .map(|(pid, cwd)| (*pid, cwd.clone()))
            .collect();
        let unclaimed_cwds: BTreeSet<String> = available.values().cloned().collect();

        let method = check_liveness(record, &unclaimed_cwds);
        let state = derive_state(record, method);
        let pid = match_pid(record, &available).filter(|_| !state.is_dead());

        if let Some(pid) = pid {
            assignment.claimed.insert(pid);
        }
        tracing::debug!(
            session = %record.session_id,
            state = %state,
            method = method.map(|method| method.as_str()).unwrap_or(""),
            pid = ?pid,
            "Session resolved"
        );

        assignment.verdicts.push(Verdict {
            record,
            state,
            method,
            pid,
        });
    }

    assignment
}
