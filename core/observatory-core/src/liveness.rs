//! Ties a session record to a live process by working directory.
//!
//! Four layers, first hit wins:
//!
//! 1. `exact:start`    - launch cwd equals a process cwd
//! 2. `exact:last`     - latest hook cwd equals a process cwd
//! 3. `ancestor:start` - launch cwd is inside a process cwd
//! 4. `ancestor:last`  - latest hook cwd (when it differs) is inside a process cwd
//!
//! The same layering picks the concrete pid during assignment, so the method
//! reported for a session always describes the pid it claimed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::path_utils::{is_descendant, same_path};
use crate::tracker::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MatchMethod {
    #[serde(rename = "exact:start")]
    ExactStart,
    #[serde(rename = "exact:last")]
    ExactLast,
    #[serde(rename = "ancestor:start")]
    AncestorStart,
    #[serde(rename = "ancestor:last")]
    AncestorLast,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::ExactStart => "exact:start",
            MatchMethod::ExactLast => "exact:last",
            MatchMethod::AncestorStart => "ancestor:start",
            MatchMethod::AncestorLast => "ancestor:last",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether `record` is alive against a set of unclaimed cwds.
pub fn check_liveness(record: &SessionRecord, live_cwds: &BTreeSet<String>) -> Option<MatchMethod> {
    layered_match(record, live_cwds.iter().map(|cwd| ((), cwd.as_str()))).map(|(method, ())| method)
}

/// Finds the pid whose cwd matches `record`, using the same layer priority.
///
/// Within a layer the lowest pid wins.
pub fn match_pid(record: &SessionRecord, candidates: &BTreeMap<u32, String>) -> Option<u32> {
    match_pid_with_method(record, candidates).map(|(_, pid)| pid)
}

pub(crate) fn match_pid_with_method(
    record: &SessionRecord,
    candidates: &BTreeMap<u32, String>,
) -> Option<(MatchMethod, u32)> {
    layered_match(
        record,
        candidates.iter().map(|(pid, cwd)| (*pid, cwd.as_str())),
    )
}

fn layered_match<'a, K, I>(record: &SessionRecord, candidates: I) -> Option<(MatchMethod, K)>
where
    I: Iterator<Item = (K, &'a str)> + Clone,
{
    let start_cwd = record.start_cwd.as_str();
    let last_cwd = record.cwd.as_str();

    if !start_cwd.is_empty() {
        if let Some(key) = find(candidates.clone(), |cwd| same_path(start_cwd, cwd)) {
            return Some((MatchMethod::ExactStart, key));
        }
    }
    if !last_cwd.is_empty() {
        if let Some(key) = find(candidates.clone(), |cwd| same_path(last_cwd, cwd)) {
            return Some((MatchMethod::ExactLast, key));
        }
    }
    if !start_cwd.is_empty() {
        if let Some(key) = find(candidates.clone(), |cwd| is_descendant(start_cwd, cwd)) {
            return Some((MatchMethod::AncestorStart, key));
        }
    }
    if !last_cwd.is_empty() && last_cwd != start_cwd {
        if let Some(key) = find(candidates, |cwd| is_descendant(last_cwd, cwd)) {
            return Some((MatchMethod::AncestorLast, key));
        }
    }
    None
}

fn find<'a, K, I>(mut candidates: I, matches: impl Fn(&str) -> bool) -> Option<K>
where
    I: Iterator<Item = (K, &'a str)>,
{
    candidates.find(|(_, cwd)| matches(cwd)).map(|(key, _)| key)
}
