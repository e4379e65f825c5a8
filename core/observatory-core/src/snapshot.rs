//! Point-in-time view of the process table and tmux panes for one pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sysinfo::{ProcessRefreshKind, System, UpdateKind};

use crate::tmux::{build_pane_map, TmuxAdapter, TmuxPane};

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// `None` when the cwd could not be read (permission denied, exited).
    pub cwd: Option<String>,
    pub parent: Option<u32>,
}

pub trait ProcessSource {
    fn processes(&self) -> Vec<ProcessInfo>;
}

/// Reads the live process table through `sysinfo`.
#[derive(Debug, Clone, Default)]
pub struct SysinfoProcessSource;

impl ProcessSource for SysinfoProcessSource {
    fn processes(&self) -> Vec<ProcessInfo> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cwd(UpdateKind::Always));

        sys.processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                cwd: process
                    .cwd()
                    .map(|cwd| cwd.to_string_lossy().to_string())
                    .filter(|cwd| !cwd.is_empty()),
                parent: process.parent().map(|parent| parent.as_u32()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivenessSnapshot {
    /// pid → cwd for processes whose name matches the program filter.
    pub processes: BTreeMap<u32, String>,
    /// pid → parent pid for every visible process.
    pub parent: HashMap<u32, u32>,
    /// pane shell pid → pane.
    pub panes: HashMap<u32, TmuxPane>,
}

impl LivenessSnapshot {
    /// Captures processes and panes once. Failures shrink the snapshot; they
    /// never abort it.
    pub fn capture(
        process_source: &dyn ProcessSource,
        process_name: &str,
        tmux: &dyn TmuxAdapter,
    ) -> Self {
        let mut snapshot = Self::from_processes(process_source.processes(), process_name);
        snapshot.panes = build_pane_map(tmux);
        tracing::debug!(
            candidates = snapshot.processes.len(),
            visible = snapshot.parent.len(),
            panes = snapshot.panes.len(),
            "Liveness snapshot captured"
        );
        snapshot
    }

    pub fn from_processes(processes: Vec<ProcessInfo>, process_name: &str) -> Self {
        let mut snapshot = Self::default();
        for process in processes {
            if let Some(parent) = process.parent {
                snapshot.parent.insert(process.pid, parent);
            }
            if process.name != process_name {
                continue;
            }
            match process.cwd {
                Some(cwd) => {
                    snapshot.processes.insert(process.pid, cwd);
                }
                None => {
                    tracing::debug!(pid = process.pid, "Skipping candidate without readable cwd");
                }
            }
        }
        snapshot
    }

    pub fn live_cwds(&self) -> BTreeSet<String> {
        self.processes.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, name: &str, cwd: Option<&str>, parent: Option<u32>) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            cwd: cwd.map(str::to_string),
            parent,
        }
    }

    #[test]
    fn filters_candidates_by_name_but_keeps_all_parents() {
        let snapshot = LivenessSnapshot::from_processes(
            vec![
                info(1, "init", Some("/"), None),
                info(100, "zsh", Some("/home/u"), Some(1)),
                info(200, "claude", Some("/home/u/proj"), Some(100)),
                info(300, "claude-helper", Some("/home/u/other"), Some(100)),
            ],
            "claude",
        );

        assert_eq!(
            snapshot.processes,
            BTreeMap::from([(200, "/home/u/proj".to_string())])
        );
        assert_eq!(snapshot.parent.get(&200), Some(&100));
        assert_eq!(snapshot.parent.get(&100), Some(&1));
        assert_eq!(snapshot.parent.get(&1), None);
    }

    #[test]
    fn unreadable_cwd_excludes_the_candidate() {
        let snapshot = LivenessSnapshot::from_processes(
            vec![
                info(10, "claude", None, Some(1)),
                info(11, "claude", Some("/p"), Some(1)),
            ],
            "claude",
        );
        assert_eq!(snapshot.processes.len(), 1);
        assert!(snapshot.processes.contains_key(&11));
        assert_eq!(snapshot.parent.get(&10), Some(&1));
    }

    #[test]
    fn live_cwds_deduplicates() {
        let snapshot = LivenessSnapshot::from_processes(
            vec![
                info(10, "claude", Some("/p"), None),
                info(11, "claude", Some("/p"), None),
            ],
            "claude",
        );
        assert_eq!(snapshot.live_cwds(), BTreeSet::from(["/p".to_string()]));
    }

    #[test]
    fn sysinfo_source_sees_the_current_process() {
        let own_pid = std::process::id();
        let processes = SysinfoProcessSource.processes();
        assert!(processes.iter().any(|process| process.pid == own_pid));
    }
}
