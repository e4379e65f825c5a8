//! # observatory-core
//!
//! Session-state resolution for the Claude Code hooks observatory: folds the
//! hook event log into per-session records, ties each session to at most one
//! live process, and enriches the result with tmux panes and project names.
//!
//! ## Design Principles
//!
//! - **Synchronous**: one pass reads its input to completion, snapshots the
//!   process table once, and returns. No async runtime.
//! - **Graceful degradation**: unreadable processes, missing tmux, and broken
//!   repository metadata shrink the answer instead of failing the pass.
//! - **Injected collaborators**: processes, tmux, and repository metadata sit
//!   behind traits so passes are testable without the real system.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use observatory_core::{load_config, ResolutionEngine};
//!
//! let mut engine = ResolutionEngine::new(load_config(None)?);
//! for record in engine.run_pass(lines) {
//!     println!("{} {}", record.state, record.session_id);
//! }
//! ```

pub mod assignment;
pub mod config;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod path_utils;
pub mod project;
pub mod snapshot;
pub mod state;
pub mod tmux;
pub mod tracker;

pub use assignment::{assign, recency_order, Assignment, Verdict};
pub use config::{default_config_path, load_config, ObservatoryConfig};
pub use engine::{
    resolve, sort_for_display, waiting_records, OutputRecord, ResolutionEngine, TmuxColumns,
    WaitingRecord, VERSION,
};
pub use error::{ObservatoryError, Result};
pub use liveness::{check_liveness, match_pid, MatchMethod};
pub use project::{parse_org_repo, FsRepoReader, ProjectNameResolver, RepoReader, MAX_REPO_HOPS};
pub use snapshot::{LivenessSnapshot, ProcessInfo, ProcessSource, SysinfoProcessSource};
pub use state::{derive_state, state_reason, SessionState};
pub use tmux::{
    build_pane_map, correlate_claimed, pane_for_pid, CommandTmuxAdapter, TmuxAdapter, TmuxPane,
    MAX_ANCESTOR_HOPS,
};
pub use tracker::{IngestStats, SessionRecord, SessionTracker};
