//! Runtime configuration for resolution passes.
//!
//! Loaded from `~/.claude/observatory/query-hooks.toml`. Every key is
//! optional; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ObservatoryError, Result};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".claude/observatory/query-hooks.toml";
const DEFAULT_LOG_DIR: &str = "/tmp/claude/observatory";
const DEFAULT_PROCESS_NAME: &str = "claude";
const DEFAULT_TMUX_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_WATCH_INTERVAL_SECS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObservatoryConfig {
    /// Directory holding `*.log` and rotated `*.log.N` event logs.
    pub log_dir: PathBuf,
    /// Program name a live process must have to count as a session candidate.
    pub process_name: String,
    /// Directory holding tmux server sockets. Unset means
    /// `$TMUX_TMPDIR/tmux-<uid>` (or `/tmp/tmux-<uid>`).
    pub tmux_socket_dir: Option<PathBuf>,
    pub tmux_timeout_ms: u64,
    pub watch_interval_secs: f64,
    /// When set, diagnostics go to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            tmux_socket_dir: None,
            tmux_timeout_ms: DEFAULT_TMUX_TIMEOUT_MS,
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
            log_file: None,
        }
    }
}

impl ObservatoryConfig {
    pub fn tmux_timeout(&self) -> Duration {
        Duration::from_millis(self.tmux_timeout_ms)
    }

    /// Socket directory for tmux servers owned by the current user.
    pub fn resolved_tmux_socket_dir(&self) -> PathBuf {
        if let Some(dir) = &self.tmux_socket_dir {
            return dir.clone();
        }
        let base = std::env::var_os("TMUX_TMPDIR")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        base.join(format!("tmux-{}", current_uid()))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the config at `path` (or the default location).
///
/// A missing file is not an error and yields [`ObservatoryConfig::default`].
pub fn load_config(path: Option<&Path>) -> Result<ObservatoryConfig> {
    let config_path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return Ok(ObservatoryConfig::default()),
    };

    if !config_path.exists() {
        return Ok(ObservatoryConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| ObservatoryError::Io {
        context: format!("reading config {}", config_path.display()),
        source: err,
    })?;
    toml::from_str::<ObservatoryConfig>(&content).map_err(|err| {
        ObservatoryError::ConfigMalformed {
            path: config_path.clone(),
            details: err.to_string(),
        }
    })
}

fn current_uid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail.
        unsafe { libc::getuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}
