//! tmux pane discovery and pid → pane correlation.
//!
//! Every tmux server socket owned by the user is queried, not just the
//! default one. A claimed process is usually a few generations below the
//! pane's shell, so correlation walks the parent chain from the claimed pid.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{ObservatoryError, Result};

/// Upper bound on parent hops from a claimed pid to its pane shell.
pub const MAX_ANCESTOR_HOPS: usize = 15;

const DEFAULT_SERVER: &str = "default";
const DEFAULT_PROGRAM: &str = "tmux";
const LIST_PANES_FORMAT: &str =
    "#{pane_pid}\t#{pane_current_path}\t#{session_name}\t#{window_index}\t#{pane_index}";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TmuxPane {
    pub session_name: String,
    pub window_index: String,
    pub pane_index: String,
    pub pane_cwd: String,
    /// Socket name of the owning server; empty or `default` for the default.
    pub server_name: String,
}

impl TmuxPane {
    /// Target spec such as `main:2.0`, or `main:2.0 [work]` on a
    /// non-default server.
    pub fn target(&self) -> String {
        let base = format!(
            "{}:{}.{}",
            self.session_name, self.window_index, self.pane_index
        );
        if self.server_name.is_empty() || self.server_name == DEFAULT_SERVER {
            base
        } else {
            format!("{} [{}]", base, self.server_name)
        }
    }
}

pub trait TmuxAdapter {
    /// Server socket names, in the order they should win pid conflicts.
    fn discover_servers(&self) -> Vec<String>;

    /// Raw `list-panes -a` output for one server.
    fn list_panes(&self, server: &str) -> Result<String>;
}

/// Talks to real tmux servers by spawning the `tmux` binary.
#[derive(Debug, Clone)]
pub struct CommandTmuxAdapter {
    program: PathBuf,
    socket_dir: PathBuf,
    timeout: Duration,
}

impl CommandTmuxAdapter {
    pub fn new(socket_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            socket_dir,
            timeout,
        }
    }

    /// Runs `program` instead of the `tmux` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl TmuxAdapter for CommandTmuxAdapter {
    fn discover_servers(&self) -> Vec<String> {
        let entries = match fs_err::read_dir(&self.socket_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(error = %err, "No tmux socket directory");
                return Vec::new();
            }
        };

        let mut servers: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .map(|file_type| file_type.is_socket())
                    .unwrap_or(false)
            })
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        servers.sort_by(|left, right| {
            (left != DEFAULT_SERVER, left).cmp(&(right != DEFAULT_SERVER, right))
        });
        servers
    }

    fn list_panes(&self, server: &str) -> Result<String> {
        run_tmux(
            &self.program,
            &["-L", server, "list-panes", "-a", "-F", LIST_PANES_FORMAT],
            self.timeout,
        )
    }
}

fn run_tmux(program: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    let command = format!("{} {}", program.display(), args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| ObservatoryError::CommandFailed {
            command: command.clone(),
            details: err.to_string(),
        })?;

    // Drained concurrently: a child blocked on a full pipe never exits.
    let reader = child.stdout.take().map(spawn_reader);

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return Err(ObservatoryError::CommandFailed {
                        command,
                        details: format!("exited with {}", status),
                    });
                }
                return match reader {
                    Some(reader) => collect_output(reader, &command),
                    None => Ok(String::new()),
                };
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ObservatoryError::CommandTimedOut {
                        command,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                return Err(ObservatoryError::Io {
                    context: format!("waiting for {}", command),
                    source: err,
                })
            }
        }
    }
}

type OutputReader = JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader<R: Read + Send + 'static>(mut stdout: R) -> OutputReader {
    std::thread::spawn(move || {
        let mut output = Vec::new();
        stdout.read_to_end(&mut output).map(|_| output)
    })
}

fn collect_output(reader: OutputReader, command: &str) -> Result<String> {
    let output = reader
        .join()
        .map_err(|_| ObservatoryError::CommandFailed {
            command: command.to_string(),
            details: "output reader panicked".to_string(),
        })?
        .map_err(|err| ObservatoryError::Io {
            context: format!("reading output of {}", command),
            source: err,
        })?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Parses tab-separated `list-panes` output for `server`.
///
/// Lines with fewer than five fields or a non-numeric pid are skipped.
pub fn parse_list_panes(output: &str, server: &str) -> Vec<(u32, TmuxPane)> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(5, '\t');
            let pid = parts.next()?.trim().parse::<u32>().ok()?;
            let pane_cwd = parts.next()?;
            let session_name = parts.next()?;
            let window_index = parts.next()?;
            let pane_index = parts.next()?.trim();
            Some((
                pid,
                TmuxPane {
                    session_name: session_name.to_string(),
                    window_index: window_index.to_string(),
                    pane_index: pane_index.to_string(),
                    pane_cwd: pane_cwd.to_string(),
                    server_name: server.to_string(),
                },
            ))
        })
        .collect()
}

/// Builds pane-shell pid → pane across every discoverable server.
///
/// The first server enumerated wins when a pid shows up twice. With no
/// discoverable sockets the default server is still tried.
pub fn build_pane_map(adapter: &dyn TmuxAdapter) -> HashMap<u32, TmuxPane> {
    let mut servers = adapter.discover_servers();
    if servers.is_empty() {
        servers.push(DEFAULT_SERVER.to_string());
    }

    let mut pane_map = HashMap::new();
    for server in &servers {
        let output = match adapter.list_panes(server) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(server = %server, error = %err, "tmux server unavailable");
                continue;
            }
        };
        for (pid, pane) in parse_list_panes(&output, server) {
            pane_map.entry(pid).or_insert(pane);
        }
    }
    pane_map
}

/// Walks up from `pid` until a pane shell is found.
///
/// Stops at the first hit, a missing parent, a parent pid ≤ 1, or after
/// [`MAX_ANCESTOR_HOPS`] steps.
pub fn pane_for_pid<'a>(
    pid: u32,
    parent: &HashMap<u32, u32>,
    panes: &'a HashMap<u32, TmuxPane>,
) -> Option<&'a TmuxPane> {
    if panes.is_empty() {
        return None;
    }
    let mut current = pid;
    for _ in 0..MAX_ANCESTOR_HOPS {
        if let Some(pane) = panes.get(&current) {
            return Some(pane);
        }
        match parent.get(&current) {
            Some(&ppid) if ppid > 1 => current = ppid,
            _ => break,
        }
    }
    None
}

/// Pane for each claimed pid that has one.
pub fn correlate_claimed<'a>(
    claimed: &HashSet<u32>,
    parent: &HashMap<u32, u32>,
    panes: &'a HashMap<u32, TmuxPane>,
) -> HashMap<u32, &'a TmuxPane> {
    claimed
        .iter()
        .filter_map(|pid| pane_for_pid(*pid, parent, panes).map(|pane| (*pid, pane)))
        .collect()
}
