//! query-hooks: query the Claude Code hooks observatory logs.
//!
//! Reads the JSONL event logs written by the observatory (or stdin) and either
//! filters raw events or resolves every session to its current state.
//!
//! ## Modes
//!
//! - default: filter raw events by kind, tool, or session prefix
//! - `--waiting`: one row per live-or-dead session with its derived state
//! - `--waiting=all`: every waiting event in history
//! - `--watch`: repeat any of the above like watch(1)

mod logging;
mod query;
mod render;
mod run;
mod sources;

use clap::{CommandFactory, Parser, ValueEnum};
use observatory_core::load_config;
use std::path::PathBuf;

const EXAMPLES: &str = "\
Examples:
  query-hooks PreToolUse                           # indented JSON
  query-hooks PreToolUse --tool Bash --jsonl       # Bash events as JSONL
  query-hooks --waiting                            # all session states
  query-hooks --waiting --without-dead             # live sessions only
  query-hooks --waiting=all --jsonl                # every waiting event
  query-hooks --waiting --columns state,ago,tmux_target
  query-hooks --waiting --csv --columns state,project
  query-hooks --waiting --watch=5                  # refresh every 5s";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaitingMode {
    /// Current state of every session
    Recent,
    /// Every waiting event in history
    All,
}

#[derive(Parser, Debug)]
#[command(name = "query-hooks")]
#[command(about = "Query observatory logs by hook event type")]
#[command(version)]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Hook event types to include (e.g. PreToolUse Stop); all pass when omitted
    #[arg(value_name = "EVENT")]
    pub events: Vec<String>,

    /// Compact JSONL output instead of indented JSON
    #[arg(long)]
    pub jsonl: bool,

    /// Filter by tool_name (e.g. Bash, Read, Edit)
    #[arg(long, value_name = "NAME")]
    pub tool: Option<String>,

    /// Filter by session_id prefix
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Log file to read; repeatable. Default: every log in the log directory
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Show only the last N matching events
    #[arg(short = 'n', long, value_name = "N")]
    pub last: Option<usize>,

    /// Show session states (recent, the default) or every waiting event (all)
    #[arg(long, value_name = "MODE", value_enum, require_equals = true)]
    pub waiting: Option<Option<WaitingMode>>,

    /// Leave DEAD sessions out of --waiting output
    #[arg(long)]
    pub without_dead: bool,

    /// Suppress timing stats on stderr
    #[arg(long)]
    pub no_stats: bool,

    /// Comma-separated columns (validated with --waiting, raw keys otherwise)
    #[arg(long, value_name = "COLS")]
    pub columns: Option<String>,

    /// CSV output
    #[arg(long, requires = "waiting")]
    pub csv: bool,

    /// Describe every --waiting column and exit
    #[arg(long)]
    pub columns_help: bool,

    /// Refresh every SECS seconds (default from config, 2.0), clearing the screen
    #[arg(long, value_name = "SECS", require_equals = true, value_parser = parse_interval)]
    pub watch: Option<Option<f64>>,

    /// Config file (default: ~/.claude/observatory/query-hooks.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug diagnostics on stderr (or the configured log file)
    #[arg(long)]
    pub debug: bool,
}

fn parse_interval(value: &str) -> Result<f64, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("invalid interval: {}", value))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("--watch interval must be positive, got {}", value))
    }
}

fn main() {
    let cli = Cli::parse();

    let (config, config_error) = match load_config(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (Default::default(), Some(err)),
    };
    let _logging_guard = logging::init(cli.debug, config.log_file.as_deref());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "Failed to load config, using defaults");
    }

    if cli.columns_help {
        if let Err(err) = render::write_columns_help(&mut std::io::stdout().lock()) {
            tracing::error!(error = %err, "query-hooks failed");
            std::process::exit(1);
        }
        return;
    }

    let options = match run::RunOptions::from_cli(&cli) {
        Ok(options) => options,
        Err(message) => Cli::command()
            .error(clap::error::ErrorKind::InvalidValue, message)
            .exit(),
    };

    let mut runner = run::Runner::new(options, config);
    let result = match cli.watch {
        None => runner.run(),
        Some(interval) => runner.watch(interval),
    };
    if let Err(err) = result {
        tracing::error!(error = %err, "query-hooks failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn optional_values_need_equals() {
        let cli = Cli::try_parse_from(["query-hooks", "--waiting", "Stop"]).expect("parse");
        assert_eq!(cli.waiting, Some(None));
        assert_eq!(cli.events, vec!["Stop"]);

        let cli = Cli::try_parse_from(["query-hooks", "--waiting=all", "--watch=0.5"]).expect("parse");
        assert_eq!(cli.waiting, Some(Some(WaitingMode::All)));
        assert_eq!(cli.watch, Some(Some(0.5)));

        let cli = Cli::try_parse_from(["query-hooks", "--watch"]).expect("parse");
        assert_eq!(cli.watch, Some(None));
    }

    #[test]
    fn rejects_bad_combinations() {
        assert!(Cli::try_parse_from(["query-hooks", "--csv"]).is_err());
        assert!(Cli::try_parse_from(["query-hooks", "--watch=0"]).is_err());
        assert!(Cli::try_parse_from(["query-hooks", "--watch=-1"]).is_err());
        assert!(Cli::try_parse_from(["query-hooks", "--waiting=sometimes"]).is_err());
    }

    #[test]
    fn repeatable_files() {
        let cli = Cli::try_parse_from(["query-hooks", "-f", "a.log", "--file", "b.log"]).expect("parse");
        assert_eq!(cli.files, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
    }
}
