//! One query pass, and the `--watch` loop around it.

use std::io::Write;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use observatory_core::{ObservatoryConfig, ObservatoryError, ResolutionEngine, Result};

use crate::query::{run_filter, EventFilter, FilterOptions};
use crate::render::{
    default_columns, parse_columns, write_csv, write_json, write_summary, write_table,
};
use crate::sources::{read_lines, resolve_source};
use crate::{Cli, WaitingMode};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const FALLBACK_WATCH_INTERVAL_SECS: f64 = 2.0;

#[derive(Debug, Clone)]
pub enum Mode {
    Filter(FilterOptions),
    Sessions {
        columns: Vec<String>,
        without_dead: bool,
        csv: bool,
    },
    History,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    pub files: Vec<std::path::PathBuf>,
    pub jsonl: bool,
    pub no_stats: bool,
    /// The command line as typed, for the watch header.
    pub argv: String,
}

impl RunOptions {
    /// Validates the flags that depend on each other. Errors are user-facing.
    pub fn from_cli(cli: &Cli) -> std::result::Result<Self, String> {
        let waiting = cli.waiting.map(|mode| mode.unwrap_or(WaitingMode::Recent));
        let columns = cli
            .columns
            .as_deref()
            .map(|spec| parse_columns(spec, waiting.is_some()))
            .transpose()?
            .filter(|columns| !columns.is_empty());

        let mode = match waiting {
            None => Mode::Filter(FilterOptions {
                filter: EventFilter {
                    events: cli.events.clone(),
                    tool: cli.tool.clone(),
                    session: cli.session.clone(),
                },
                columns,
                last: cli.last,
                jsonl: cli.jsonl,
            }),
            Some(WaitingMode::Recent) => Mode::Sessions {
                columns: columns.unwrap_or_else(default_columns),
                without_dead: cli.without_dead,
                csv: cli.csv,
            },
            Some(WaitingMode::All) => Mode::History,
        };

        Ok(Self {
            mode,
            files: cli.files.clone(),
            jsonl: cli.jsonl,
            no_stats: cli.no_stats,
            argv: std::env::args().skip(1).collect::<Vec<_>>().join(" "),
        })
    }
}

pub struct Runner {
    options: RunOptions,
    engine: ResolutionEngine,
}

impl Runner {
    pub fn new(options: RunOptions, config: ObservatoryConfig) -> Self {
        Self {
            options,
            engine: ResolutionEngine::new(config),
        }
    }

    fn config(&self) -> &ObservatoryConfig {
        self.engine.config()
    }

    /// Single pass straight to stdout and stderr.
    pub fn run(&mut self) -> Result<()> {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        self.run_once(&mut stdout.lock(), &mut stderr.lock(), Instant::now())
    }

    /// Repeats the pass until the process is interrupted. Each frame is
    /// rendered off-screen first, then written in one burst.
    pub fn watch(&mut self, interval: Option<f64>) -> Result<()> {
        let interval = interval.unwrap_or_else(|| self.configured_interval());
        let pause = Duration::from_secs_f64(interval);

        loop {
            let started = Instant::now();
            let mut out = Vec::new();
            let mut err = Vec::new();
            if let Err(pass_err) = self.run_once(&mut out, &mut err, started) {
                tracing::warn!(error = %pass_err, "Watch pass failed");
                let _ = writeln!(err, "Error: {}", pass_err);
            }

            let header = format!(
                "Every {:?}s: query-hooks {}    {}\n\n",
                interval,
                self.options.argv,
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            let mut stderr = std::io::stderr().lock();
            write!(stderr, "{}{}", CLEAR_SCREEN, header).map_err(output_error)?;
            stderr.write_all(&err).map_err(output_error)?;
            stderr.flush().map_err(output_error)?;
            drop(stderr);

            if !out.is_empty() {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&out).map_err(output_error)?;
                stdout.flush().map_err(output_error)?;
            }
            std::thread::sleep(pause);
        }
    }

    fn configured_interval(&self) -> f64 {
        let configured = self.config().watch_interval_secs;
        if configured.is_finite() && configured > 0.0 {
            configured
        } else {
            tracing::warn!(
                watch_interval_secs = configured,
                "Configured watch interval must be positive, using default"
            );
            FALLBACK_WATCH_INTERVAL_SECS
        }
    }

    pub fn run_once(
        &mut self,
        out: &mut dyn Write,
        err: &mut dyn Write,
        started: Instant,
    ) -> Result<()> {
        let source = resolve_source(&self.options.files, &self.config().log_dir)?;
        let lines = read_lines(&source)?;
        let source_names = source.display_names();
        let no_stats = self.options.no_stats;
        let elapsed = || (!no_stats).then(|| started.elapsed());

        match &self.options.mode {
            Mode::Filter(filter) => {
                run_filter(&lines, filter, out).map_err(output_error)?;
                if let Some(elapsed) = elapsed() {
                    let mut parts = Vec::new();
                    if !source_names.is_empty() {
                        parts.push(format!("Read {}", source_names));
                    }
                    parts.push(format!("in {:.3}s", elapsed.as_secs_f64()));
                    writeln!(err, "{}", parts.join(" | ")).map_err(output_error)?;
                }
            }
            Mode::Sessions {
                columns,
                without_dead,
                csv,
            } => {
                let mut records = self.engine.run_pass(&lines);
                if *without_dead {
                    records.retain(|record| record.alive);
                }
                if records.is_empty() {
                    writeln!(err, "No active sessions found.").map_err(output_error)?;
                    return Ok(());
                }

                let now = Utc::now();
                if self.options.jsonl {
                    write_json(out, &records, true).map_err(output_error)?;
                } else if *csv {
                    write_csv(out, &records, columns, now).map_err(output_error)?;
                } else {
                    write_summary(err, &records, &source_names, elapsed()).map_err(output_error)?;
                    write_table(out, &records, columns, now).map_err(output_error)?;
                }
            }
            Mode::History => {
                let history = self.engine.run_history_pass(&lines);
                if history.is_empty() {
                    writeln!(err, "No waiting events found.").map_err(output_error)?;
                    return Ok(());
                }
                write_json(out, &history, self.options.jsonl).map_err(output_error)?;
            }
        }
        Ok(())
    }
}

fn output_error(err: std::io::Error) -> ObservatoryError {
    ObservatoryError::Io {
        context: "writing output".to_string(),
        source: err,
    }
}
