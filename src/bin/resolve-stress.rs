//! Resolve-stress CLI (feature-gated).
//!
//! Runs the harness against the host: by-name resolution goes through a
//! helper program (default `modprobe -q`), filesystem-type lookups read
//! `/proc/filesystems`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{ArgAction, Parser};
use resolve_stress::config::env::{apply_env_overrides, mode_from_env};
use resolve_stress::{
    Coordinator, Harness, HarnessConfig, HarnessError, Mode, RunSummary, SystemResolver,
    TeardownReport, WakerStrategy,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Semantic exit codes.
struct ExitCode;

impl ExitCode {
    /// Every worker ran and reported success.
    const SUCCESS: i32 = 0;
    /// Bad arguments or configuration.
    const USER_ERROR: i32 = 1;
    /// The waker could not start, or the completion wait expired.
    const RUNTIME_ERROR: i32 = 2;
    /// A worker failed to start; results are unavailable.
    const PARTIAL_SUCCESS: i32 = 5;
    /// At least one worker reported a failure status or panicked.
    const TEST_FAILURE: i32 = 10;
}

#[derive(Parser, Debug)]
#[command(
    name = "resolve-stress",
    version,
    about = "Concurrent resolution stress harness"
)]
struct Cli {
    /// Resolve this resource by name from every worker
    #[arg(short = 'n', long = "resolve-name", value_name = "NAME")]
    resolve_name: Option<String>,

    /// Alternate by-name resolution and lookups of this filesystem type
    #[arg(short = 't', long = "fs-type", value_name = "NAME")]
    fs_type: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Busy-poll waker iteration bound
    #[arg(long = "iteration-bound", conflicts_with = "notified")]
    iteration_bound: Option<u64>,

    /// Use the condition-variable waker instead of busy-polling
    #[arg(long = "notified", action = ArgAction::SetTrue)]
    notified: bool,

    /// Give up waiting for completion after this many milliseconds
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Prefix for spawned thread names
    #[arg(long = "thread-prefix")]
    thread_prefix: Option<String>,

    /// Helper program used for by-name resolution
    #[arg(long = "helper", value_name = "PROGRAM")]
    helper: Option<PathBuf>,

    /// Argument passed to the helper before the name (can be repeated)
    #[arg(long = "helper-arg", value_name = "ARG", allow_hyphen_values = true)]
    helper_args: Vec<OsString>,

    /// Filesystem table consulted by type lookups
    #[arg(long = "filesystems", value_name = "PATH")]
    filesystems: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbosity: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

impl Cli {
    fn default_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn config(&self) -> Result<HarnessConfig, HarnessError> {
        let mode = if self.resolve_name.is_some() || self.fs_type.is_some() {
            Mode::from_selectors(self.resolve_name.clone(), self.fs_type.clone())?
        } else {
            mode_from_env()?
        };

        let mut config = HarnessConfig::new(mode);
        apply_env_overrides(&mut config)?;

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.notified {
            config.waker = WakerStrategy::Notified;
        }
        if let Some(iteration_bound) = self.iteration_bound {
            config.waker = WakerStrategy::BusyPoll { iteration_bound };
        }
        if let Some(millis) = self.timeout_ms {
            config.completion_timeout = Some(Duration::from_millis(millis));
        }
        if let Some(prefix) = &self.thread_prefix {
            config.thread_name_prefix.clone_from(prefix);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolver(&self) -> SystemResolver {
        let mut resolver = SystemResolver::new();
        if let Some(helper) = &self.helper {
            resolver = resolver.with_program(helper.clone(), self.helper_args.clone());
        }
        if let Some(path) = &self.filesystems {
            resolver = resolver.with_filesystems_file(path.clone());
        }
        resolver
    }
}

#[derive(Serialize)]
struct Output<'a> {
    summary: &'a RunSummary,
    teardown: &'a TeardownReport,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let config = match cli.config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::USER_ERROR;
        }
    };

    let built = Harness::builder(config, cli.resolver())
        .coordinator(Coordinator::current())
        .build();
    let mut harness = match built {
        Ok(harness) => harness,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::USER_ERROR;
        }
    };

    let started = harness.start();
    let teardown = harness.stop();

    let summary = match started {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            eprintln!("error: {err}");
            return ExitCode::RUNTIME_ERROR;
        }
    };

    if cli.json {
        let output = Output {
            summary: &summary,
            teardown: &teardown,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: failed to serialize summary: {err}");
                return ExitCode::RUNTIME_ERROR;
            }
        }
    }

    match summary {
        RunSummary::Aborted { .. } => ExitCode::PARTIAL_SUCCESS,
        RunSummary::Completed(report) if report.failures() > 0 => ExitCode::TEST_FAILURE,
        RunSummary::Completed(_) => ExitCode::SUCCESS,
    }
}
