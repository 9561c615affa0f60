//! Per-run log directory and tracing sinks.
//!
//! Every run writes into a fresh `<log_root>/<YYYYmmdd-HHMMSS>/`
//! directory holding `run.log`, `reconcile.log` and one
//! `daemon-<guid>.log` per daemon started. Nothing from earlier runs is
//! read back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use smi_cfgmgr_common::{SmiError, SmiResult};
use tracing::{Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{dynamic_filter_fn, LevelFilter};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const RUN_LOG: &str = "run.log";
pub const RECONCILE_LOG: &str = "reconcile.log";

/// Target prefix routed to `reconcile.log`.
pub const RECONCILE_TARGET: &str = "smimgrd::reconcile";

const DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

/// The directory of the current run.
#[derive(Debug, Clone)]
pub struct RunLog {
    dir: PathBuf,
}

impl RunLog {
    /// Creates a new timestamped directory under `log_root`.
    ///
    /// Two runs started within the same second get `-2`, `-3`, ...
    /// suffixes instead of sharing a directory.
    pub fn create(log_root: impl AsRef<Path>) -> SmiResult<Self> {
        let log_root = log_root.as_ref();
        fs::create_dir_all(log_root)?;

        let stamp = Local::now().format(DIR_FORMAT).to_string();
        let mut candidate = log_root.join(&stamp);
        let mut n = 1;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(Self { dir: candidate }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && n < 100 => {
                    n += 1;
                    candidate = log_root.join(format!("{}-{}", stamp, n));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.dir.join(RUN_LOG)
    }

    pub fn reconcile_log_path(&self) -> PathBuf {
        self.dir.join(RECONCILE_LOG)
    }

    /// Output sink of the daemon bound to `guid`.
    pub fn daemon_log_path(&self, guid: &str) -> PathBuf {
        self.dir.join(format!("daemon-{}.log", guid))
    }

    fn sink(&self, file_name: &str) -> SmiResult<(NonBlocking, WorkerGuard)> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(&self.dir)
            .map_err(|e| SmiError::internal(format!("cannot open {}: {}", file_name, e)))?;
        Ok(tracing_appender::non_blocking(appender))
    }
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes both log files.
pub struct LoggingGuard {
    _run: WorkerGuard,
    _reconcile: WorkerGuard,
}

/// True for events of the reconciler and for anything logged while one
/// of its spans is entered (inventory re-queries, failed shell commands).
fn in_reconcile_phase<S>(meta: &Metadata<'_>, cx: &Context<'_, S>) -> bool
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if meta.target().starts_with(RECONCILE_TARGET) {
        return true;
    }
    cx.lookup_current().is_some_and(|span| {
        span.scope()
            .any(|s| s.metadata().target().starts_with(RECONCILE_TARGET))
    })
}

/// Builds the `run.log` and `reconcile.log` layers; both record debug
/// and above.
pub fn file_layers<S>(
    run_log: &RunLog,
) -> SmiResult<(Box<dyn Layer<S> + Send + Sync + 'static>, LoggingGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let (run_writer, run_guard) = run_log.sink(RUN_LOG)?;
    let (reconcile_writer, reconcile_guard) = run_log.sink(RECONCILE_LOG)?;

    let run_file = fmt::layer()
        .with_writer(run_writer)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let reconcile_file = fmt::layer()
        .with_writer(reconcile_writer)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG)
        .with_filter(dynamic_filter_fn(in_reconcile_phase::<S>));

    Ok((
        run_file.and_then(reconcile_file).boxed(),
        LoggingGuard {
            _run: run_guard,
            _reconcile: reconcile_guard,
        },
    ))
}

/// Installs the global subscriber: console, run-wide file and
/// reconciliation-phase file.
///
/// The console level comes from `RUST_LOG` (default `info`).
pub fn init_logging(run_log: &RunLog) -> SmiResult<LoggingGuard> {
    let (files, guard) = file_layers(run_log)?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(files)
        .with(console)
        .try_init()
        .map_err(|e| SmiError::internal(format!("failed to install log subscriber: {}", e)))?;
    Ok(guard)
}
