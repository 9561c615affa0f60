//! smimgrd entry point.
//!
//! Parses flags, loads the configuration, opens the run log directory and
//! runs a single reconciliation pass.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use smi_cfgmgr_common::SystemHost;
use smimgrd::config::DEFAULT_CONFIG_PATH;
use smimgrd::runlog::{init_logging, LoggingGuard};
use smimgrd::{DeleteMode, PortPolicy, RunLog, RunOptions, SmiConfig, SmiMgr, TerminalOperator};

#[derive(Parser, Debug)]
#[command(name = "smimgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log mutating commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Delete every existing SMI device (asks for confirmation)
    #[arg(long, conflicts_with = "select")]
    delete_all: bool,

    /// Pick existing SMI devices to delete from a numbered list
    #[arg(long)]
    select: bool,

    /// Print the status of existing SMI devices and exit
    #[arg(long)]
    status: bool,

    /// Start one subnet manager per endpoint GUID
    #[arg(long)]
    supervise: bool,

    /// Report non-Active ports as warnings instead of failures
    #[arg(long)]
    relaxed: bool,

    /// Configuration file; must exist when given
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Root directory for run logs (overrides the configuration)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Answer yes to the delete-all confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        let delete_mode = if self.delete_all {
            DeleteMode::All
        } else if self.select {
            DeleteMode::Select
        } else {
            DeleteMode::None
        };
        RunOptions {
            dry_run: self.dry_run,
            delete_mode,
            status_only: self.status,
            supervise: self.supervise,
            policy: if self.relaxed {
                PortPolicy::Lenient
            } else {
                PortPolicy::Strict
            },
        }
    }

    /// An explicit `--config` must load; the default path may be absent.
    fn load_config(&self) -> Result<SmiConfig> {
        match &self.config {
            Some(path) => SmiConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display())),
            None => SmiConfig::load_or_default(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("loading configuration from {}", DEFAULT_CONFIG_PATH)),
        }
    }
}

fn setup(args: &Args) -> Result<(SmiConfig, RunLog, LoggingGuard)> {
    let config = args.load_config()?;
    let log_root = args
        .log_dir
        .clone()
        .unwrap_or_else(|| config.logging.log_root.clone());
    let run_log = RunLog::create(&log_root)
        .with_context(|| format!("creating run directory under {}", log_root.display()))?;
    let guard = init_logging(&run_log).context("initialising logging")?;
    Ok((config, run_log, guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (config, run_log, _guard) = match setup(&args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("smimgrd: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("--- Starting smimgrd ---");
    info!(run_dir = %run_log.dir().display(), "Run logs");

    let host = SystemHost::new();
    let operator = TerminalOperator::new(args.yes);
    let mgr = SmiMgr::new(&host, &config, &operator, &run_log);

    match mgr.run(args.run_options()).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("smimgrd error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_delete_all_conflicts_with_select() {
        let err = Args::try_parse_from(["smimgrd", "--delete-all", "--select"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["smimgrd", "--frobnicate"]).is_err());
    }

    #[test]
    fn test_run_options_mapping() {
        let args =
            Args::try_parse_from(["smimgrd", "--select", "--relaxed", "--supervise", "--dry-run"])
                .unwrap();
        let options = args.run_options();
        assert_eq!(options.delete_mode, DeleteMode::Select);
        assert_eq!(options.policy, PortPolicy::Lenient);
        assert!(options.supervise && options.dry_run && !options.status_only);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("smimgrd.toml");
        let args = Args::try_parse_from(["smimgrd", "--config", missing.to_str().unwrap()]).unwrap();
        assert_eq!(args.config.as_deref(), Some(missing.as_path()));
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_default_config_is_optional() {
        let args = Args::try_parse_from(["smimgrd"]).unwrap();
        assert!(args.config.is_none());
    }
}
