//! `ytracker` — keeps a local, size-bounded mirror of channel uploads.
//!
//! # Usage
//!
//! ```text
//! ytracker start [--foreground]     start the daemon, replacing a running one
//! ytracker stop                     stop the running daemon
//! ytracker restart [--foreground]   stop, then start
//! ytracker help                     print this help
//! ```
//!
//! Channel URLs are read from `ytracker_urls.txt` in the data directory, one
//! per line; options from `config.json` in the config directory.

use std::{ffi::OsString, process::ExitCode};

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand, error::ErrorKind};
use ytracker::{
  AppPaths, Options, PidFile, Scheduler, Supervisor, YtDlp, logging, shutdown,
  supervisor::{Detach, StopOutcome},
};
use ytracker_store_sqlite::SqliteCatalog;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "ytracker",
  version,
  about = "Download new channel uploads and keep them within a storage budget",
  disable_help_subcommand = true
)]
struct Cli {
  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
  /// Start the daemon, stopping any running instance first.
  Start {
    /// Stay attached to the terminal instead of detaching.
    #[arg(long)]
    foreground: bool,
  },
  /// Stop the running daemon.
  Stop,
  /// Stop the running daemon and start a new one.
  Restart {
    /// Stay attached to the terminal instead of detaching.
    #[arg(long)]
    foreground: bool,
  },
  /// Print this help.
  Help,
}

/// Parse the command line. No command, or one we do not recognise, means
/// [`Command::Help`]; only `--help`/`--version` output comes back as `Err`.
fn parse_command<I, T>(args: I) -> Result<Command, clap::Error>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
{
  match Cli::try_parse_from(args) {
    Ok(Cli { command: Some(command) }) => Ok(command),
    Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => Err(e),
    Ok(Cli { command: None }) | Err(_) => Ok(Command::Help),
  }
}

fn detach(foreground: bool) -> Detach {
  if foreground { Detach::Foreground } else { Detach::Fork }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> ExitCode {
  let command = match parse_command(std::env::args_os()) {
    Ok(command) => command,
    Err(e) => {
      let _ = e.print();
      return ExitCode::SUCCESS;
    }
  };

  match run(command) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!(error = format!("{e:#}"), "ytracker failed");
      eprintln!("ytracker: {e:#}");
      ExitCode::FAILURE
    }
  }
}

fn run(command: Command) -> anyhow::Result<()> {
  if let Command::Help = command {
    Cli::command().print_help().context("failed to print help")?;
    return Ok(());
  }

  let paths = AppPaths::discover().context("failed to locate data directories")?;
  paths
    .ensure_dirs()
    .context("failed to create data directories")?;
  logging::init(&paths.log_file()).context("failed to open log file")?;

  let mut supervisor = Supervisor::new(PidFile::new(paths.pid_file()));

  if let Command::Stop = command {
    return match supervisor.stop()? {
      StopOutcome::StillRunning(pid) => Err(ytracker::Error::StillRunning(pid).into()),
      StopOutcome::NotRunning | StopOutcome::Terminated(_) => Ok(()),
    };
  }

  let options = Options::load_or_create(&paths.config_file());

  // Detach before the runtime exists: its worker threads would not survive
  // the fork.
  let guard = match command {
    Command::Restart { foreground } => supervisor.restart(detach(foreground)),
    Command::Start { foreground } => supervisor.start(detach(foreground)),
    Command::Stop | Command::Help => return Ok(()),
  }
  .context("failed to start daemon")?;

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()
    .context("failed to build async runtime")?;
  let result = runtime.block_on(serve(paths, options));

  drop(runtime);
  drop(guard);
  result
}

async fn serve(paths: AppPaths, options: Options) -> anyhow::Result<()> {
  let db_file = paths.db_file();
  let catalog = SqliteCatalog::open(&db_file)
    .await
    .with_context(|| format!("failed to open catalog at {}", db_file.display()))?;

  let (trigger, shutdown) = shutdown::channel();
  let signals =
    shutdown::listen_for_signals(trigger).context("failed to install signal handlers")?;

  let extractor = YtDlp::new(&options);
  let scheduler = Scheduler::new(catalog, extractor, paths, options);
  scheduler.run(&shutdown).await;

  signals.abort();
  Ok(())
}
