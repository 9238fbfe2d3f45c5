//! Single-instance lifecycle: PID file, detachment, stop/restart.
//!
//! Everything here is synchronous and runs before the async runtime exists;
//! forking a process that already has runtime threads is unsound.

use std::{
  fmt,
  fs::{File, OpenOptions},
  io::Write as _,
  os::fd::AsRawFd,
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use nix::{
  errno::Errno,
  fcntl::{Flock, FlockArg},
  sys::{
    signal::{Signal, kill},
    stat::{Mode, umask},
  },
  unistd::{ForkResult, Pid, chdir, dup2, fork, getpid, setsid},
};

use crate::{Error, Result};

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ─── PID file ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
  path: PathBuf,
}

impl PidFile {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  pub fn path(&self) -> &Path { &self.path }

  /// The recorded PID. Missing, unreadable or garbled files read as `None`.
  pub fn read(&self) -> Option<Pid> {
    let text = std::fs::read_to_string(&self.path).ok()?;
    let raw: i32 = text.trim().parse().ok()?;
    (raw > 0).then(|| Pid::from_raw(raw))
  }

  pub fn write(&self, pid: Pid) -> Result<()> {
    std::fs::write(&self.path, format!("{pid}\n")).map_err(|source| Error::PidFileWrite {
      path: self.path.clone(),
      source,
    })
  }

  /// Open the file and take an exclusive lock on it without blocking.
  ///
  /// The lock lives as long as the returned handle. A lock held elsewhere is
  /// [`Error::AlreadyRunning`].
  pub fn lock(&self) -> Result<Flock<File>> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&self.path)
      .map_err(|source| Error::PidFileWrite { path: self.path.clone(), source })?;
    Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
      if errno == Errno::EWOULDBLOCK {
        Error::AlreadyRunning(self.path.clone())
      } else {
        Error::PidFileLock { path: self.path.clone(), source: errno }
      }
    })
  }

  /// Replace the locked file's contents with `pid`.
  fn write_locked(&self, lock: &Flock<File>, pid: Pid) -> Result<()> {
    let mut file: &File = lock;
    file
      .set_len(0)
      .and_then(|()| file.write_all(format!("{pid}\n").as_bytes()))
      .map_err(|source| Error::PidFileWrite { path: self.path.clone(), source })
  }

  pub fn remove(&self) {
    match std::fs::remove_file(&self.path) {
      Ok(()) => tracing::debug!(path = %self.path.display(), "removed pid file"),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove pid file"),
    }
  }

  /// Remove the file only if it still names `pid`.
  pub fn remove_if_owned(&self, pid: Pid) {
    if self.read() == Some(pid) {
      self.remove();
    }
  }
}

/// Whether `pid` names a live process. A process we may not signal still
/// counts as alive.
pub fn is_alive(pid: Pid) -> bool {
  match kill(pid, None) {
    Ok(()) | Err(Errno::EPERM) => true,
    Err(_) => false,
  }
}

// ─── Supervisor ──────────────────────────────────────────────────────────────

/// How `start` detaches from the invoking terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
  /// Double-fork into the background.
  Fork,
  /// Stay attached; useful under a service manager and in tests.
  Foreground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
  Stopped,
  Starting,
  Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
  /// No live daemon was recorded.
  NotRunning,
  Terminated(Pid),
  /// SIGTERM was sent but the process outlived the stop timeout.
  StillRunning(Pid),
}

#[derive(Debug)]
pub struct Supervisor {
  pid_file:     PidFile,
  state:        SupervisorState,
  stop_timeout: Duration,
}

impl Supervisor {
  pub fn new(pid_file: PidFile) -> Self {
    Self {
      pid_file,
      state: SupervisorState::Stopped,
      stop_timeout: DEFAULT_STOP_TIMEOUT,
    }
  }

  pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
    self.stop_timeout = timeout;
    self
  }

  pub fn state(&self) -> SupervisorState { self.state }

  /// Terminate the recorded daemon, if any, and wait for it to exit.
  pub fn stop(&mut self) -> Result<StopOutcome> {
    let Some(pid) = self.pid_file.read() else {
      tracing::info!("daemon is not running");
      return Ok(StopOutcome::NotRunning);
    };
    if pid == getpid() {
      return Ok(StopOutcome::NotRunning);
    }
    if !is_alive(pid) {
      tracing::info!(%pid, "removing stale pid file");
      self.pid_file.remove();
      return Ok(StopOutcome::NotRunning);
    }

    tracing::info!(%pid, "stopping daemon");
    match kill(pid, Signal::SIGTERM) {
      Ok(()) => {}
      Err(Errno::ESRCH) => {
        self.pid_file.remove_if_owned(pid);
        return Ok(StopOutcome::NotRunning);
      }
      Err(source) => return Err(Error::Signal { pid, source }),
    }

    let deadline = Instant::now() + self.stop_timeout;
    while Instant::now() < deadline {
      if !is_alive(pid) {
        self.pid_file.remove_if_owned(pid);
        tracing::info!(%pid, "daemon stopped");
        return Ok(StopOutcome::Terminated(pid));
      }
      std::thread::sleep(POLL_INTERVAL);
    }

    tracing::warn!(%pid, timeout = ?self.stop_timeout, "daemon did not exit after SIGTERM");
    Ok(StopOutcome::StillRunning(pid))
  }

  /// Replace any running daemon with this process.
  ///
  /// With [`Detach::Fork`] the invoking process exits inside this call and
  /// only the detached grandchild returns.
  pub fn start(&mut self, detach: Detach) -> Result<PidGuard> {
    self.state = SupervisorState::Starting;

    match self.stop() {
      Ok(StopOutcome::StillRunning(pid)) => {
        self.state = SupervisorState::Stopped;
        return Err(Error::StillRunning(pid));
      }
      Ok(StopOutcome::NotRunning | StopOutcome::Terminated(_)) => {}
      Err(e) => {
        self.state = SupervisorState::Stopped;
        return Err(e);
      }
    }

    if detach == Detach::Fork
      && let Err(e) = daemonize()
    {
      self.state = SupervisorState::Stopped;
      return Err(e);
    }

    let pid = getpid();
    let claimed = self
      .pid_file
      .lock()
      .and_then(|lock| self.pid_file.write_locked(&lock, pid).map(|()| lock));
    let lock = match claimed {
      Ok(lock) => lock,
      Err(e) => {
        tracing::error!(%pid, error = %e, "cannot claim pid file, terminating");
        self.state = SupervisorState::Stopped;
        if detach == Detach::Fork {
          // Nobody is left to report to; end the detached process.
          let _ = kill(pid, Signal::SIGTERM);
        }
        return Err(e);
      }
    };

    self.state = SupervisorState::Running;
    tracing::info!(%pid, "daemon running");
    Ok(PidGuard { pid_file: self.pid_file.clone(), pid, _lock: lock })
  }

  pub fn restart(&mut self, detach: Detach) -> Result<PidGuard> {
    self.stop()?;
    self.start(detach)
  }
}

/// Holds the PID file lock for the daemon's lifetime and removes the file
/// when the daemon exits, unless another instance has since claimed it.
pub struct PidGuard {
  pid_file: PidFile,
  pid:      Pid,
  /// Released after `drop` has removed the file.
  _lock:    Flock<File>,
}

impl fmt::Debug for PidGuard {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PidGuard")
      .field("pid_file", &self.pid_file)
      .field("pid", &self.pid)
      .finish_non_exhaustive()
  }
}

impl PidGuard {
  pub fn pid(&self) -> Pid { self.pid }
}

impl Drop for PidGuard {
  fn drop(&mut self) { self.pid_file.remove_if_owned(self.pid); }
}

// ─── Detachment ──────────────────────────────────────────────────────────────

fn daemonize() -> Result<()> {
  fork_and_exit_parent()?;
  chdir("/").map_err(Error::Detach)?;
  setsid().map_err(Error::Detach)?;
  umask(Mode::empty());
  // Second fork: the session leader exits so the daemon can never
  // reacquire a controlling terminal.
  fork_and_exit_parent()?;
  redirect_std_streams()
}

fn fork_and_exit_parent() -> Result<()> {
  // SAFETY: called before the async runtime or any other thread is started,
  // so the child inherits a single-threaded process.
  match unsafe { fork() }.map_err(Error::Detach)? {
    ForkResult::Parent { .. } => std::process::exit(0),
    ForkResult::Child => Ok(()),
  }
}

fn redirect_std_streams() -> Result<()> {
  let null = OpenOptions::new()
    .read(true)
    .write(true)
    .open("/dev/null")
    .map_err(Error::io("/dev/null"))?;
  for fd in 0..=2 {
    dup2(null.as_raw_fd(), fd).map_err(Error::Detach)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::{os::unix::process::ExitStatusExt as _, process::Command};

  use nix::unistd::geteuid;

  use super::*;

  fn pid_file(dir: &tempfile::TempDir) -> PidFile { PidFile::new(dir.path().join("ytracker.pid")) }

  #[test]
  fn pid_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);
    assert_eq!(file.read(), None);

    file.write(Pid::from_raw(4242)).unwrap();
    assert_eq!(file.read(), Some(Pid::from_raw(4242)));

    file.remove_if_owned(Pid::from_raw(1));
    assert!(file.path().exists());
    file.remove_if_owned(Pid::from_raw(4242));
    assert!(!file.path().exists());
  }

  #[test]
  fn garbled_pid_file_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);
    std::fs::write(file.path(), "not a pid").unwrap();
    assert_eq!(file.read(), None);
    std::fs::write(file.path(), "-5").unwrap();
    assert_eq!(file.read(), None);
  }

  #[test]
  fn stop_without_pid_file_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut supervisor = Supervisor::new(pid_file(&dir));
    assert_eq!(supervisor.stop().unwrap(), StopOutcome::NotRunning);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
  }

  #[test]
  fn stale_pid_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);

    let mut child = Command::new("true").spawn().unwrap();
    let dead = Pid::from_raw(child.id() as i32);
    child.wait().unwrap();
    file.write(dead).unwrap();

    let mut supervisor = Supervisor::new(file.clone());
    assert_eq!(supervisor.stop().unwrap(), StopOutcome::NotRunning);
    assert!(!file.path().exists());
  }

  #[test]
  fn stop_never_signals_its_own_process() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);
    file.write(getpid()).unwrap();

    let mut supervisor = Supervisor::new(file.clone());
    assert_eq!(supervisor.stop().unwrap(), StopOutcome::NotRunning);
    assert_eq!(file.read(), Some(getpid()));
  }

  #[test]
  fn restart_terminates_live_daemon_before_claiming_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);

    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let old = Pid::from_raw(child.id() as i32);
    // Reap the child as soon as it exits so it does not linger as a zombie.
    let waiter = std::thread::spawn(move || child.wait());
    file.write(old).unwrap();

    let mut supervisor = Supervisor::new(file.clone());
    let guard = supervisor.restart(Detach::Foreground).unwrap();

    let status = waiter.join().unwrap().unwrap();
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    assert!(!is_alive(old));

    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert_eq!(guard.pid(), getpid());
    assert_eq!(file.read(), Some(getpid()));

    drop(guard);
    assert!(!file.path().exists());
  }

  #[test]
  fn unwritable_pid_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be written as a file.
    let mut supervisor = Supervisor::new(PidFile::new(dir.path()));

    let err = supervisor.start(Detach::Foreground).unwrap_err();
    assert!(matches!(err, Error::PidFileWrite { .. }), "{err}");
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
  }

  #[test]
  fn second_start_fails_while_the_lock_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);

    let guard = Supervisor::new(file.clone()).start(Detach::Foreground).unwrap();
    assert!(matches!(file.lock(), Err(Error::AlreadyRunning(_))));

    let mut second = Supervisor::new(file.clone());
    let err = second.start(Detach::Foreground).unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning(_)), "{err}");
    assert_eq!(second.state(), SupervisorState::Stopped);
    assert_eq!(file.read(), Some(getpid()));

    drop(guard);
    assert!(!file.path().exists());
    drop(file.lock().unwrap());
  }

  #[test]
  fn failed_stop_leaves_supervisor_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);
    // pid 1 is alive but cannot be signalled by an unprivileged test.
    file.write(Pid::from_raw(1)).unwrap();

    // As root the signal would reach init.
    if geteuid().is_root() {
      return;
    }

    let mut supervisor = Supervisor::new(file.clone());
    let err = supervisor.start(Detach::Foreground).unwrap_err();
    assert!(matches!(err, Error::Signal { .. }), "{err}");
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
  }

  #[test]
  fn guard_leaves_a_reclaimed_pid_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = pid_file(&dir);

    let guard = Supervisor::new(file.clone()).start(Detach::Foreground).unwrap();
    file.write(Pid::from_raw(4242)).unwrap();
    drop(guard);

    assert_eq!(file.read(), Some(Pid::from_raw(4242)));
  }
}
