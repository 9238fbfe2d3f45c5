//! Cooperative shutdown.
//!
//! A [`ShutdownTrigger`] flips a watch channel once; every [`Shutdown`]
//! handle observes it. Components check between units of work and the
//! scheduler races its inter-cycle sleep against it.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};

/// Create a connected trigger and handle.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
  let (tx, rx) = watch::channel(false);
  (ShutdownTrigger { tx }, Shutdown { rx })
}

#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
  tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
  pub fn trigger(&self) { self.tx.send_replace(true); }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
  rx: watch::Receiver<bool>,
}

impl Shutdown {
  pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

  /// Resolve once shutdown has been requested.
  pub async fn wait(&self) {
    let mut rx = self.rx.clone();
    // A dropped trigger counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
  }

  /// Sleep for `period`, returning early on shutdown. Returns `true` if the
  /// full period elapsed.
  pub async fn sleep(&self, period: Duration) -> bool {
    tokio::select! {
      _ = tokio::time::sleep(period) => true,
      _ = self.wait() => false,
    }
  }
}

/// Spawn a task that fires `trigger` on SIGTERM or SIGINT.
pub fn listen_for_signals(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut sigterm = signal(SignalKind::terminate())?;
  let mut sigint = signal(SignalKind::interrupt())?;

  Ok(tokio::spawn(async move {
    tokio::select! {
      _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
      _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }
    trigger.trigger();
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn trigger_is_seen_by_every_clone() {
    let (trigger, shutdown) = channel();
    let other = shutdown.clone();
    assert!(!shutdown.is_triggered());

    trigger.trigger();
    assert!(shutdown.is_triggered());
    assert!(other.is_triggered());
    other.wait().await;
  }

  #[tokio::test(start_paused = true)]
  async fn sleep_runs_to_completion_without_trigger() {
    let (_trigger, shutdown) = channel();
    assert!(shutdown.sleep(Duration::from_secs(3600)).await);
  }

  #[tokio::test(start_paused = true)]
  async fn sleep_is_cut_short_by_trigger() {
    let (trigger, shutdown) = channel();
    let sleeper = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.trigger();
    assert!(!sleeper.await.unwrap());
  }

  #[tokio::test]
  async fn dropped_trigger_releases_waiters() {
    let (trigger, shutdown) = channel();
    drop(trigger);
    shutdown.wait().await;
  }
}
