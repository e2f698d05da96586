//! Stale live-location sweep.
//!
//! A periodic task that bounds how old a "last known location" can be: any
//! participant ping older than the policy threshold is evicted from the
//! session's live-location map, one entry at a time, so future readers never
//! have to re-check timestamps themselves.
//!
//! The task is owned by the process lifecycle: started explicitly, stopped
//! through a shutdown channel, and driven by an injected clock so tests can
//! call [`StaleLocationSweeper::sweep_once`] directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use waypool_core::clock::Clock;
use waypool_core::config::SafetyPolicy;
use waypool_core::error::Result;
use waypool_core::session::SessionRepository;

/// Evicts stale live-location entries from active sessions.
pub struct StaleLocationSweeper {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    policy: SafetyPolicy,
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals shutdown and waits for the task to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl StaleLocationSweeper {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        policy: SafetyPolicy,
    ) -> Self {
        Self {
            sessions,
            clock,
            policy,
        }
    }

    /// One sweep pass over all sweepable sessions (active, not finished,
    /// with at least one live-location entry). Returns the number of
    /// entries evicted.
    pub async fn sweep_once(&self) -> Result<usize> {
        let now = self.clock.now();
        let stale_after = self.policy.stale_location_after();
        let mut evicted_total = 0;

        for session in self.sessions.find_sweepable().await? {
            let stale: Vec<String> = session
                .live_locations
                .iter()
                .filter(|(_, ping)| now - ping.timestamp > stale_after)
                .map(|(participant, _)| participant.clone())
                .collect();
            if stale.is_empty() {
                continue;
            }

            let evicted = Arc::new(AtomicUsize::new(0));
            let evicted_counter = evicted.clone();
            self.sessions
                .update(
                    &session.id,
                    Box::new(move |session| {
                        for participant in &stale {
                            // Re-check under the session lock; the tracker
                            // may have refreshed this ping in the meantime.
                            let still_stale = session
                                .live_locations
                                .get(participant)
                                .is_some_and(|ping| now - ping.timestamp > stale_after);
                            if still_stale {
                                session.live_locations.remove(participant);
                                evicted_counter.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Ok(())
                    }),
                )
                .await?;

            let evicted = evicted.load(Ordering::SeqCst);
            if evicted > 0 {
                tracing::debug!(
                    session_id = %session.id,
                    evicted,
                    "evicted stale live locations"
                );
            }
            evicted_total += evicted;
        }

        Ok(evicted_total)
    }

    /// Spawns the periodic sweep loop. The first pass runs one interval
    /// after start, then every interval until the handle is stopped.
    pub fn spawn(self: Arc<Self>) -> SweeperHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let interval = self.policy.sweep_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_once().await {
                            tracing::warn!(%err, "stale location sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("stale location sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}
