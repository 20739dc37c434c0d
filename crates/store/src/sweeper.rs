use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::sessions::SessionStore;

/// Background task that periodically removes expired sessions.
///
/// Sweeps go through the store's own lock, so they serialize with request traffic.
pub struct SessionSweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    pub fn spawn(store: Arc<dyn SessionStore>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let every = every.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep_expired().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(event_name = "session.sweeper_stopped", "session sweeper stopped");
        });

        Self { shutdown_tx, handle }
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(error) = self.handle.await {
            warn!(
                event_name = "session.sweeper_join_failed",
                error = %error,
                "session sweeper did not exit cleanly"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use concierge_core::config::SessionConfig;

    use crate::clock::ManualClock;
    use crate::sessions::{InMemorySessionStore, SessionStore};
    use crate::sweeper::SessionSweeper;

    fn store(clock: Arc<ManualClock>) -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::with_clock(
            SessionConfig { ttl_secs: 60, ..SessionConfig::default() },
            clock,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_sessions_on_each_tick() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("valid timestamp"),
        ));
        let store = store(clock.clone());
        store.create(None).await;
        clock.advance(chrono::Duration::seconds(120));

        let sweeper = SessionSweeper::spawn(store.clone(), Duration::from_secs(30));
        assert_eq!(store.len().await, 1, "nothing is swept before the first tick");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.len().await, 0);

        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_task() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = store(clock);

        let sweeper = SessionSweeper::spawn(store, Duration::from_secs(300));
        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("sweeper should stop promptly");
    }
}
