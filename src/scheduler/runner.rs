//! Reminder scheduler background loop.
//!
//! A tokio task polls the [`ReminderStore`] every few seconds. Due reminders
//! become in-memory active alerts which are announced through the alert sink
//! and re-announced until the user confirms them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::memory::types::now_local;
use crate::memory::{ReminderStore, StoreError};

/// Fire-and-forget output for announcements. Must not block.
pub type AlertSink = Box<dyn Fn(&str) + Send + Sync>;

/// A due, unconfirmed reminder.
#[derive(Debug, Clone)]
struct ActiveAlert {
    message: String,
    last_announced: Option<Instant>,
}

/// Background reminder watcher.
///
/// The active-alert set lives behind one mutex; a tick and
/// [`confirm_all`](Self::confirm_all) each hold it for their whole duration,
/// so the two never interleave.
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    active: Mutex<BTreeMap<i64, ActiveAlert>>,
    sink: AlertSink,
    poll: Duration,
    reannounce: Duration,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn ReminderStore>, sink: AlertSink, config: &SchedulerConfig) -> Self {
        Self {
            store,
            active: Mutex::new(BTreeMap::new()),
            sink,
            poll: Duration::from_secs(config.poll_secs.max(1)),
            reannounce: Duration::from_secs(config.reannounce_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<i64, ActiveAlert>> {
        // A panicking sink may poison the lock; the map is still consistent.
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of alerts awaiting confirmation.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether any alert awaits confirmation.
    pub fn has_active(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Run one tick against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the store error if pending reminders cannot be listed.
    pub fn tick(&self) -> Result<usize, StoreError> {
        self.tick_at(now_local(), Instant::now())
    }

    /// Run one tick. `now` decides which reminders are due, `clock` spaces
    /// announcements. Returns the number of announcements made.
    ///
    /// # Errors
    ///
    /// Returns the store error if pending reminders cannot be listed.
    pub fn tick_at(&self, now: NaiveDateTime, clock: Instant) -> Result<usize, StoreError> {
        let mut active = self.lock();

        let pending = self.store.list_pending()?;
        // Alerts confirmed through another path are dropped.
        active.retain(|id, _| pending.iter().any(|r| r.id == *id));
        for reminder in pending.into_iter().filter(|r| r.is_due(now)) {
            active.entry(reminder.id).or_insert_with(|| {
                info!(id = reminder.id, "reminder due");
                ActiveAlert {
                    message: reminder.message,
                    last_announced: None,
                }
            });
        }

        let mut announced = 0;
        for (id, alert) in active.iter_mut() {
            let stale = alert
                .last_announced
                .is_none_or(|at| clock.saturating_duration_since(at) >= self.reannounce);
            if stale {
                debug!(id, "announcing reminder");
                (self.sink)(&format!("Reminder: {}. Please confirm.", alert.message));
                alert.last_announced = Some(clock);
                announced += 1;
            }
        }
        Ok(announced)
    }

    /// Mark every active reminder completed and clear the set.
    ///
    /// Returns `false`, touching nothing, when no alert is active.
    pub fn confirm_all(&self) -> bool {
        let mut active = self.lock();
        if active.is_empty() {
            return false;
        }
        for id in active.keys() {
            match self.store.complete(*id) {
                Ok(true) => debug!(id, "reminder confirmed"),
                Ok(false) => debug!(id, "reminder was already completed"),
                Err(e) => warn!(id, "cannot mark reminder completed: {e}"),
            }
        }
        active.clear();
        true
    }

    /// Start the background loop. It stops when `cancel` fires.
    pub fn run(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(poll_secs = self.poll.as_secs(), "reminder scheduler started");
            let mut interval = tokio::time::interval(self.poll);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                // Store queries and the sink block; keep them off the runtime workers.
                let scheduler = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || scheduler.tick()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("reminder tick failed: {e}"),
                    Err(e) if e.is_panic() => error!("reminder tick panicked"),
                    Err(e) => warn!("reminder tick cancelled: {e}"),
                }
            }
            info!("reminder scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::memory::SqliteStore;
    use chrono::Duration as ChronoDuration;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_sink() -> (AlertSink, Arc<Mutex<Vec<String>>>) {
        let said = Arc::new(Mutex::new(Vec::new()));
        let said_in_sink = Arc::clone(&said);
        let sink: AlertSink = Box::new(move |text| {
            said_in_sink.lock().expect("lock").push(text.to_owned());
        });
        (sink, said)
    }

    fn scheduler(store: Arc<SqliteStore>) -> (ReminderScheduler, Arc<Mutex<Vec<String>>>) {
        let (sink, said) = recording_sink();
        (
            ReminderScheduler::new(store, sink, &SchedulerConfig::default()),
            said,
        )
    }

    #[test]
    fn due_reminder_is_announced_once_per_window() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        store
            .add_reminder("stretch", now - ChronoDuration::seconds(1))
            .expect("add");
        let (sched, said) = scheduler(Arc::clone(&store));

        let t0 = Instant::now();
        assert_eq!(sched.tick_at(now, t0).expect("tick"), 1);
        assert_eq!(sched.tick_at(now, t0 + Duration::from_secs(5)).expect("tick"), 0);
        assert_eq!(sched.tick_at(now, t0 + Duration::from_secs(44)).expect("tick"), 0);
        assert_eq!(sched.tick_at(now, t0 + Duration::from_secs(45)).expect("tick"), 1);

        let said = said.lock().expect("lock");
        assert_eq!(said.len(), 2);
        assert_eq!(said[0], "Reminder: stretch. Please confirm.");
    }

    #[test]
    fn future_reminder_is_not_announced() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        store
            .add_reminder("later", now + ChronoDuration::minutes(5))
            .expect("add");
        let (sched, said) = scheduler(store);

        assert_eq!(sched.tick_at(now, Instant::now()).expect("tick"), 0);
        assert_eq!(sched.active_count(), 0);
        assert!(said.lock().expect("lock").is_empty());
    }

    #[test]
    fn confirm_all_completes_and_silences() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        store
            .add_reminder("a", now - ChronoDuration::seconds(10))
            .expect("add");
        store
            .add_reminder("b", now - ChronoDuration::seconds(5))
            .expect("add");
        let (sched, said) = scheduler(Arc::clone(&store));

        let t0 = Instant::now();
        sched.tick_at(now, t0).expect("tick");
        assert_eq!(sched.active_count(), 2);

        assert!(sched.confirm_all());
        assert_eq!(sched.active_count(), 0);
        assert!(store.list_pending().expect("pending").is_empty());

        sched
            .tick_at(now, t0 + Duration::from_secs(120))
            .expect("tick");
        assert_eq!(said.lock().expect("lock").len(), 2);
    }

    #[test]
    fn confirm_all_without_alerts_is_a_no_op() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        store
            .add_reminder("future", now + ChronoDuration::hours(1))
            .expect("add");
        let (sched, _said) = scheduler(Arc::clone(&store));

        assert!(!sched.confirm_all());
        assert_eq!(store.list_pending().expect("pending").len(), 1);
    }

    #[test]
    fn alert_completed_elsewhere_is_dropped() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        let id = store
            .add_reminder("x", now - ChronoDuration::seconds(1))
            .expect("add");
        let (sched, _said) = scheduler(Arc::clone(&store));

        sched.tick_at(now, Instant::now()).expect("tick");
        assert_eq!(sched.active_count(), 1);
        store.complete(id).expect("complete");
        sched.tick_at(now, Instant::now()).expect("tick");
        assert_eq!(sched.active_count(), 0);
    }

    #[test]
    fn panicking_sink_does_not_wedge_the_scheduler() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let now = now_local();
        store
            .add_reminder("boom", now - ChronoDuration::seconds(1))
            .expect("add");
        let sink: AlertSink = Box::new(|_| panic!("sink failure"));
        let sched = ReminderScheduler::new(store, sink, &SchedulerConfig::default());

        let outcome = catch_unwind(AssertUnwindSafe(|| sched.tick_at(now, Instant::now())));
        assert!(outcome.is_err());
        assert_eq!(sched.active_count(), 1);
        assert!(sched.confirm_all());
    }

    #[tokio::test]
    async fn run_announces_and_stops_on_cancel() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        store
            .add_reminder("tea", now_local() - ChronoDuration::seconds(1))
            .expect("add");
        let (sink, said) = recording_sink();
        let sched = Arc::new(ReminderScheduler::new(
            store,
            sink,
            &SchedulerConfig::default(),
        ));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&sched).run(cancel.clone());

        // The first interval tick fires immediately.
        let deadline = Instant::now() + Duration::from_secs(5);
        while said.lock().expect("lock").is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(said.lock().expect("lock").len(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stops")
            .expect("join");
    }

    #[tokio::test]
    async fn run_ticks_off_the_runtime_thread_and_survives_a_panic() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        store
            .add_reminder("water plants", now_local() - ChronoDuration::seconds(1))
            .expect("add");

        let calls = Arc::new(AtomicUsize::new(0));
        let threads = Arc::new(Mutex::new(Vec::new()));
        let sink: AlertSink = {
            let calls = Arc::clone(&calls);
            let threads = Arc::clone(&threads);
            Box::new(move |_| {
                threads
                    .lock()
                    .expect("lock")
                    .push(std::thread::current().id());
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first announcement fails");
                }
            })
        };
        let config = SchedulerConfig {
            poll_secs: 1,
            reannounce_secs: 0,
        };
        let sched = Arc::new(ReminderScheduler::new(store, sink, &config));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&sched).run(cancel.clone());

        // A later tick announces again after the panicking one.
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(calls.load(Ordering::SeqCst) >= 2);

        let runtime_thread = std::thread::current().id();
        assert!(
            threads
                .lock()
                .expect("lock")
                .iter()
                .all(|id| *id != runtime_thread)
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stops")
            .expect("join");
    }
}
