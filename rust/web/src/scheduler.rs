//! The single logical scheduler behind every session timer: periodic tick
//! loops for the real-time engines and chess clocks, one-shot deferred
//! actions for bot think-delays. All timers are registered here so ending
//! a session cancels them at the next dispatch boundary; there are no
//! free-running intervals anywhere else in the process.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type TaskId = u64;

#[derive(Debug)]
struct TaskEntry {
    session_id: String,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a periodic task. The callback returns `false` to stop the
    /// loop (typically when its session has ended). Overrunning callbacks
    /// coalesce: missed ticks are skipped, the queue never grows.
    pub fn every<F>(self: &Arc<Self>, session_id: &str, period: Duration, mut callback: F) -> TaskId
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let scheduler = Arc::clone(self);
        let session = session_id.to_string();
        let session_for_task = session.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match catch_unwind(AssertUnwindSafe(&mut callback)) {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(_) => {
                        // Confined to this session; the process keeps serving
                        tracing::error!(
                            session_id = %session_for_task,
                            task_id = id,
                            "periodic task panicked; stopping it"
                        );
                        break;
                    }
                }
            }
            scheduler.forget(id);
        });

        self.insert(id, session, handle);
        id
    }

    /// One-shot deferred action.
    pub fn after<F>(self: &Arc<Self>, session_id: &str, delay: Duration, callback: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let scheduler = Arc::clone(self);
        let session = session_id.to_string();
        let session_for_task = session.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!(
                    session_id = %session_for_task,
                    task_id = id,
                    "deferred task panicked"
                );
            }
            scheduler.forget(id);
        });

        self.insert(id, session, handle);
        id
    }

    pub fn cancel(&self, task_id: TaskId) {
        let entry = {
            let mut tasks = self.lock_tasks();
            tasks.remove(&task_id)
        };
        if let Some(entry) = entry {
            entry.handle.abort();
        }
    }

    /// Cancel every task registered for a session. Called on session end;
    /// running callbacks finish their current dispatch, nothing fires after.
    pub fn cancel_session(&self, session_id: &str) {
        let removed: Vec<TaskEntry> = {
            let mut tasks = self.lock_tasks();
            let ids: Vec<TaskId> = tasks
                .iter()
                .filter(|(_, entry)| entry.session_id == session_id)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| tasks.remove(&id)).collect()
        };
        for entry in &removed {
            entry.handle.abort();
        }
        if !removed.is_empty() {
            tracing::debug!(
                session_id = %session_id,
                cancelled = removed.len(),
                "cancelled session tasks"
            );
        }
    }

    pub fn task_count(&self) -> usize {
        self.lock_tasks().len()
    }

    fn insert(&self, id: TaskId, session_id: String, handle: JoinHandle<()>) {
        self.lock_tasks().insert(id, TaskEntry { session_id, handle });
    }

    fn forget(&self, id: TaskId) {
        self.lock_tasks().remove(&id);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn periodic_task_fires_until_stopped() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        scheduler.every("s1", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 2
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[tokio::test]
    async fn one_shot_fires_once() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        scheduler.after("s1", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[tokio::test]
    async fn cancel_session_stops_pending_tasks() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        scheduler.after("victim", Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&fired);
        scheduler.every("victim", Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let counter = Arc::clone(&fired);
        scheduler.after("survivor", Duration::from_millis(30), move || {
            counter.fetch_add(100, Ordering::SeqCst);
        });

        scheduler.cancel_session("victim");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 100, "only the survivor fires");
    }

    #[tokio::test]
    async fn panicking_callback_is_confined() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.every("exploder", Duration::from_millis(10), || {
            panic!("boom");
        });
        let counter = Arc::clone(&fired);
        scheduler.every("bystander", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(fired.load(Ordering::SeqCst) >= 2, "other sessions keep ticking");
        scheduler.cancel_session("bystander");
    }

    #[tokio::test]
    async fn cancel_by_id_stops_a_single_task() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let id = scheduler.after("s1", Duration::from_millis(40), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel(id);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
