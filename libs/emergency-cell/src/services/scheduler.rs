// libs/emergency-cell/src/services/scheduler.rs
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Clock plus timer source for the dispatch flow.
///
/// `cancel` is idempotent and stops all future runs. A run that had already
/// passed its liveness check on another worker thread may still complete after
/// `cancel` returns, so tasks must tolerate one late invocation (the dispatch
/// machine tags every callback with its episode for this).
pub trait Scheduler: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// First run happens one `period` after scheduling.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerId;

    fn cancel(&self, id: TimerId);

    /// Live (not yet fired or cancelled) timers.
    fn pending(&self) -> usize;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ==============================================================================
// TOKIO SCHEDULER
// ==============================================================================

/// Wall-clock scheduler backed by spawned tokio tasks.
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    fn next_id(&self) -> TimerId {
        TimerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerId {
        let id = self.next_id();
        let timers = self.timers.clone();

        // Hold the map while spawning so the task cannot look itself up before it is registered.
        let mut registry = lock(&self.timers);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = lock(&timers).remove(&id).is_some();
            if live {
                task();
            }
        });
        registry.insert(id, join.abort_handle());

        debug!("Scheduled one-shot timer {:?} in {:?}", id, delay);
        id
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerId {
        let id = self.next_id();
        let timers = self.timers.clone();

        let mut registry = lock(&self.timers);
        let join = self.handle.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                // Not held across `task()`: the task may take locks that `cancel` callers hold.
                if !lock(&timers).contains_key(&id) {
                    break;
                }
                task();
            }
        });
        registry.insert(id, join.abort_handle());

        debug!("Scheduled repeating timer {:?} every {:?}", id, period);
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = lock(&self.timers).remove(&id) {
            handle.abort();
            debug!("Cancelled timer {:?}", id);
        }
    }

    fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.timers).drain() {
            handle.abort();
        }
    }
}

// ==============================================================================
// VIRTUAL SCHEDULER
// ==============================================================================

enum VirtualTask {
    Once(TimerTask),
    Repeating(RepeatingTask),
}

struct VirtualTimer {
    due: Duration,
    period: Option<Duration>,
    /// `None` while a repeating task is executing.
    task: Option<VirtualTask>,
}

struct VirtualState {
    epoch: DateTime<Utc>,
    elapsed: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, VirtualTimer>,
    fired: u64,
}

/// Manually driven clock. Nothing fires until `advance` is called.
pub struct VirtualScheduler {
    state: Mutex<VirtualState>,
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::with_epoch(Utc::now())
    }
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epoch(epoch: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(VirtualState {
                epoch,
                elapsed: Duration::ZERO,
                next_id: 1,
                timers: BTreeMap::new(),
                fired: 0,
            }),
        }
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed
    }

    /// Total number of task invocations so far.
    pub fn fired(&self) -> u64 {
        lock(&self.state).fired
    }

    /// Move virtual time forward, running every timer that comes due on the way
    /// in (due time, creation order).
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.state).elapsed + by;

        loop {
            let (id, task) = {
                let mut state = lock(&self.state);

                let next = state
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.task.is_some() && timer.due <= target)
                    .min_by_key(|(id, timer)| (timer.due, **id))
                    .map(|(id, timer)| (*id, timer.due, timer.period));

                let Some((id, due, period)) = next else {
                    state.elapsed = target;
                    break;
                };

                state.elapsed = due;
                state.fired += 1;

                let task = match period {
                    Some(period) => state.timers.get_mut(&id).and_then(|timer| {
                        timer.due = due + period;
                        timer.task.take()
                    }),
                    None => state.timers.remove(&id).and_then(|timer| timer.task),
                };
                (id, task)
            };

            match task {
                Some(VirtualTask::Once(task)) => task(),
                Some(VirtualTask::Repeating(mut task)) => {
                    task();
                    // Put it back unless the task cancelled itself.
                    if let Some(timer) = lock(&self.state).timers.get_mut(&id) {
                        timer.task = Some(VirtualTask::Repeating(task));
                    }
                }
                None => {}
            }
        }
    }

    fn insert(&self, delay: Duration, period: Option<Duration>, task: VirtualTask) -> TimerId {
        let mut state = lock(&self.state);
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let due = state.elapsed + delay;
        state.timers.insert(
            id,
            VirtualTimer {
                due,
                period,
                task: Some(task),
            },
        );
        id
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> DateTime<Utc> {
        let state = lock(&self.state);
        let elapsed = chrono::Duration::from_std(state.elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        state.epoch + elapsed
    }

    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerId {
        self.insert(delay, None, VirtualTask::Once(task))
    }

    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerId {
        // A zero period would never let `advance` terminate.
        let period = period.max(Duration::from_millis(1));
        self.insert(period, Some(period), VirtualTask::Repeating(task))
    }

    fn cancel(&self, id: TimerId) {
        lock(&self.state).timers.remove(&id);
    }

    fn pending(&self) -> usize {
        lock(&self.state).timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn virtual_timers_fire_in_due_order() {
        let scheduler = VirtualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, secs) in [("late", 5u64), ("early", 2), ("tie", 2)] {
            let order = order.clone();
            scheduler.schedule_once(
                Duration::from_secs(secs),
                Box::new(move || lock(&order).push(label)),
            );
        }

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(*lock(&order), vec!["early", "tie", "late"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn repeating_timer_can_cancel_itself() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let count = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let id = {
            let scheduler_ref = Arc::downgrade(&scheduler);
            let count = count.clone();
            let own_id = own_id.clone();
            scheduler.schedule_repeating(
                Duration::from_secs(1),
                Box::new(move || {
                    if count.fetch_add(1, Ordering::SeqCst) == 2 {
                        if let (Some(s), Some(id)) = (scheduler_ref.upgrade(), *lock(&own_id)) {
                            s.cancel(id);
                        }
                    }
                }),
            )
        };
        *lock(&own_id) = Some(id);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn virtual_now_tracks_elapsed_time() {
        let epoch = Utc::now();
        let scheduler = VirtualScheduler::with_epoch(epoch);
        scheduler.advance(Duration::from_secs(90));
        assert_eq!(scheduler.now(), epoch + chrono::Duration::seconds(90));
    }
}
