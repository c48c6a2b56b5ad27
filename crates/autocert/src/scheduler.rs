//! One-shot timer scheduling
//!
//! Renewal records never touch the runtime's timers directly. They ask a
//! [`Scheduler`] to run a task after a delay and keep the returned
//! [`TimerHandle`] to cancel it. [`TokioScheduler`] is the production
//! implementation; [`ManualScheduler`] queues tasks so tests and simulations
//! decide when each timer fires.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Work run when a timer fires
pub type ScheduledTask = BoxFuture<'static, ()>;

/// Cancels one armed timer
///
/// Cancelling after the timer fired has no effect on the running task.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs tasks after a delay
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle;
}

// ============================================================================
// Tokio
// ============================================================================

/// Scheduler backed by Tokio timers
///
/// `schedule` must be called from within a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let token = handle.token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(delay_secs = delay.as_secs(), "Timer cancelled before firing");
                }
                _ = tokio::time::sleep(delay) => task.await,
            }
        });

        handle
    }
}

// ============================================================================
// Manual
// ============================================================================

struct PendingTask {
    delay: Duration,
    handle: TimerHandle,
    task: ScheduledTask,
}

/// Scheduler whose timers fire only on request
///
/// Tasks fire in the order they were armed. Cancelled timers are skipped.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<VecDeque<PendingTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of the live (armed, not cancelled) timers, in arming order
    pub fn armed(&self) -> Vec<Duration> {
        self.pending
            .lock()
            .iter()
            .filter(|p| !p.handle.is_cancelled())
            .map(|p| p.delay)
            .collect()
    }

    pub fn armed_count(&self) -> usize {
        self.armed().len()
    }

    /// Remove the next live timer without running it
    pub fn take_next(&self) -> Option<(Duration, ScheduledTask)> {
        let mut pending = self.pending.lock();
        while let Some(next) = pending.pop_front() {
            if !next.handle.is_cancelled() {
                return Some((next.delay, next.task));
            }
        }
        None
    }

    /// Fire the next live timer and run its task to completion
    ///
    /// Returns the delay the timer was armed with.
    pub async fn fire_next(&self) -> Option<Duration> {
        let (delay, task) = self.take_next()?;
        trace!(delay_secs = delay.as_secs(), "Firing manual timer");
        task.await;
        Some(delay)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
        let handle = TimerHandle::new();
        self.pending.lock().push_back(PendingTask {
            delay,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("armed", &self.armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> ScheduledTask {
        let counter = Arc::clone(counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        TokioScheduler.schedule(Duration::from_secs(3600), counting_task(&fired));

        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.schedule(Duration::from_secs(60), counting_task(&fired));

        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_manual_scheduler_fires_in_order_and_skips_cancelled() {
        let fired = Arc::new(AtomicUsize::new(0));
        let scheduler = ManualScheduler::new();

        let first = scheduler.schedule(Duration::from_secs(1), counting_task(&fired));
        scheduler.schedule(Duration::from_secs(2), counting_task(&fired));
        assert_eq!(scheduler.armed(), vec![Duration::from_secs(1), Duration::from_secs(2)]);

        first.cancel();
        assert_eq!(scheduler.armed_count(), 1);

        assert_eq!(scheduler.fire_next().await, Some(Duration::from_secs(2)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.fire_next().await, None);
    }
}
