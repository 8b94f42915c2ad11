//! Per-job progress counters.
//!
//! Both counters live in one `AtomicU64` (completed in the high half, failed
//! in the low half) so a single load always yields a consistent pair.

use std::sync::atomic::{AtomicU64, Ordering};

const COMPLETED_SHIFT: u32 = 32;
const FAILED_MASK: u64 = 0xFFFF_FFFF;

/// How a task ended, from the counters' point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl TaskOutcome {
    fn delta(self) -> u64 {
        match self {
            TaskOutcome::Completed => 1 << COMPLETED_SHIFT,
            TaskOutcome::Failed => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
}

impl ProgressSnapshot {
    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }

    /// floor(100 * finished / total); 0 for an empty job
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let finished = u64::from(self.finished().min(self.total));
        (finished * 100 / u64::from(self.total)) as u8
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    total: u32,
    counters: AtomicU64,
}

impl ProgressTracker {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            counters: AtomicU64::new(0),
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Records one finished task.
    ///
    /// Returns the counters after the increment, or `None` when every task
    /// is already accounted for and the increment was refused.
    pub fn on_task_finished(&self, outcome: TaskOutcome) -> Option<ProgressSnapshot> {
        let total = self.total;
        self.counters
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                if unpack(total, packed).finished() >= total {
                    None
                } else {
                    Some(packed + outcome.delta())
                }
            })
            .ok()
            .map(|previous| unpack(total, previous + outcome.delta()))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        unpack(self.total, self.counters.load(Ordering::Acquire))
    }
}

fn unpack(total: u32, packed: u64) -> ProgressSnapshot {
    ProgressSnapshot {
        total,
        completed: (packed >> COMPLETED_SHIFT) as u32,
        failed: (packed & FAILED_MASK) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_new_tracker_is_zero() {
        let tracker = ProgressTracker::new(6);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.percent(), 0);
        assert_eq!(snapshot.finished(), 0);
    }

    #[test]
    fn test_counts_completed_and_failed_separately() {
        let tracker = ProgressTracker::new(3);
        tracker.on_task_finished(TaskOutcome::Completed);
        tracker.on_task_finished(TaskOutcome::Failed);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.percent(), 66);
    }

    #[test]
    fn test_refuses_increment_past_total() {
        let tracker = ProgressTracker::new(1);
        assert!(tracker.on_task_finished(TaskOutcome::Completed).is_some());
        assert!(tracker.on_task_finished(TaskOutcome::Failed).is_none());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.finished(), 1);
        assert_eq!(snapshot.percent(), 100);
    }

    #[test]
    fn test_empty_job_percent_is_zero() {
        let tracker = ProgressTracker::new(0);
        assert_eq!(tracker.snapshot().percent(), 0);
        assert!(tracker.on_task_finished(TaskOutcome::Completed).is_none());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let tracker = Arc::new(ProgressTracker::new(8_000));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    let outcome = if i % 2 == 0 {
                        TaskOutcome::Completed
                    } else {
                        TaskOutcome::Failed
                    };
                    for _ in 0..1_000 {
                        tracker.on_task_finished(outcome);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 4_000);
        assert_eq!(snapshot.failed, 4_000);
        assert_eq!(snapshot.percent(), 100);
    }

    proptest! {
        #[test]
        fn prop_progress_is_monotonic_and_bounded(
            total in 1u32..200,
            outcomes in prop::collection::vec(any::<bool>(), 0..300),
        ) {
            let tracker = ProgressTracker::new(total);
            let mut last_finished = 0;
            let mut last_percent = 0;

            for completed in outcomes {
                let outcome = if completed { TaskOutcome::Completed } else { TaskOutcome::Failed };
                tracker.on_task_finished(outcome);

                let snapshot = tracker.snapshot();
                prop_assert!(snapshot.finished() <= total);
                prop_assert!(snapshot.finished() >= last_finished);
                prop_assert!(snapshot.percent() <= 100);
                prop_assert!(snapshot.percent() >= last_percent);
                last_finished = snapshot.finished();
                last_percent = snapshot.percent();
            }
        }
    }
}
