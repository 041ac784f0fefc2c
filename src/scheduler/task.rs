// src/scheduler/task.rs

//! # Task Descriptors
//!
//! Static description of a schedulable job and the statistics the scheduler
//! keeps about it.

use crate::error::FatalFault;

/// Index of a registered task.
pub type TaskId = usize;

/// Task body. Receives the shared context and the pass timestamp.
pub type TaskFn<C> = fn(&mut C, u32) -> Result<(), FatalFault>;

/// Readiness predicate of an event driven task. Receives the context and
/// the microseconds since the task last ran.
pub type CheckFn<C> = fn(&C, u32) -> bool;

/// Smallest period a task may request, in microseconds.
pub const MIN_PERIOD_US: u32 = 100;

/// Static priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Runs only when nothing else is due.
    Idle = 0,
    /// Background work.
    Low = 1,
    /// Ordinary periodic work.
    Medium = 3,
    /// Latency sensitive work.
    High = 5,
    /// The control loop. Never deferred by the guard interval.
    Realtime = 6,
}

impl Priority {
    /// Numeric weight used in the dynamic priority.
    pub const fn weight(self) -> u16 {
        self as u16
    }
}

/// Description of a schedulable job.
pub struct TaskDescriptor<C> {
    /// Human readable name.
    pub name: &'static str,
    /// Readiness predicate for event driven tasks, `None` for periodic ones.
    pub check: Option<CheckFn<C>>,
    /// Task body.
    pub run: TaskFn<C>,
    /// Desired period in microseconds.
    pub period_us: u32,
    /// Static priority.
    pub priority: Priority,
}

impl<C> TaskDescriptor<C> {
    /// Describes a periodic task.
    pub const fn periodic(name: &'static str, run: TaskFn<C>, period_us: u32, priority: Priority) -> Self {
        Self {
            name,
            check: None,
            run,
            period_us,
            priority,
        }
    }

    /// Describes an event driven task polled through `check`.
    pub const fn event(
        name: &'static str,
        check: CheckFn<C>,
        run: TaskFn<C>,
        period_us: u32,
        priority: Priority,
    ) -> Self {
        Self {
            name,
            check: Some(check),
            run,
            period_us,
            priority,
        }
    }
}

impl<C> Clone for TaskDescriptor<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for TaskDescriptor<C> {}

/// Execution time statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    /// Moving average of execution time, 1/32 weight per sample.
    pub average_execution_us: u32,
    /// Longest execution time seen.
    pub max_execution_us: u32,
    /// Sum of all execution times.
    pub total_execution_us: u64,
    /// Number of completed runs.
    pub run_count: u32,
}

impl TaskStats {
    /// Folds one execution time into the statistics.
    pub fn record(&mut self, execution_us: u32) {
        let average = (u64::from(self.average_execution_us) * 31 + u64::from(execution_us)) / 32;
        self.average_execution_us = average as u32;
        self.max_execution_us = self.max_execution_us.max(execution_us);
        self.total_execution_us += u64::from(execution_us);
        self.run_count = self.run_count.wrapping_add(1);
    }
}

/// Snapshot of a task for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    /// Task name.
    pub name: &'static str,
    /// Whether the task is queued.
    pub enabled: bool,
    /// Static priority.
    pub priority: Priority,
    /// Desired period.
    pub period_us: u32,
    /// Interval between the two most recent runs.
    pub latest_delta_us: u32,
    /// Execution time statistics.
    pub stats: TaskStats,
}

/// Per task bookkeeping kept by the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TaskState {
    pub dynamic_priority: u16,
    pub age_cycles: u16,
    pub last_executed_at: u32,
    pub last_signaled_at: u32,
    pub latest_delta_us: u32,
    pub stats: TaskStats,
}
