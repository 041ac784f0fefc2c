// src/scheduler.rs

//! # Cooperative Task Scheduler
//!
//! Runs at most one task per call to [`Scheduler::run_once`]. Every enabled
//! task gets a dynamic priority that grows with how many periods it is
//! overdue; the highest one wins. Lower priority work is held back while a
//! realtime task is about to become due (the realtime guard interval), unless
//! it is already more than one period late.
//!
//! The guard interval adapts to the slowest non-realtime task: every 100 ms
//! the scheduler takes the largest average execution time among them, clamps
//! it to `[GUARD_INTERVAL_MIN_US, GUARD_INTERVAL_MAX_US]` and adds a margin.
//! The same housekeeping turns the overdue counters into a load figure.
//!
//! Tasks run to completion. A task returning [`FatalFault`] stops the pass
//! and the fault goes straight back to the caller.

pub mod task;

pub use task::*;

use crate::clock::{deadline_after, elapsed, reached, Clock};
use crate::error::{FatalFault, SchedulerError};

/// Largest number of tasks the scheduler can hold.
pub const MAX_TASKS: usize = 16;

/// Lower bound of the adaptive guard interval.
pub const GUARD_INTERVAL_MIN_US: u32 = 10;
/// Upper bound of the adaptive guard interval, also the initial value.
pub const GUARD_INTERVAL_MAX_US: u32 = 300;
/// Margin added on top of the measured guard interval.
pub const GUARD_INTERVAL_MARGIN_US: u32 = 25;
/// Period of the load and guard housekeeping.
pub const HOUSEKEEPING_PERIOD_US: u32 = 100_000;

/// Cooperative scheduler over a shared task context `C`.
pub struct Scheduler<C> {
    tasks: heapless::Vec<TaskDescriptor<C>, MAX_TASKS>,
    states: heapless::Vec<TaskState, MAX_TASKS>,
    queue: heapless::Vec<TaskId, MAX_TASKS>,
    guard_interval_us: u32,
    total_waiting_tasks: u32,
    total_waiting_samples: u32,
    load_percent: u16,
    next_housekeeping_at: u32,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
            states: heapless::Vec::new(),
            queue: heapless::Vec::new(),
            guard_interval_us: GUARD_INTERVAL_MAX_US,
            total_waiting_tasks: 0,
            total_waiting_samples: 0,
            load_percent: 0,
            next_housekeeping_at: HOUSEKEEPING_PERIOD_US,
        }
    }

    /// Adds a task to the table. The task starts disabled.
    pub fn register(&mut self, mut descriptor: TaskDescriptor<C>) -> Result<TaskId, SchedulerError> {
        descriptor.period_us = descriptor.period_us.max(MIN_PERIOD_US);
        let id = self.tasks.len();
        let name = descriptor.name;
        self.tasks.push(descriptor).map_err(|_| {
            log_warn!("task table full, {} not registered", name);
            SchedulerError::TableFull
        })?;
        self.states
            .push(TaskState::default())
            .map_err(|_| SchedulerError::TableFull)?;
        Ok(id)
    }

    /// Adds a task and enables it.
    pub fn register_enabled(&mut self, descriptor: TaskDescriptor<C>) -> Result<TaskId, SchedulerError> {
        let id = self.register(descriptor)?;
        self.enable(id)?;
        Ok(id)
    }

    /// Queues a task. Enabling an enabled task does nothing.
    pub fn enable(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let priority = self.descriptor(id)?.priority;
        if self.queue.contains(&id) {
            return Ok(());
        }
        let position = self
            .queue
            .iter()
            .position(|&queued| self.tasks[queued].priority < priority)
            .unwrap_or(self.queue.len());
        self.queue
            .insert(position, id)
            .map_err(|_| SchedulerError::TableFull)
    }

    /// Removes a task from the queue. Disabling a disabled task does nothing.
    pub fn disable(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        self.descriptor(id)?;
        self.queue.retain(|&queued| queued != id);
        Ok(())
    }

    /// Enables or disables a task.
    pub fn set_enabled(&mut self, id: TaskId, enabled: bool) -> Result<(), SchedulerError> {
        if enabled {
            self.enable(id)
        } else {
            self.disable(id)
        }
    }

    /// Whether the task is queued.
    pub fn is_enabled(&self, id: TaskId) -> bool {
        self.queue.contains(&id)
    }

    /// Changes the desired period, never below [`MIN_PERIOD_US`].
    pub fn set_period(&mut self, id: TaskId, period_us: u32) -> Result<(), SchedulerError> {
        let descriptor = self
            .tasks
            .get_mut(id)
            .ok_or(SchedulerError::UnknownTask(id))?;
        descriptor.period_us = period_us.max(MIN_PERIOD_US);
        Ok(())
    }

    /// Inspection snapshot of a task.
    pub fn stats(&self, id: TaskId) -> Result<TaskInfo, SchedulerError> {
        let descriptor = self.descriptor(id)?;
        let state = &self.states[id];
        Ok(TaskInfo {
            name: descriptor.name,
            enabled: self.is_enabled(id),
            priority: descriptor.priority,
            period_us: descriptor.period_us,
            latest_delta_us: state.latest_delta_us,
            stats: state.stats,
        })
    }

    /// Interval between the two most recent runs of a task.
    pub fn task_dt(&self, id: TaskId) -> Result<u32, SchedulerError> {
        self.descriptor(id)?;
        Ok(self.states[id].latest_delta_us)
    }

    /// Clears execution statistics of every task.
    pub fn reset_stats(&mut self) {
        for state in self.states.iter_mut() {
            state.stats = TaskStats::default();
        }
    }

    /// Average number of overdue tasks per pass, in percent.
    pub fn load_percent(&self) -> u16 {
        self.load_percent
    }

    /// Current realtime guard interval in microseconds.
    pub fn guard_interval_us(&self) -> u32 {
        self.guard_interval_us
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn descriptor(&self, id: TaskId) -> Result<&TaskDescriptor<C>, SchedulerError> {
        self.tasks.get(id).ok_or(SchedulerError::UnknownTask(id))
    }

    fn time_to_next_realtime(&self, now: u32) -> u32 {
        let mut time_to_next = u32::MAX;
        for &id in self.queue.iter() {
            let descriptor = &self.tasks[id];
            if descriptor.priority != Priority::Realtime {
                continue;
            }
            let next_at = deadline_after(self.states[id].last_executed_at, descriptor.period_us);
            let remaining = if reached(now, next_at) {
                0
            } else {
                elapsed(next_at, now)
            };
            time_to_next = time_to_next.min(remaining);
        }
        time_to_next
    }

    fn housekeeping(&mut self, now: u32) {
        if !reached(now, self.next_housekeeping_at) {
            return;
        }
        self.next_housekeeping_at = deadline_after(now, HOUSEKEEPING_PERIOD_US);

        if self.total_waiting_samples > 0 {
            let load = 100 * u64::from(self.total_waiting_tasks) / u64::from(self.total_waiting_samples);
            self.load_percent = load.min(u64::from(u16::MAX)) as u16;
            self.total_waiting_tasks = 0;
            self.total_waiting_samples = 0;
        }

        let slowest = self
            .queue
            .iter()
            .filter(|&&id| self.tasks[id].priority != Priority::Realtime)
            .map(|&id| self.states[id].stats.average_execution_us)
            .max()
            .unwrap_or(0);
        self.guard_interval_us =
            slowest.clamp(GUARD_INTERVAL_MIN_US, GUARD_INTERVAL_MAX_US) + GUARD_INTERVAL_MARGIN_US;
    }

    /// One scheduling pass: pick the most urgent task and run it.
    ///
    /// `now` is the pass timestamp used for every age computation; `clock`
    /// measures how long the selected task ran. Returns the id of the task
    /// that ran, if any.
    pub fn run_once<K: Clock>(
        &mut self,
        now: u32,
        clock: &K,
        context: &mut C,
    ) -> Result<Option<TaskId>, FatalFault> {
        self.housekeeping(now);

        let outside_guard = self.time_to_next_realtime(now) > self.guard_interval_us;
        let mut waiting_tasks = 0;
        let mut selected: Option<TaskId> = None;
        let mut selected_priority = 0;

        for &id in self.queue.iter() {
            let descriptor = &self.tasks[id];
            let state = &mut self.states[id];
            let weight = descriptor.priority.weight();
            let period = descriptor.period_us;

            match descriptor.check {
                Some(check) => {
                    if state.dynamic_priority > 0 {
                        let since_signal = elapsed(now, state.last_signaled_at);
                        state.age_cycles = saturate(1 + since_signal / period);
                        state.dynamic_priority = dynamic_priority(weight, state.age_cycles);
                        waiting_tasks += 1;
                    } else if check(context, elapsed(now, state.last_executed_at)) {
                        state.last_signaled_at = now;
                        state.age_cycles = 1;
                        state.dynamic_priority = 1 + weight;
                        waiting_tasks += 1;
                    } else {
                        state.age_cycles = 0;
                    }
                }
                None => {
                    state.age_cycles = saturate(elapsed(now, state.last_executed_at) / period);
                    if state.age_cycles > 0 {
                        state.dynamic_priority = dynamic_priority(weight, state.age_cycles);
                        waiting_tasks += 1;
                    }
                }
            }

            if state.dynamic_priority > selected_priority
                && (outside_guard
                    || state.age_cycles > 1
                    || descriptor.priority == Priority::Realtime)
            {
                selected = Some(id);
                selected_priority = state.dynamic_priority;
            }
        }

        self.total_waiting_tasks = self.total_waiting_tasks.saturating_add(waiting_tasks);
        self.total_waiting_samples = self.total_waiting_samples.saturating_add(1);

        let Some(id) = selected else {
            return Ok(None);
        };

        let run = self.tasks[id].run;
        let state = &mut self.states[id];
        state.latest_delta_us = elapsed(now, state.last_executed_at);
        state.last_executed_at = now;
        state.dynamic_priority = 0;

        let started_at = clock.now_us();
        let result = run(context, now);
        let execution_us = elapsed(clock.now_us(), started_at);
        self.states[id].stats.record(execution_us);

        if let Err(fault) = result {
            log_warn!("task {} raised a fatal fault", self.tasks[id].name);
            return Err(fault);
        }
        Ok(Some(id))
    }
}

fn saturate(cycles: u32) -> u16 {
    cycles.min(u32::from(u16::MAX)) as u16
}

fn dynamic_priority(weight: u16, age_cycles: u16) -> u16 {
    weight.saturating_mul(age_cycles).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    #[derive(Default)]
    struct Counters {
        runs: [u32; 4],
        ready: bool,
        last_run_at: [u32; 4],
        intervals: [u64; 4],
    }

    fn note(ctx: &mut Counters, index: usize, now: u32) {
        if ctx.runs[index] > 0 {
            ctx.intervals[index] += u64::from(elapsed(now, ctx.last_run_at[index]));
        }
        ctx.runs[index] += 1;
        ctx.last_run_at[index] = now;
    }

    fn run_realtime(ctx: &mut Counters, now: u32) -> Result<(), FatalFault> {
        note(ctx, 0, now);
        Ok(())
    }

    fn run_medium(ctx: &mut Counters, now: u32) -> Result<(), FatalFault> {
        note(ctx, 1, now);
        Ok(())
    }

    fn run_low(ctx: &mut Counters, now: u32) -> Result<(), FatalFault> {
        note(ctx, 2, now);
        Ok(())
    }

    fn run_event(ctx: &mut Counters, now: u32) -> Result<(), FatalFault> {
        ctx.ready = false;
        note(ctx, 3, now);
        Ok(())
    }

    fn is_ready(ctx: &Counters, _since: u32) -> bool {
        ctx.ready
    }

    fn run_faulty(_ctx: &mut Counters, _now: u32) -> Result<(), FatalFault> {
        Err(FatalFault::Output {
            task: "faulty",
            source: crate::error::OutputError::DriverFault(0),
        })
    }

    /// Test that enable keeps the queue sorted and is idempotent.
    #[test]
    fn test_scheduler_enable_idempotent() {
        let mut scheduler: Scheduler<Counters> = Scheduler::new();
        let low = scheduler
            .register(TaskDescriptor::periodic("low", run_low, 10_000, Priority::Low))
            .unwrap();
        let rt = scheduler
            .register(TaskDescriptor::periodic("rt", run_realtime, 1_000, Priority::Realtime))
            .unwrap();
        scheduler.enable(low).unwrap();
        scheduler.enable(rt).unwrap();
        scheduler.enable(rt).unwrap();
        assert_eq!(&[rt, low], scheduler.queue.as_slice(), "Queue should be priority ordered.");
        scheduler.disable(low).unwrap();
        scheduler.disable(low).unwrap();
        assert_eq!(&[rt], scheduler.queue.as_slice(), "Disable should be idempotent.");
        assert!(!scheduler.is_enabled(low), "Low should be disabled.");
    }

    /// Test that the period is clamped to its minimum.
    #[test]
    fn test_scheduler_set_period_clamps() {
        let mut scheduler: Scheduler<Counters> = Scheduler::new();
        let id = scheduler
            .register(TaskDescriptor::periodic("low", run_low, 10_000, Priority::Low))
            .unwrap();
        scheduler.set_period(id, 10).unwrap();
        assert_eq!(MIN_PERIOD_US, scheduler.stats(id).unwrap().period_us, "Period should clamp.");
        assert_eq!(
            Err(SchedulerError::UnknownTask(7)),
            scheduler.set_period(7, 1_000),
            "Unknown id should be rejected."
        );
    }

    /// Test that nothing runs before any task is due.
    #[test]
    fn test_scheduler_idle_pass() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_enabled(TaskDescriptor::periodic("rt", run_realtime, 1_000, Priority::Realtime))
            .unwrap();
        assert_eq!(Ok(None), scheduler.run_once(500, &clock, &mut ctx), "Nothing is due yet.");
        assert_eq!(Ok(Some(0)), scheduler.run_once(1_000, &clock, &mut ctx), "Realtime is due.");
    }

    /// Test that a due realtime task beats an older medium task inside the guard.
    #[test]
    fn test_scheduler_guard_defers_low_priority() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        let rt = scheduler
            .register_enabled(TaskDescriptor::periodic("rt", run_realtime, 1_000, Priority::Realtime))
            .unwrap();
        let medium = scheduler
            .register_enabled(TaskDescriptor::periodic("medium", run_medium, 900, Priority::Medium))
            .unwrap();

        // medium is one period old, realtime is 100 us away: inside the guard
        assert_eq!(Ok(None), scheduler.run_once(900, &clock, &mut ctx), "Medium must wait.");
        assert_eq!(Ok(Some(rt)), scheduler.run_once(1_000, &clock, &mut ctx), "Realtime runs.");
        assert_eq!(Ok(Some(medium)), scheduler.run_once(1_010, &clock, &mut ctx), "Medium runs after.");
    }

    /// Test that a task more than one period late ignores the guard.
    #[test]
    fn test_scheduler_overdue_task_ignores_guard() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_enabled(TaskDescriptor::periodic("rt", run_realtime, 5_000, Priority::Realtime))
            .unwrap();
        let low = scheduler
            .register_enabled(TaskDescriptor::periodic("low", run_low, 1_000, Priority::Low))
            .unwrap();
        scheduler.states[0].last_executed_at = 200;
        // realtime due at 5200, low is 4 periods old at 4900
        assert_eq!(Ok(Some(low)), scheduler.run_once(4_900, &clock, &mut ctx), "Overdue low runs.");
    }

    /// Test the event driven age and selection.
    #[test]
    fn test_scheduler_event_task() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        let event = scheduler
            .register_enabled(TaskDescriptor::event("event", is_ready, run_event, 20_000, Priority::High))
            .unwrap();

        assert_eq!(Ok(None), scheduler.run_once(1_000, &clock, &mut ctx), "Event not ready.");
        ctx.ready = true;
        assert_eq!(Ok(Some(event)), scheduler.run_once(2_000, &clock, &mut ctx), "Event ready.");
        assert_eq!(1, ctx.runs[3], "Event should have run once.");
        assert_eq!(Ok(None), scheduler.run_once(3_000, &clock, &mut ctx), "Event consumed.");
    }

    /// Test execution statistics and the adaptive guard interval.
    #[test]
    fn test_scheduler_guard_adapts() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        let slow = scheduler
            .register_enabled(TaskDescriptor::periodic("slow", run_low, 1_000, Priority::Low))
            .unwrap();
        // every run measures zero time, so the guard falls to its floor
        let mut now = 0;
        for _ in 0..200 {
            now += 1_000;
            clock.set(now);
            scheduler.run_once(now, &clock, &mut ctx).unwrap();
        }
        assert!(scheduler.stats(slow).unwrap().stats.run_count > 0, "Task should run.");
        assert_eq!(
            GUARD_INTERVAL_MIN_US + GUARD_INTERVAL_MARGIN_US,
            scheduler.guard_interval_us(),
            "Guard should fall to its floor plus margin."
        );
    }

    /// Test the load figure for a single always due task.
    #[test]
    fn test_scheduler_load_percent() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_enabled(TaskDescriptor::periodic("rt", run_realtime, 1_000, Priority::Realtime))
            .unwrap();
        let mut now = 0;
        while now < 100_000 {
            now += 1_000;
            scheduler.run_once(now, &clock, &mut ctx).unwrap();
        }
        scheduler.run_once(now + 500, &clock, &mut ctx).unwrap();
        assert_eq!(100, scheduler.load_percent(), "One due task every pass is 100 percent.");
    }

    /// Test that inter-run intervals converge to the requested periods.
    #[test]
    fn test_scheduler_fairness() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_enabled(TaskDescriptor::periodic("rt", run_realtime, 3_500, Priority::Realtime))
            .unwrap();
        scheduler
            .register_enabled(TaskDescriptor::periodic("medium", run_medium, 20_000, Priority::Medium))
            .unwrap();
        scheduler
            .register_enabled(TaskDescriptor::periodic("low", run_low, 100_000, Priority::Low))
            .unwrap();

        let mut now: u32 = 0;
        while now < 2_000_000 {
            now += 50;
            clock.set(now);
            scheduler.run_once(now, &clock, &mut ctx).unwrap();
        }

        let periods = [3_500u64, 20_000, 100_000];
        for (index, period) in periods.iter().enumerate() {
            let average = ctx.intervals[index] / u64::from(ctx.runs[index] - 1);
            let guard = u64::from(GUARD_INTERVAL_MAX_US + GUARD_INTERVAL_MARGIN_US);
            assert!(
                average >= *period && average <= period + guard,
                "Task {} averaged {} us for a {} us period.",
                index,
                average,
                period
            );
        }
    }

    /// Test that a task fault is returned to the caller.
    #[test]
    fn test_scheduler_fault_propagates() {
        let clock = MockClock::new(0);
        let mut ctx = Counters::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_enabled(TaskDescriptor::periodic("faulty", run_faulty, 1_000, Priority::High))
            .unwrap();
        assert!(
            scheduler.run_once(1_000, &clock, &mut ctx).is_err(),
            "Fault should propagate."
        );
    }

    /// Test that the table rejects tasks beyond its capacity.
    #[test]
    fn test_scheduler_table_full() {
        let mut scheduler: Scheduler<Counters> = Scheduler::new();
        for _ in 0..MAX_TASKS {
            scheduler
                .register(TaskDescriptor::periodic("low", run_low, 1_000, Priority::Low))
                .unwrap();
        }
        assert_eq!(
            Err(SchedulerError::TableFull),
            scheduler.register(TaskDescriptor::periodic("low", run_low, 1_000, Priority::Low)),
            "Table should be full."
        );
    }
}
