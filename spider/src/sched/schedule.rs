//! Ordered task sequence with per-PE statistics, as built by one scheduling
//! pass.

use crate::sched::task::{Task, TaskState};

/// Monotonic per-PE statistics accumulated across one iteration.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    end_time: Vec<u64>,
    load_time: Vec<u64>,
    job_count: Vec<u32>,
}

impl Stats {
    fn ensure(&mut self, pe: usize) {
        if self.end_time.len() <= pe {
            self.end_time.resize(pe + 1, 0);
            self.load_time.resize(pe + 1, 0);
            self.job_count.resize(pe + 1, 0);
        }
    }

    pub fn end_time(&self, pe: usize) -> u64 {
        self.end_time.get(pe).copied().unwrap_or(0)
    }

    pub fn load_time(&self, pe: usize) -> u64 {
        self.load_time.get(pe).copied().unwrap_or(0)
    }

    pub fn job_count(&self, pe: usize) -> u32 {
        self.job_count.get(pe).copied().unwrap_or(0)
    }

    fn record(&mut self, pe: usize, start: u64, end: u64) {
        self.ensure(pe);
        self.end_time[pe] = self.end_time[pe].max(end);
        self.load_time[pe] += end.saturating_sub(start);
        self.job_count[pe] += 1;
    }
}

/// Owns every `Task` produced by one scheduling pass, in `ix` order, plus
/// the running per-PE statistics those tasks' placements have accumulated.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    tasks: Vec<Task>,
    stats: Stats,
}

impl Schedule {
    pub fn new() -> Self {
        Schedule::default()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.tasks.reserve(additional);
    }

    /// Append a task, assigning it the next `ix` (the schedule owns `ix`
    /// assignment; callers never set it themselves).
    pub fn add_task(&mut self, mut task: Task) -> usize {
        task.ix = self.tasks.len();
        let ix = task.ix;
        self.tasks.push(task);
        ix
    }

    pub fn task(&self, ix: usize) -> Option<&Task> {
        self.tasks.get(ix)
    }

    pub fn task_mut(&mut self, ix: usize) -> Option<&mut Task> {
        self.tasks.get_mut(ix)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn start_time(&self, ix: usize) -> Option<u64> {
        self.tasks.get(ix).map(|t| t.start_time)
    }

    pub fn end_time(&self, ix: usize) -> Option<u64> {
        self.tasks.get(ix).map(|t| t.end_time)
    }

    /// Commit a mapping decision: set the task's PE/time window, flip it
    /// to `READY`, and fold the placement into that PE's running stats.
    pub fn update_task_and_set_ready(&mut self, ix: usize, pe: u32, start: u64, end: u64) {
        if let Some(task) = self.tasks.get_mut(ix) {
            task.mapped_pe = Some(pe);
            task.start_time = start;
            task.end_time = end;
            task.state = TaskState::Ready;
        }
        self.stats.record(pe as usize, start, end);
    }

    /// Reset every task's state to `PENDING` without touching PE stats,
    /// matching `Schedule::reset` in the original runtime.
    pub fn reset(&mut self) {
        for task in &mut self.tasks {
            task.state = TaskState::Pending;
        }
    }

    /// Drop both tasks and stats, matching `Schedule::clear`.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.stats = Stats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::task::Task;

    #[test]
    fn add_task_assigns_dense_ix() {
        let mut s = Schedule::new();
        let t0 = s.add_task(Task::new_vertex(0, 0, 0));
        let t1 = s.add_task(Task::new_vertex(1, 0, 0));
        assert_eq!(t0, 0);
        assert_eq!(t1, 1);
    }

    #[test]
    fn reset_preserves_stats_clear_drops_them() {
        let mut s = Schedule::new();
        let ix = s.add_task(Task::new_vertex(0, 0, 0));
        s.update_task_and_set_ready(ix, 0, 10, 20);
        assert_eq!(s.stats().end_time(0), 20);
        s.reset();
        assert_eq!(s.task(ix).unwrap().state, TaskState::Pending);
        assert_eq!(s.stats().end_time(0), 20);
        s.clear();
        assert_eq!(s.task_count(), 0);
        assert_eq!(s.stats().end_time(0), 0);
    }

    #[test]
    fn task_lookup_out_of_range_is_none() {
        let s = Schedule::new();
        assert!(s.task(5).is_none());
    }
}
