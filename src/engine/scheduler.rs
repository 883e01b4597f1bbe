//! Cooperative task scheduler
//!
//! A virtual-time queue of one-shot and recurring tasks. Nothing runs on its
//! own: the owner advances the clock and receives due tasks one at a time, in
//! due-time order (ties go to the task armed first). Any task can be cancelled
//! by id before it fires.

use std::fmt;

/// Handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    id: TaskId,
    due: f64,
    period: Option<f64>,
    task: T,
}

/// Virtual-time scheduler over task payloads of type `T`
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: f64,
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of armed tasks
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Arm a task that fires once, `delay` seconds from now
    pub fn schedule_once(&mut self, delay: f64, task: T) -> TaskId {
        self.push(delay, None, task)
    }

    /// Arm a task that fires every `period` seconds, first at `now + period`
    pub fn schedule_every(&mut self, period: f64, task: T) -> TaskId {
        self.push(period, Some(period), task)
    }

    fn push(&mut self, delay: f64, period: Option<f64>, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due: self.now + delay.max(0.0),
            period,
            task,
        });
        id
    }

    /// Cancel a task; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Pop the earliest task due at or before `until`
    ///
    /// Moves the clock to the task's due time. Recurring tasks are re-armed
    /// one period later before being returned. When nothing is due the clock
    /// moves to `until` and `None` is returned.
    pub fn next_due(&mut self, until: f64) -> Option<(TaskId, T)> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= until)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i);

        let Some(pos) = pos else {
            self.now = self.now.max(until);
            return None;
        };

        let entry = &mut self.entries[pos];
        self.now = self.now.max(entry.due);
        let fired = (entry.id, entry.task.clone());

        match entry.period {
            Some(period) if period > 0.0 => entry.due += period,
            _ => {
                self.entries.remove(pos);
            }
        }

        Some(fired)
    }
}
