//! Bounded admission queue
//!
//! Tasks wait in FIFO order until the [`Capacity`] predicate lets them run.
//! The queue itself never runs anything: a driver calls [`Limiter::admit`]
//! after every completion and on a periodic tick, spawns whatever comes out,
//! and hands the [`Ticket`] back through [`Limiter::finish`].

use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// How often drivers re-evaluate admission while tasks are waiting
pub const ADMISSION_TICK: Duration = Duration::from_millis(50);

/// Admission predicate: count ceiling plus an optional byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Maximum number of tasks running at once
    pub max_tasks: usize,
    /// Maximum combined weight of running tasks
    pub max_bytes: Option<u64>,
}

impl Capacity {
    /// Count-only capacity. A ceiling of zero is treated as one.
    pub fn tasks(max_tasks: usize) -> Self {
        Self {
            max_tasks: max_tasks.max(1),
            max_bytes: None,
        }
    }

    /// Add a byte budget on top of the count ceiling
    pub fn with_byte_budget(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Whether a task of `weight` may start next to `active` running tasks
    /// which together weigh `active_bytes`.
    pub fn can_admit(&self, active: usize, active_bytes: u64, weight: u64) -> bool {
        // A lone task always runs, otherwise an oversized head would stall the queue
        if active == 0 {
            return true;
        }
        if active >= self.max_tasks {
            return false;
        }
        match self.max_bytes {
            Some(budget) => active_bytes.saturating_add(weight) <= budget,
            None => true,
        }
    }
}

/// Proof of admission, returned to [`Limiter::finish`] when the task ends
#[derive(Debug)]
#[must_use = "a ticket must be handed back to Limiter::finish"]
pub struct Ticket {
    weight: u64,
}

impl Ticket {
    /// Weight the task was admitted with
    pub fn weight(&self) -> u64 {
        self.weight
    }
}

/// FIFO queue with bounded admission
#[derive(Debug)]
pub struct Limiter<T> {
    queue: VecDeque<(T, u64)>,
    capacity: Capacity,
    active: usize,
    active_bytes: u64,
    halted: bool,
    drained: bool,
}

impl<T> Limiter<T> {
    /// Create an empty limiter
    pub fn new(capacity: Capacity) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
            active: 0,
            active_bytes: 0,
            halted: false,
            drained: false,
        }
    }

    /// Enqueue a task. Ignored once the limiter has been halted.
    pub fn push(&mut self, task: T, weight: u64) {
        if self.halted {
            trace!("Limiter halted, dropping pushed task");
            return;
        }
        self.queue.push_back((task, weight));
        self.drained = false;
    }

    /// Admit the head task if capacity allows. A head that does not fit stays
    /// queued and blocks the tasks behind it, keeping FIFO order.
    pub fn admit(&mut self) -> Option<(T, Ticket)> {
        if self.halted {
            return None;
        }
        let (_, weight) = self.queue.front()?;
        if !self.capacity.can_admit(self.active, self.active_bytes, *weight) {
            return None;
        }
        let (task, weight) = self.queue.pop_front()?;
        self.active += 1;
        self.active_bytes = self.active_bytes.saturating_add(weight);
        trace!("Admitted task (running: {}, queued: {})", self.active, self.queue.len());
        Some((task, Ticket { weight }))
    }

    /// Release a finished task's capacity.
    ///
    /// Returns `true` exactly once per drain: the first time the queue is empty
    /// and nothing is running.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        self.active = self.active.saturating_sub(1);
        self.active_bytes = self.active_bytes.saturating_sub(ticket.weight);
        if !self.drained && self.is_idle() {
            self.drained = true;
            debug!("Limiter drained");
            return true;
        }
        false
    }

    /// Stop admitting and discard queued tasks. Returns how many were dropped.
    pub fn halt(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.halted = true;
        debug!("Limiter halted, {} queued tasks dropped", dropped);
        dropped
    }

    /// Whether [`halt`](Self::halt) was called
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether the count ceiling is reached
    pub fn is_full(&self) -> bool {
        self.active >= self.capacity.max_tasks
    }

    /// Nothing queued and nothing running
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active == 0
    }

    /// Number of waiting tasks
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of admitted, unfinished tasks
    pub fn running(&self) -> usize {
        self.active
    }

    /// Combined weight of running tasks
    pub fn active_bytes(&self) -> u64 {
        self.active_bytes
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }
}
