use std::fmt;

use super::{KernelError, KernelResult, Pid, PidQueue};

pub const NUMBER_OF_SEMAPHORES: usize = 16;

/// Index into the semaphore bank, range-checked on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreId(usize);

impl SemaphoreId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SemaphoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counting semaphore. A unit released while someone waits goes straight to
/// the head waiter, so `value > 0` implies an empty wait queue.
#[derive(Debug, Clone)]
pub struct Semaphore {
    value: u32,
    wait_queue: PidQueue,
}

impl Semaphore {
    pub fn new(value: u32) -> Semaphore {
        Semaphore {
            value,
            wait_queue: PidQueue::new(),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn waiters(&self) -> &PidQueue {
        &self.wait_queue
    }

    /// Takes a unit if one is free. On `false` the caller must block.
    pub fn try_down(&mut self) -> bool {
        if self.value > 0 {
            self.value -= 1;
            true
        } else {
            false
        }
    }

    pub fn wait(&mut self, pid: Pid) {
        debug_assert_eq!(self.value, 0);
        self.wait_queue.enqueue(pid);
    }

    /// True when an `up` would have no waiter to hand to and no room left
    /// in the counter.
    pub fn is_saturated(&self) -> bool {
        self.wait_queue.is_empty() && self.value == u32::MAX
    }

    /// Releases a unit. Returns the waiter that receives it, if any.
    ///
    /// Callers check [`Semaphore::is_saturated`] first; a saturated counter
    /// is left unchanged.
    pub fn up(&mut self) -> Option<Pid> {
        match self.wait_queue.dequeue() {
            Some(pid) => Some(pid),
            None => {
                self.value = self.value.saturating_add(1);
                None
            }
        }
    }
}

pub struct SemaphoreBank {
    semaphores: Vec<Semaphore>,
}

impl SemaphoreBank {
    pub fn new(initial_value: u32) -> SemaphoreBank {
        SemaphoreBank {
            semaphores: vec![Semaphore::new(initial_value); NUMBER_OF_SEMAPHORES],
        }
    }

    pub fn validate(&self, raw: usize) -> KernelResult<SemaphoreId> {
        if raw < self.semaphores.len() {
            Ok(SemaphoreId(raw))
        } else {
            Err(KernelError::SemaphoreOutOfRange {
                id: raw,
                count: self.semaphores.len(),
            })
        }
    }

    pub fn get(&self, id: SemaphoreId) -> &Semaphore {
        &self.semaphores[id.0]
    }

    pub fn get_mut(&mut self, id: SemaphoreId) -> &mut Semaphore {
        &mut self.semaphores[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Semaphore> {
        self.semaphores.iter()
    }
}
